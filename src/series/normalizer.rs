//! Aligns per-parameter observation lists on one shared clock.
//!
//! The backend returns each parameter's observations separately, with gaps and
//! different lengths. Tables and charts both need one row per timestamp, so
//! the normalizer:
//!
//! 1. sorts each series by timestamp (stable) and drops repeated timestamps,
//!    keeping the first occurrence,
//! 2. builds the clock as the sorted union of every returned series' timestamps,
//! 3. reconciles the caller's requested parameters with the series actually
//!    returned, inserting an empty series for anything requested but absent,
//! 4. lays every column onto the clock with `None` where it has no observation.

use std::collections::{BTreeSet, HashMap};

use crate::backend::models::DataResponse;
use crate::error::AppResult;
use crate::series::models::{
    AlignedColumn, AlignedSeries, DataPoint, ParameterDescriptor, ParameterId, Series, SeriesSet,
};
use crate::services::catalog::ParameterCatalog;

/// Parse a raw `fetchQuery` body into a series set.
///
/// # Errors
///
/// Returns `AppError::MalformedResponse` when `data` is missing or not an
/// array, or when any point lacks `timestamp` or `value`.
pub fn series_from_json(text: &str, catalog: &ParameterCatalog) -> AppResult<SeriesSet> {
    let response: DataResponse = crate::backend::client::parse_response("fetchQuery", text)?;
    Ok(series_from_response(response, catalog))
}

/// Attach catalog descriptors to a decoded response.
#[must_use]
pub fn series_from_response(response: DataResponse, catalog: &ParameterCatalog) -> SeriesSet {
    SeriesSet {
        series: response
            .data
            .into_iter()
            .map(|s| Series {
                parameter: catalog
                    .get(s.id)
                    .cloned()
                    .unwrap_or_else(|| ParameterDescriptor::unknown(s.id, s.name)),
                points: s.data_values,
            })
            .collect(),
    }
}

/// Sort by timestamp (stable) and drop repeated timestamps, first one wins.
///
/// Returns how many points were dropped.
pub fn normalize_points(points: &mut Vec<DataPoint>) -> usize {
    let before = points.len();
    if !points.is_sorted_by_key(|p| p.timestamp) {
        points.sort_by_key(|p| p.timestamp);
    }
    points.dedup_by_key(|p| p.timestamp);
    before - points.len()
}

/// Align `set` on a shared clock.
///
/// The clock always covers every series in `set`. With a non-empty `requested`
/// list the columns are exactly those ids, in that order; ids missing from `set`
/// become all-`None` columns and series that were not requested get no column,
/// though their timestamps still get rows. With an empty `requested` list every
/// series in `set` becomes a column, in response order.
#[must_use]
pub fn align(set: SeriesSet, requested: &[ParameterId], catalog: &ParameterCatalog) -> AlignedSeries {
    let mut series = set.series;

    for s in &mut series {
        let dropped = normalize_points(&mut s.points);
        if dropped > 0 {
            tracing::warn!(
                parameter = %s.parameter.id,
                dropped,
                "Dropped points with repeated timestamps"
            );
        }
    }

    // 1. Union of every series' timestamps, sorted
    let clock: Vec<i64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.timestamp))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // 2. Timestamp -> clock index
    let time_index: HashMap<i64, usize> = clock.iter().enumerate().map(|(i, t)| (*t, i)).collect();

    let columns = select_columns(series, requested, catalog);

    // 3. Lay each column on the clock
    let columns = columns
        .into_iter()
        .map(|s| {
            let mut values = vec![None; clock.len()];
            for point in s.points {
                if let Some(&idx) = time_index.get(&point.timestamp) {
                    values[idx] = point.value;
                }
            }
            AlignedColumn {
                parameter: s.parameter,
                values,
            }
        })
        .collect();

    AlignedSeries { clock, columns }
}

fn select_columns(
    series: Vec<Series>,
    requested: &[ParameterId],
    catalog: &ParameterCatalog,
) -> Vec<Series> {
    if requested.is_empty() {
        let mut seen = BTreeSet::new();
        return series
            .into_iter()
            .filter(|s| {
                let first = seen.insert(s.parameter.id);
                if !first {
                    tracing::warn!(parameter = %s.parameter.id, "Ignoring repeated series in response");
                }
                first
            })
            .collect();
    }

    let mut by_id: HashMap<ParameterId, Series> = HashMap::with_capacity(series.len());
    for s in series {
        if by_id.contains_key(&s.parameter.id) {
            tracing::warn!(parameter = %s.parameter.id, "Ignoring repeated series in response");
            continue;
        }
        by_id.insert(s.parameter.id, s);
    }

    let mut columns = Vec::with_capacity(requested.len());
    for id in requested {
        match by_id.remove(id) {
            Some(s) => columns.push(s),
            None => {
                tracing::debug!(parameter = %id, "No data returned for requested parameter");
                columns.push(Series {
                    parameter: catalog
                        .get(*id)
                        .cloned()
                        .unwrap_or_else(|| ParameterDescriptor::unknown(*id, None)),
                    points: Vec::new(),
                });
            }
        }
    }

    for id in by_id.keys() {
        tracing::debug!(parameter = %id, "Series not requested, keeping its rows without a column");
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::models::SampleValue;

    fn series(id: i64, points: &[(i64, f64)]) -> Series {
        Series {
            parameter: ParameterDescriptor::unknown(ParameterId(id), None),
            points: points.iter().map(|&(t, v)| DataPoint::new(t, v)).collect(),
        }
    }

    #[test]
    fn normalize_points_sorts_and_keeps_first_duplicate() {
        let mut points = vec![
            DataPoint::new(20, 2.0),
            DataPoint::new(10, 1.0),
            DataPoint::new(20, 3.0),
        ];
        assert_eq!(normalize_points(&mut points), 1);
        assert_eq!(points, vec![DataPoint::new(10, 1.0), DataPoint::new(20, 2.0)]);
    }

    #[test]
    fn missing_timestamp_becomes_none() {
        let set = SeriesSet {
            series: vec![
                series(1, &[(0, 1.0), (10, 2.0), (20, 3.0)]),
                series(2, &[(0, 5.0), (20, 6.0)]),
            ],
        };
        let aligned = align(set, &[], &ParameterCatalog::default());

        assert_eq!(aligned.clock, vec![0, 10, 20]);
        let rows = aligned.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].timestamp, 10);
        assert_eq!(
            rows[1].cells,
            vec![Some(SampleValue::Number(2.0)), None]
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let aligned = align(SeriesSet::default(), &[], &ParameterCatalog::default());
        assert!(aligned.is_empty());
        assert!(aligned.rows().is_empty());
        assert!(aligned.chart_series().is_empty());
    }

    #[test]
    fn unrequested_series_keep_their_rows_but_no_column() {
        let set = SeriesSet {
            series: vec![series(1, &[(0, 1.0)]), series(2, &[(5, 2.0)])],
        };
        let aligned = align(set, &[ParameterId(2)], &ParameterCatalog::default());
        assert_eq!(aligned.clock, vec![0, 5]);
        assert_eq!(aligned.columns.len(), 1);
        assert_eq!(aligned.columns[0].parameter.id, ParameterId(2));
        assert_eq!(
            aligned.columns[0].values,
            vec![None, Some(SampleValue::Number(2.0))]
        );
    }
}
