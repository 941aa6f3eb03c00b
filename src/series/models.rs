use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Backend key of a monitored parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(pub i64);

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a parameter's values come from. Matches the backend's mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Sensor,
    Manual,
}

impl ParameterKind {
    #[must_use]
    pub fn from_mask_bit(bit: u8) -> Option<Self> {
        match bit {
            1 => Some(Self::Sensor),
            2 => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Immutable description of one parameter, as loaded from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub id: ParameterId,
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub kind: Option<ParameterKind>,
}

impl ParameterDescriptor {
    /// Placeholder for an id the catalog does not know about.
    #[must_use]
    pub fn unknown(id: ParameterId, name: Option<String>) -> Self {
        Self {
            id,
            name: name.unwrap_or_else(|| format!("Parameter {id}")),
            unit: None,
            description: None,
            kind: None,
        }
    }
}

/// An observed value exactly as the backend sent it.
///
/// Readings come back as JSON numbers or as numeric strings depending on the
/// backend table, so both are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Numeric view for plotting. Text that is not a finite number yields `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One observation: epoch milliseconds and an optional value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: i64,
    /// `null` is allowed, a missing field is not.
    #[serde(deserialize_with = "required_nullable")]
    pub value: Option<SampleValue>,
}

impl DataPoint {
    #[must_use]
    pub fn new(timestamp: i64, value: impl Into<SampleValue>) -> Self {
        Self {
            timestamp,
            value: Some(value.into()),
        }
    }

    #[must_use]
    pub fn null(timestamp: i64) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for SampleValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

fn required_nullable<'de, D>(deserializer: D) -> Result<Option<SampleValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<SampleValue>::deserialize(deserializer)
}

/// One parameter with its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub parameter: ParameterDescriptor,
    pub points: Vec<DataPoint>,
}

/// The result of one query, in response order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSet {
    pub series: Vec<Series>,
}

impl SeriesSet {
    /// True when there are no series or none of them has a point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }
}

/// A table row: one timestamp, one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub timestamp: i64,
    pub cells: Vec<Option<SampleValue>>,
}

/// One column of the aligned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedColumn {
    pub parameter: ParameterDescriptor,
    /// Same length as the clock, `None` where the parameter has no observation.
    pub values: Vec<Option<SampleValue>>,
}

/// Points of one series laid on the shared clock, ready for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub id: ParameterId,
    pub name: String,
    pub unit: Option<String>,
    pub points: Vec<(i64, Option<f64>)>,
}

/// Requested series aligned on the union of every returned series' timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignedSeries {
    /// Sorted, deduplicated timestamps across all input series.
    pub clock: Vec<i64>,
    pub columns: Vec<AlignedColumn>,
}

impl AlignedSeries {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clock.is_empty()
    }

    #[must_use]
    pub fn column(&self, id: ParameterId) -> Option<&AlignedColumn> {
        self.columns.iter().find(|c| c.parameter.id == id)
    }

    /// Row-per-timestamp view for tabular display.
    #[must_use]
    pub fn rows(&self) -> Vec<AlignedRow> {
        self.clock
            .iter()
            .enumerate()
            .map(|(i, &timestamp)| AlignedRow {
                timestamp,
                cells: self
                    .columns
                    .iter()
                    .map(|c| c.values.get(i).cloned().flatten())
                    .collect(),
            })
            .collect()
    }

    /// Column-per-series view for plotting. Values are coerced to numbers here.
    #[must_use]
    pub fn chart_series(&self) -> Vec<ChartSeries> {
        self.columns
            .iter()
            .map(|c| ChartSeries {
                id: c.parameter.id,
                name: c.parameter.name.clone(),
                unit: c.parameter.unit.clone(),
                points: self
                    .clock
                    .iter()
                    .zip(&c.values)
                    .map(|(&t, v)| (t, v.as_ref().and_then(SampleValue::as_f64)))
                    .collect(),
            })
            .collect()
    }

    /// Convert back to per-series points, dropping empty cells.
    #[must_use]
    pub fn to_series_set(&self) -> SeriesSet {
        SeriesSet {
            series: self
                .columns
                .iter()
                .map(|c| Series {
                    parameter: c.parameter.clone(),
                    points: self
                        .clock
                        .iter()
                        .zip(&c.values)
                        .filter_map(|(&timestamp, v)| {
                            v.clone().map(|value| DataPoint {
                                timestamp,
                                value: Some(value),
                            })
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
