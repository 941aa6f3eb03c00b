//! Alignment properties of the series normalizer.
//!
//! Run with: cargo test --test normalizer_test

use serde_json::json;

use envmon_dashboard::error::AppError;
use envmon_dashboard::series::models::{
    DataPoint, ParameterDescriptor, ParameterId, SampleValue, Series, SeriesSet,
};
use envmon_dashboard::series::normalizer::{align, series_from_json};
use envmon_dashboard::services::ParameterCatalog;

fn catalog() -> ParameterCatalog {
    ParameterCatalog::from_descriptors([
        ParameterDescriptor {
            id: ParameterId(1),
            name: "Temperature".to_string(),
            unit: Some("C".to_string()),
            description: None,
            kind: None,
        },
        ParameterDescriptor {
            id: ParameterId(2),
            name: "Dissolved Oxygen".to_string(),
            unit: Some("mg/L".to_string()),
            description: None,
            kind: None,
        },
    ])
}

fn series(id: i64, points: &[(i64, f64)]) -> Series {
    Series {
        parameter: ParameterDescriptor::unknown(ParameterId(id), None),
        points: points.iter().map(|&(t, v)| DataPoint::new(t, v)).collect(),
    }
}

#[test]
fn gap_in_one_series_yields_null_cell() {
    let set = SeriesSet {
        series: vec![
            series(1, &[(0, 1.0), (10, 2.0), (20, 3.0)]),
            series(2, &[(0, 4.0), (20, 5.0)]),
        ],
    };
    let aligned = align(set, &[ParameterId(1), ParameterId(2)], &catalog());
    let rows = aligned.rows();

    assert_eq!(rows.iter().map(|r| r.timestamp).collect::<Vec<_>>(), vec![0, 10, 20]);
    assert_eq!(rows[1].cells, vec![Some(SampleValue::Number(2.0)), None]);
    assert_eq!(
        rows[2].cells,
        vec![Some(SampleValue::Number(3.0)), Some(SampleValue::Number(5.0))]
    );
}

#[test]
fn one_row_per_distinct_timestamp_and_one_cell_per_requested_id() {
    let set = SeriesSet {
        series: vec![
            series(1, &[(30, 1.0), (5, 2.0), (30, 9.0)]),
            series(2, &[(5, 3.0), (7, 4.0)]),
        ],
    };
    let requested = [ParameterId(2), ParameterId(1), ParameterId(3)];
    let aligned = align(set, &requested, &catalog());

    assert_eq!(aligned.clock, vec![5, 7, 30]);
    for row in aligned.rows() {
        assert_eq!(row.cells.len(), requested.len());
    }
    // First occurrence of a repeated timestamp wins
    assert_eq!(
        aligned.column(ParameterId(1)).unwrap().values[2],
        Some(SampleValue::Number(1.0))
    );
}

#[test]
fn requested_but_missing_series_is_all_null() {
    let set = SeriesSet {
        series: vec![series(1, &[(0, 1.0), (10, 2.0)])],
    };
    let aligned = align(set, &[ParameterId(1), ParameterId(2)], &catalog());

    let missing = aligned.column(ParameterId(2)).expect("column synthesized");
    assert_eq!(missing.parameter.name, "Dissolved Oxygen");
    assert_eq!(missing.values, vec![None, None]);

    let chart = aligned.chart_series();
    assert_eq!(chart[1].points, vec![(0, None), (10, None)]);
}

#[test]
fn unrequested_series_still_contribute_rows() {
    let set = SeriesSet {
        series: vec![
            series(1, &[(0, 1.0)]),
            series(2, &[(5, 2.0), (10, 3.0)]),
        ],
    };
    let aligned = align(set, &[ParameterId(1)], &catalog());

    assert_eq!(aligned.clock, vec![0, 5, 10]);
    assert_eq!(aligned.columns.len(), 1);
    assert_eq!(
        aligned.columns[0].values,
        vec![Some(SampleValue::Number(1.0)), None, None]
    );
}

#[test]
fn normalizing_normalized_input_is_a_no_op() {
    let set = SeriesSet {
        series: vec![
            series(1, &[(0, 1.0), (10, 2.0)]),
            series(2, &[(10, 3.0), (20, 4.0)]),
        ],
    };
    let aligned = align(set.clone(), &[], &catalog());
    assert_eq!(aligned.to_series_set(), set);

    let again = align(aligned.to_series_set(), &[], &catalog());
    assert_eq!(again, aligned);
}

#[test]
fn empty_response_renders_as_empty_table() {
    let set = series_from_json(r#"{"data": []}"#, &catalog()).unwrap();
    assert!(set.is_empty());

    let aligned = align(set, &[ParameterId(1)], &catalog());
    assert!(aligned.is_empty());
    assert!(aligned.rows().is_empty());
    assert_eq!(aligned.columns.len(), 1);
}

#[test]
fn values_keep_their_wire_form() {
    let body = json!({
        "data": [
            {"id": 1, "dataValues": [
                {"timestamp": 20, "value": "7.25"},
                {"timestamp": 10, "value": null}
            ]}
        ]
    })
    .to_string();
    let set = series_from_json(&body, &catalog()).unwrap();
    assert_eq!(set.series[0].parameter.name, "Temperature");

    let aligned = align(set, &[], &catalog());
    assert_eq!(aligned.clock, vec![10, 20]);
    assert_eq!(
        aligned.columns[0].values,
        vec![None, Some(SampleValue::Text("7.25".to_string()))]
    );
    assert_eq!(aligned.chart_series()[0].points, vec![(10, None), (20, Some(7.25))]);
}

#[test]
fn malformed_responses_fail_fast() {
    let cases = [
        r#"{}"#,
        r#"{"data": {"id": 1}}"#,
        r#"{"data": [{"id": 1, "dataValues": [{"value": 1.0}]}]}"#,
        r#"{"data": [{"id": 1, "dataValues": [{"timestamp": 1}]}]}"#,
        r#"{"data": [{"id": 1}]}"#,
    ];
    for body in cases {
        let err = series_from_json(body, &catalog()).unwrap_err();
        assert!(
            matches!(err, AppError::MalformedResponse(_)),
            "{body} gave {err:?}"
        );
    }
}

#[test]
fn unknown_ids_fall_back_to_response_name() {
    let body = json!({"data": [{"id": 99, "name": "Turbidity", "dataValues": []}]}).to_string();
    let set = series_from_json(&body, &catalog()).unwrap();
    assert_eq!(set.series[0].parameter.name, "Turbidity");
    assert_eq!(set.series[0].parameter.unit, None);
}
