pub mod export;
pub mod models;
pub mod normalizer;

pub use models::{
    AlignedColumn, AlignedRow, AlignedSeries, ChartSeries, DataPoint, ParameterDescriptor,
    ParameterId, ParameterKind, SampleValue, Series, SeriesSet,
};
