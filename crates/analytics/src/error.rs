use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Unknown metric '{0}' for this dataset")]
    UnknownMetric(String),
}
