pub mod system;

use crate::snapshot::Snapshot;
use thiserror::Error;

pub use system::SysinfoProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("не удалось получить метрику {field}: {reason}")]
    FieldFailure { field: &'static str, reason: String },
}

impl ProviderError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ProviderError::FieldFailure {
            field,
            reason: reason.into(),
        }
    }
}

/// Source of point-in-time host readings.
///
/// A missing optional sensor is reported as `None` inside the snapshot; an
/// `Err` means a required metric could not be read and the whole sample is
/// unusable.
pub trait MetricsProvider {
    fn sample(&mut self) -> Result<Snapshot, ProviderError>;
}
