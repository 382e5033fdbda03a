use pps_model::ValidationError;
use thiserror::Error;

/// Failures surfaced by the data manager.
///
/// Clone so a single background failure can be reported on the bus and
/// still handed to the waiting ticket.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{op} failed: {message}")]
    Storage { op: &'static str, message: String },
    #[error("foreground loop stopped")]
    ForegroundStopped,
}

impl DataError {
    pub(crate) fn storage(op: &'static str, err: anyhow::Error) -> Self {
        Self::Storage {
            op,
            message: format!("{err:#}"),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

pub type DataResult<T> = Result<T, DataError>;
