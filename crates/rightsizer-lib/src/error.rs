//! Error types for the rightsizer pipeline

use crate::scheduler::CronError;
use thiserror::Error;

/// Failures that abort a run before anything is computed or written
///
/// A failed write is not an error: it is reported as a `Failed` result
/// carrying the collaborator's message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported workload kind '{0}'")]
    UnsupportedKind(String),

    #[error("failed to read {what} for {key}: {source}")]
    Source {
        what: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid schedule: {0}")]
    InvalidCron(#[from] CronError),
}

impl Error {
    pub(crate) fn read(what: &'static str, key: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Source {
            what,
            key: key.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
