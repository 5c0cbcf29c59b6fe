use std::{io, path::PathBuf, sync::Arc};

pub type Result<T, E = FmtError> = std::result::Result<T, E>;

/// Errors surfaced by the formatter pipe.
///
/// `Clone` so that a terminal error can be delivered to the output stream and
/// returned from [`PipeEngine::finish`](crate::engine::PipeEngine::finish).
#[derive(Clone, Debug, thiserror::Error)]
pub enum FmtError {
    /// The options do not resolve to a file type. Raised before any spawn.
    #[error("{0}")]
    Configuration(String),
    /// The formatter exited unsuccessfully; the payload is its stderr with
    /// ANSI sequences removed.
    #[error("{0}")]
    ProcessFailure(String),
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("pipe i/o error: {0}")]
    Io(#[source] Arc<io::Error>),
    #[error("invalid pipe state: {0}")]
    InvalidState(&'static str),
    #[error("pipe cancelled")]
    Cancelled,
}

impl FmtError {
    pub fn no_extension(file_name: &str) -> Self {
        Self::Configuration(format!(
            "Could not determine extension from file name '{}'",
            file_name
        ))
    }

    pub fn is_process_failure(&self) -> bool {
        matches!(self, Self::ProcessFailure(_))
    }
}

impl From<io::Error> for FmtError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}
