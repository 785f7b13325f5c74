//! The sandboxed runner's leaf error type, mirroring `broker::BrokerError`'s shape: every
//! variant the subsystem can raise, plus one `From` impl mapping it onto
//! the shared `crate::error::Error` taxonomy.

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("container engine transport error: {0}")]
    Transport(String),

    #[error("run timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("staging failed: {0}")]
    Staging(String),

    #[error("artifact collection failed: {0}")]
    Artifacts(String),
}

impl From<RunnerError> for crate::error::Error {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Transport(detail) => crate::error::Error::transport(detail),
            RunnerError::Timeout(d) => crate::error::Error::transport(format!("run timed out after {d:?}")),
            RunnerError::Staging(detail) => crate::error::Error::Internal(format!("staging failed: {detail}")),
            RunnerError::Artifacts(detail) => {
                crate::error::Error::Internal(format!("artifact collection failed: {detail}"))
            }
        }
    }
}
