use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("a simulation run is already active")]
    AlreadyRunning,

    #[error("no simulation run is active")]
    NotRunning,

    #[error("a run must be started from inside a tokio runtime")]
    NoRuntime,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not write trace: {0}")]
    TraceWrite(#[from] csv::Error),
}

pub type SimResult<T> = Result<T, SimError>;
