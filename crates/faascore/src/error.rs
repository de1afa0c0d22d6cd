use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaasError {
    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum FunctionError {
    #[error("Function not found: {0}")]
    NotFound(i64),

    #[error("Route already registered: {0}")]
    RouteTaken(String),

    #[error("No route registered: {0}")]
    UnknownRoute(String),

    #[error("Invalid function: {0}")]
    Invalid(String),

    #[error("No code provided in function settings")]
    MissingCode,
}

#[derive(Error, Debug, Clone)]
pub enum ExecError {
    #[error("Docker daemon is not running or accessible: {0}")]
    DaemonUnavailable(String),

    #[error("Container runtime not installed: {0}")]
    RuntimeUnavailable(String),

    #[error("Image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("Failed to spawn container process: {0}")]
    SpawnFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {seconds}s")]
    Timeout { seconds: u64 },
}
