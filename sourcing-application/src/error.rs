use sourcing_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported aggregate: {0}")]
    UnsupportedAggregate(String),

    #[error("aggregate not found: type={aggregate_type}, id={id}")]
    AggregateNotFound {
        id: String,
        aggregate_type: &'static str,
    },

    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("handler fault: {0}")]
    HandlerFault(String),
}

impl AppError {
    /// 是否为提交时的版本冲突（命令需要从头重试）
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::Domain(e) if e.is_concurrency_conflict())
    }
}

pub type AppResult<T> = Result<T, AppError>;
