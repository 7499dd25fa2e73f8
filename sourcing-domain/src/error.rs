//! 领域层统一错误定义
//!
//! 聚焦序列化/类型码解析、事件系统、提交日志与并发冲突、命令与状态校验等最小必要集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/类型解析 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("unresolvable type code: {code}")]
    UnresolvableTypeCode { code: i32 },
    #[error("unresolvable type name: {name}")]
    UnresolvableTypeName { name: String },
    #[error("duplicate type registration: code={code}, name={name}")]
    DuplicateTypeCode { code: i32, name: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件系统 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },

    // --- 提交日志/持久化 ---
    #[error("commit log error: {reason}")]
    CommitLog { reason: String },
    #[error("concurrency conflict: aggregate={aggregate_id}, expected={expected}, actual={actual}")]
    ConcurrencyConflict {
        aggregate_id: String,
        expected: usize,
        actual: usize,
    },

    // --- 领域规则/命令与状态 ---
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("invalid command: {reason}")]
    InvalidCommand { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
}

impl DomainError {
    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// 是否为提交时的版本冲突（命令需要从头重试）
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
