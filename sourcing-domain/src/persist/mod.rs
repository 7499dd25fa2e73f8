//! 持久化与事件溯源（persist）
//!
//! - 事件的持久化形态与批量编解码（`SerializedEvent`）；
//! - 追加式提交日志协议及内存实现（`CommitLog`/`InMemoryCommitLog`）；
//! - 基于提交日志重放的聚合仓储（`AggregateRepository`/`EventSourcedRepository`）。
//!
//! 具体存储后端由上层提供实现并注入。
//!
mod aggregate_repository;
mod commit_log;
mod serialized_event;

pub use aggregate_repository::{
    AggregateRepository, AggregateRepositoryExt, EventSourcedRepository, rebuild,
};
pub use commit_log::{CommitLog, InMemoryCommitLog};
pub use serialized_event::{
    SerializedEvent, SerializedEventStream, deserialize_events, serialize_events,
};
