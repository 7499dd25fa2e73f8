//! 领域事件（Domain Event）与事件流
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、一次命令对单个聚合提交的
//! 事件流（`EventStream`），以及分发给事件处理器的 `EventEnvelope`。

mod domain_event_trait;
mod event_envelope;
mod event_stream;
mod metadata;

pub use domain_event_trait::DomainEvent;
pub use event_envelope::EventEnvelope;
pub use event_stream::EventStream;
pub use metadata::Metadata;
