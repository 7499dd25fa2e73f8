use crate::error::{DomainError, DomainResult};
use crate::persist::{SerializedEvent, SerializedEventStream};

use super::domain_event_trait::DomainEvent;
use super::metadata::Metadata;

/// 事件信封：分发给事件处理器的单个事件，包含流元数据、解析后的类型名与原始载荷
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub metadata: Metadata,
    /// 事件在所属事件流中的下标（从 0 开始）
    pub index: usize,
    pub event_type: String,
    pub payload: SerializedEvent,
}

impl EventEnvelope {
    pub fn new(
        stream: &SerializedEventStream,
        index: usize,
        event_type: impl Into<String>,
        payload: SerializedEvent,
    ) -> Self {
        let metadata = Metadata::builder()
            .correlation_id(stream.correlation_id().to_string())
            .aggregate_id(stream.aggregate_id().to_string())
            .aggregate_type(stream.aggregate_type().to_string())
            .stream_version(stream.version())
            .occurred_at(*stream.timestamp())
            .build();

        Self {
            metadata,
            index,
            event_type: event_type.into(),
            payload,
        }
    }

    /// 将载荷反序列化为具体事件类型，并校验类型名一致
    pub fn decode<E: DomainEvent>(&self) -> DomainResult<E> {
        let event: E = serde_json::from_value(self.payload.payload().clone())?;
        if event.event_type() != self.event_type {
            return Err(DomainError::TypeMismatch {
                expected: self.event_type.clone(),
                found: event.event_type().to_string(),
            });
        }
        Ok(event)
    }
}
