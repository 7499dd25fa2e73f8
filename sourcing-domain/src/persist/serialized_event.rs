//! 事件持久化模型（SerializedEvent）
//!
//! 事件在提交日志与线上传输中的标准形态：类型名由整型类型码代替，
//! 载荷保持为 `serde_json::Value`，由消费方按类型码解析后再反序列化。
//!
use crate::{
    domain_event::{DomainEvent, EventStream},
    error::{DomainError, DomainResult},
    type_code::TypeCodeProvider,
};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// 事件唯一标识符
    event_id: String,
    /// 事件类型码
    type_code: i32,
    /// 溯源事件携带的聚合标识
    sourcing_id: Option<String>,
    /// 事件负载
    payload: Value,
}

/// 线上事件流
pub type SerializedEventStream = EventStream<SerializedEvent>;

impl SerializedEvent {
    pub fn from_event<E>(event: &E, codes: &dyn TypeCodeProvider) -> DomainResult<Self>
    where
        E: DomainEvent,
    {
        Ok(Self::builder()
            .event_id(event.event_id().to_string())
            .type_code(codes.type_code(event.event_type())?)
            .maybe_sourcing_id(event.sourcing_id().map(str::to_string))
            .payload(serde_json::to_value(event)?)
            .build())
    }

    /// 按类型码还原具体事件，类型名不一致时报 `TypeMismatch`
    pub fn decode<E>(&self, codes: &dyn TypeCodeProvider) -> DomainResult<E>
    where
        E: DomainEvent,
    {
        let expected = codes.type_name(self.type_code)?;
        let event: E = serde_json::from_value(self.payload.clone())?;

        if event.event_type() != expected {
            return Err(DomainError::TypeMismatch {
                expected: expected.to_string(),
                found: event.event_type().to_string(),
            });
        }

        Ok(event)
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn type_code(&self) -> i32 {
        self.type_code
    }

    pub fn sourcing_id(&self) -> Option<&str> {
        self.sourcing_id.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

pub fn serialize_events<E>(
    events: &[E],
    codes: &dyn TypeCodeProvider,
) -> DomainResult<Vec<SerializedEvent>>
where
    E: DomainEvent,
{
    events
        .iter()
        .map(|e| SerializedEvent::from_event(e, codes))
        .collect()
}

pub fn deserialize_events<E>(
    events: &[SerializedEvent],
    codes: &dyn TypeCodeProvider,
) -> DomainResult<Vec<E>>
where
    E: DomainEvent,
{
    events.iter().map(|e| e.decode(codes)).collect()
}
