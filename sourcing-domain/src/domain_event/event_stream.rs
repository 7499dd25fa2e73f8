use crate::error::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件流：一次命令对单个聚合产生并提交的有序事件集合
///
/// 不变式：`events` 非空；按顺序应用后聚合从 `version - events.len()` 前进到 `version`。
/// 反序列化同样校验该不变式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "EventStreamRepr<E>",
    bound(deserialize = "E: Deserialize<'de>")
)]
pub struct EventStream<E> {
    /// 发起命令的标识
    correlation_id: String,
    aggregate_id: String,
    aggregate_type: String,
    /// 应用本流后聚合到达的版本
    version: usize,
    timestamp: DateTime<Utc>,
    events: Vec<E>,
}

/// 线上形态，校验通过后才成为 `EventStream`
#[derive(Deserialize)]
struct EventStreamRepr<E> {
    correlation_id: String,
    aggregate_id: String,
    aggregate_type: String,
    version: usize,
    timestamp: DateTime<Utc>,
    events: Vec<E>,
}

impl<E> TryFrom<EventStreamRepr<E>> for EventStream<E> {
    type Error = DomainError;

    fn try_from(repr: EventStreamRepr<E>) -> DomainResult<Self> {
        check_window(&repr.aggregate_id, repr.version, repr.events.len())?;
        Ok(Self {
            correlation_id: repr.correlation_id,
            aggregate_id: repr.aggregate_id,
            aggregate_type: repr.aggregate_type,
            version: repr.version,
            timestamp: repr.timestamp,
            events: repr.events,
        })
    }
}

fn check_window(aggregate_id: &str, version: usize, len: usize) -> DomainResult<()> {
    if len == 0 {
        return Err(DomainError::invalid_argument(format!(
            "event stream of aggregate [{aggregate_id}] has no events"
        )));
    }
    if version < len {
        return Err(DomainError::invalid_argument(format!(
            "event stream of aggregate [{aggregate_id}] advances to version {version} with {len} events"
        )));
    }
    Ok(())
}

impl<E> EventStream<E> {
    pub fn new(
        correlation_id: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        version: usize,
        events: Vec<E>,
    ) -> DomainResult<Self> {
        let aggregate_id = aggregate_id.into();
        check_window(&aggregate_id, version, events.len())?;

        Ok(Self {
            correlation_id: correlation_id.into(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            events,
        })
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn version(&self) -> usize {
        self.version
    }

    /// 应用本流之前聚合所处的版本（提交时的期望版本）
    pub fn start_version(&self) -> usize {
        self.version.saturating_sub(self.events.len())
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn into_events(self) -> Vec<E> {
        self.events
    }

    /// 入站投递的关联键
    ///
    /// 同一命令可能为多个聚合各提交一条流，因此以 `关联ID:聚合ID` 区分每一次投递。
    pub fn delivery_key(&self) -> String {
        format!("{}:{}", self.correlation_id, self.aggregate_id)
    }
}
