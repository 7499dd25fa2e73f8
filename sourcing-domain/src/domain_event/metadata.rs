use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件所在事件流的元数据
#[derive(Builder, Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    correlation_id: String,
    aggregate_id: String,
    aggregate_type: String,
    /// 事件流提交后聚合到达的版本
    stream_version: usize,
    occurred_at: DateTime<Utc>,
}

impl Metadata {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn stream_version(&self) -> usize {
        self.stream_version
    }

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }
}
