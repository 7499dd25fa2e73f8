//! 内存版事件总线（InMemoryEventBus）
//!
//! 基于 `tokio::sync::broadcast` 的轻量实现，用于测试、示例与本地开发。
//! 无订阅者时发布的事件流被丢弃；订阅者落后超过缓冲容量时收到 `EventBus` 错误。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::eventing::EventBus;
use crate::persist::SerializedEventStream;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

#[derive(Clone)]
pub struct InMemoryEventBus {
    tx: broadcast::Sender<SerializedEventStream>,
}

impl InMemoryEventBus {
    /// `capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, stream: &SerializedEventStream) -> Result<()> {
        if self.tx.send(stream.clone()).is_err() {
            debug!(
                correlation_id = stream.correlation_id(),
                "no subscriber, event stream dropped"
            );
        }
        Ok(())
    }

    async fn subscribe(&self) -> BoxStream<'static, Result<SerializedEventStream>> {
        let rx = self.tx.subscribe();
        let stream =
            BroadcastStream::new(rx).map(|r| r.map_err(|e| DomainError::event_bus(e.to_string())));
        Box::pin(stream)
    }
}
