//! 事件总线（EventBus）协议
//!
//! 已提交事件流的发布与订阅抽象，订阅返回 'static 生命周期的流，
//! 以便在异步运行时（如 tokio::spawn）中消费。
//!
use crate::{error::DomainResult as Result, persist::SerializedEventStream};
use async_trait::async_trait;
use futures_core::stream::BoxStream;

/// 事件总线：负责分发事件流与订阅事件流
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, stream: &SerializedEventStream) -> Result<()>;

    async fn publish_batch(&self, streams: &[SerializedEventStream]) -> Result<()> {
        for stream in streams {
            self.publish(stream).await?;
        }
        Ok(())
    }

    /// 返回一个 'static 生命周期的事件流，便于在 tokio::spawn 中使用
    async fn subscribe(&self) -> BoxStream<'static, Result<SerializedEventStream>>;
}
