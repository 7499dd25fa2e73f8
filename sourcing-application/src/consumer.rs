//! 命令消费者（CommandConsumer）
//!
//! 接收传输层投递的命令消息：按命令ID登记确认句柄，重复投递直接跳过；
//! 新命令在独立任务中执行，结果发送给发起方后再确认入站消息。
//!
use crate::{
    error::AppResult,
    executor::CommandExecutor,
    message::{CommandMessage, CommandResult},
};
use async_trait::async_trait;
use bon::Builder;
use sourcing_domain::inbound::{AckHandle, InboundCorrelationRegistry, Registration};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 命令结果发送器：把执行结果回复到命令消息指定的主题
#[async_trait]
pub trait CommandResultSender: Send + Sync {
    async fn send(&self, result: &CommandResult, reply_topic: Option<&str>) -> AppResult<()>;
}

#[derive(Builder)]
pub struct CommandConsumer {
    executor: Arc<dyn CommandExecutor>,
    result_sender: Arc<dyn CommandResultSender>,
    #[builder(default)]
    correlations: Arc<InboundCorrelationRegistry<Box<dyn AckHandle>>>,
}

impl CommandConsumer {
    /// 处理一条入站命令
    ///
    /// 同一命令ID仍在处理中时，重复投递的句柄被丢弃且不确认，返回 `None`；
    /// 否则返回执行任务的句柄，任务完成时入站消息恰好被确认一次。
    pub fn handle(
        &self,
        message: CommandMessage,
        ack: Box<dyn AckHandle>,
    ) -> Option<JoinHandle<CommandResult>> {
        if let Registration::Duplicate(_) =
            self.correlations.try_register(message.command_id.clone(), ack)
        {
            debug!(command_id = %message.command_id, "duplicate command delivery skipped");
            return None;
        }

        let executor = self.executor.clone();
        let sender = self.result_sender.clone();
        let correlations = self.correlations.clone();

        Some(tokio::spawn(async move {
            let result = executor.execute(&message).await;

            if let Err(err) = sender.send(&result, message.reply_topic.as_deref()).await {
                warn!(command_id = %message.command_id, error = %err, "failed to send command result");
            }

            if let Some(ack) = correlations.try_resolve(&message.command_id) {
                ack.acknowledge();
            }

            result
        }))
    }

    /// 处理中的命令数量
    pub fn in_flight(&self) -> usize {
        self.correlations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CommandStatus;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct GatedExecutor {
        gate: Arc<Notify>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandExecutor for GatedExecutor {
        async fn execute(&self, message: &CommandMessage) -> CommandResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            CommandResult::success(&message.command_id, vec!["n-1".into()])
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(CommandResult, Option<String>)>>,
    }

    #[async_trait]
    impl CommandResultSender for RecordingSender {
        async fn send(&self, result: &CommandResult, reply_topic: Option<&str>) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((result.clone(), reply_topic.map(str::to_string)));
            Ok(())
        }
    }

    fn message(id: &str) -> CommandMessage {
        CommandMessage {
            command_id: id.into(),
            type_code: 1,
            payload: json!({}),
            reply_topic: Some("replies".into()),
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped_and_first_acked_once() {
        let gate = Arc::new(Notify::new());
        let executor = Arc::new(GatedExecutor {
            gate: gate.clone(),
            calls: AtomicUsize::new(0),
        });
        let sender = Arc::new(RecordingSender::default());
        let consumer = CommandConsumer::builder()
            .executor(executor.clone())
            .result_sender(sender.clone())
            .build();

        let acks = Arc::new(AtomicUsize::new(0));
        let ack = |acks: &Arc<AtomicUsize>| -> Box<dyn AckHandle> {
            let acks = acks.clone();
            Box::new(move || {
                acks.fetch_add(1, Ordering::SeqCst);
            })
        };

        let task = consumer
            .handle(message("cmd-1"), ack(&acks))
            .expect("first delivery accepted");
        assert!(consumer.handle(message("cmd-1"), ack(&acks)).is_none());
        assert_eq!(consumer.in_flight(), 1);

        gate.notify_one();
        let result = task.await.unwrap();

        assert_eq!(result.status, CommandStatus::Success);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(acks.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.in_flight(), 0);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.as_deref(), Some("replies"));
    }
}
