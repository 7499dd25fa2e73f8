//! 命令执行器（CommandExecutor）
//!
//! 按命令类型码路由到处理器，在全新的执行上下文上运行处理器，
//! 为每个产生了事件的聚合生成一条事件流并整体原子提交，随后在事件总线上发布。
//! 提交时发生版本冲突则清空上下文、重新加载聚合并从头重试。
//!
use crate::{
    command::Command,
    command_handler::CommandHandler,
    context::CommandExecutionContext,
    error::{AppError, AppResult},
    message::{CommandMessage, CommandResult, CommandStatus},
};
use async_trait::async_trait;
use bon::Builder;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use sourcing_domain::{
    error::DomainError,
    eventing::EventBus,
    persist::{AggregateRepository, CommitLog, SerializedEventStream},
    type_code::TypeCodeProvider,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

type CmdHandlerFuture<'a> = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'a>>;

type CmdHandlerFn = Arc<
    dyn for<'a> Fn(&'a Value, &'a mut CommandExecutionContext) -> CmdHandlerFuture<'a>
        + Send
        + Sync,
>;

/// 命令执行器：执行一条命令消息并给出结果
///
/// 结果以返回值的形式交付，调用方可直接等待或放入 `tokio::spawn` 的任务中。
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, message: &CommandMessage) -> CommandResult;
}

/// 执行器配置
#[derive(Clone, Copy, Debug)]
pub struct CommandExecutorConfig {
    /// 版本冲突后的最大重试次数
    pub max_retries: usize,
    /// 首次执行前检查该命令是否已提交过事件
    pub check_command_waiting: bool,
}

impl Default for CommandExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            check_command_waiting: true,
        }
    }
}

#[derive(Builder)]
pub struct DefaultCommandExecutor {
    repository: Arc<dyn AggregateRepository>,
    commit_log: Arc<dyn CommitLog>,
    command_codes: Arc<dyn TypeCodeProvider>,
    event_bus: Option<Arc<dyn EventBus>>,
    #[builder(default)]
    config: CommandExecutorConfig,
    #[builder(skip)]
    handlers: DashMap<&'static str, CmdHandlerFn>,
}

impl DefaultCommandExecutor {
    /// 注册命令处理器，同一命令只能注册一次
    pub fn register<C, H>(&self, handler: Arc<H>) -> AppResult<()>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        match self.handlers.entry(C::NAME) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredCommand { command: C::NAME }),
            Entry::Vacant(slot) => {
                slot.insert(handler_fn::<C, H>(handler));
                Ok(())
            }
        }
    }

    #[tracing::instrument(
        name = "execute_command",
        skip_all,
        fields(command_id = %message.command_id, type_code = message.type_code)
    )]
    async fn run(&self, message: &CommandMessage) -> AppResult<Vec<String>> {
        let command_name = self.command_codes.type_name(message.type_code)?;
        let handler = self
            .handlers
            .get(command_name)
            .map(|h| h.value().clone())
            .ok_or_else(|| AppError::HandlerNotFound(command_name.to_string()))?;

        let mut ctx = CommandExecutionContext::new(&message.command_id, self.repository.clone());
        ctx.set_check_command_waiting(self.config.check_command_waiting);

        if ctx.check_command_waiting() {
            let committed = self
                .commit_log
                .find_by_correlation(&message.command_id)
                .await?;
            if !committed.is_empty() {
                info!(command = command_name, "command already committed, handler skipped");
                // 上次提交后的发布可能失败，重新发布由下游按投递键去重
                self.publish(&committed).await;
                return Ok(aggregate_ids(&committed));
            }
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            handler(&message.payload, &mut ctx).await?;

            match self.commit(&mut ctx).await {
                Ok(streams) => {
                    debug!(attempt, streams = streams.len(), "command committed");
                    self.publish(&streams).await;
                    return Ok(aggregate_ids(&streams));
                }
                Err(err) if err.is_concurrency_conflict() && attempt <= self.config.max_retries => {
                    warn!(attempt, error = %err, "concurrency conflict, retrying command");
                    ctx.reset();
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// 为每个有未提交事件的聚合生成一条事件流，整体追加
    async fn commit(
        &self,
        ctx: &mut CommandExecutionContext,
    ) -> AppResult<Vec<SerializedEventStream>> {
        let correlation_id = ctx.correlation_id().to_string();
        let codes = self.repository.type_codes();

        let mut tracked: Vec<_> = ctx.tracked_aggregates_mut().collect();
        tracked.sort_by_key(|a| a.tracked_id());

        let mut streams = Vec::new();
        for aggregate in tracked.iter() {
            if let Some(stream) = aggregate.to_event_stream(&correlation_id, codes)? {
                streams.push(stream);
            }
        }
        if streams.is_empty() {
            return Ok(streams);
        }

        let sequences = self.commit_log.append_all(streams.clone()).await?;
        for aggregate in tracked {
            aggregate.clear_committed_events();
        }

        for (stream, sequence) in streams.iter().zip(sequences) {
            debug!(
                sequence,
                aggregate_type = stream.aggregate_type(),
                aggregate_id = stream.aggregate_id(),
                version = stream.version(),
                "event stream committed"
            );
        }

        Ok(streams)
    }

    async fn publish(&self, streams: &[SerializedEventStream]) {
        let Some(bus) = &self.event_bus else { return };
        if streams.is_empty() {
            return;
        }

        // 事件已持久化，发布失败只影响下游的及时性
        if let Err(err) = bus.publish_batch(streams).await {
            warn!(error = %err, "failed to publish committed event streams");
        }
    }
}

#[async_trait]
impl CommandExecutor for DefaultCommandExecutor {
    async fn execute(&self, message: &CommandMessage) -> CommandResult {
        match self.run(message).await {
            Ok(aggregate_ids) => CommandResult::success(&message.command_id, aggregate_ids),
            Err(err) => {
                let status = status_of(&err);
                warn!(command_id = %message.command_id, ?status, error = %err, "command not executed");
                CommandResult::failure(&message.command_id, status, err.to_string())
            }
        }
    }
}

fn handler_fn<C, H>(handler: Arc<H>) -> CmdHandlerFn
where
    C: Command,
    H: CommandHandler<C> + 'static,
{
    Arc::new(move |payload, ctx| {
        let handler = handler.clone();

        Box::pin(async move {
            let cmd: C = serde_json::from_value(payload.clone()).map_err(|e| {
                AppError::from(DomainError::InvalidCommand {
                    reason: format!("malformed [{}] payload: {e}", C::NAME),
                })
            })?;
            handler.handle(ctx, &cmd).await
        })
    })
}

fn status_of(err: &AppError) -> CommandStatus {
    match err {
        AppError::AggregateNotFound { .. }
        | AppError::Domain(DomainError::InvalidCommand { .. }) => CommandStatus::Failed,
        _ => CommandStatus::Fault,
    }
}

fn aggregate_ids(streams: &[SerializedEventStream]) -> Vec<String> {
    let ids: BTreeSet<&str> = streams.iter().map(|s| s.aggregate_id()).collect();
    ids.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcing_domain::persist::SerializedEvent;

    #[test]
    fn domain_failures_map_to_failed() {
        let not_found = AppError::AggregateNotFound {
            id: "n-1".into(),
            aggregate_type: "note",
        };
        let invalid = AppError::Domain(DomainError::InvalidCommand {
            reason: "title empty".into(),
        });
        assert_eq!(status_of(&not_found), CommandStatus::Failed);
        assert_eq!(status_of(&invalid), CommandStatus::Failed);
    }

    #[test]
    fn everything_else_is_a_fault() {
        let conflict = AppError::Domain(DomainError::ConcurrencyConflict {
            aggregate_id: "n-1".into(),
            expected: 0,
            actual: 1,
        });
        assert!(conflict.is_concurrency_conflict());
        assert_eq!(status_of(&conflict), CommandStatus::Fault);
        assert_eq!(
            status_of(&AppError::HandlerFault("boom".into())),
            CommandStatus::Fault
        );
        assert_eq!(
            status_of(&AppError::HandlerNotFound("X".into())),
            CommandStatus::Fault
        );
    }

    fn stream(cmd: &str, aggregate_id: &str, version: usize) -> SerializedEventStream {
        let event = SerializedEvent::builder()
            .event_id(format!("{cmd}-{aggregate_id}-{version}"))
            .type_code(100)
            .sourcing_id(aggregate_id.to_string())
            .payload(serde_json::json!({}))
            .build();
        SerializedEventStream::new(cmd, aggregate_id, "note", version, vec![event]).unwrap()
    }

    #[test]
    fn aggregate_ids_are_unique_and_ordered() {
        let streams = [
            stream("cmd-1", "n-b", 1),
            stream("cmd-1", "n-a", 1),
            stream("cmd-1", "n-b", 2),
        ];
        assert_eq!(aggregate_ids(&streams), vec!["n-a", "n-b"]);
        assert!(aggregate_ids(&[]).is_empty());
    }
}
