use crate::{command::Command, context::CommandExecutionContext, error::AppResult};
use async_trait::async_trait;

/// 命令处理器：通过执行上下文加载/创建聚合并调用其行为方法
///
/// 处理器只负责让聚合产生事件，事件的提交与发布由执行器完成。
/// 遇到版本冲突时执行器会在全新的上下文上重新调用处理器，因此处理器不应有外部副作用。
#[async_trait]
pub trait CommandHandler<C>: Send + Sync
where
    C: Command,
{
    async fn handle(&self, ctx: &mut CommandExecutionContext, cmd: &C) -> AppResult<()>;
}
