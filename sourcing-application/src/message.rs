//! 命令消息与命令结果
//!
use crate::command::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sourcing_domain::{error::DomainResult, type_code::TypeCodeProvider};

/// 入站命令消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command_id: String,
    /// 命令类型码
    pub type_code: i32,
    pub payload: Value,
    /// 命令结果的回复主题
    pub reply_topic: Option<String>,
}

impl CommandMessage {
    pub fn from_command<C>(
        command_id: impl Into<String>,
        command: &C,
        codes: &dyn TypeCodeProvider,
        reply_topic: Option<String>,
    ) -> DomainResult<Self>
    where
        C: Command + Serialize,
    {
        Ok(Self {
            command_id: command_id.into(),
            type_code: codes.type_code(C::NAME)?,
            payload: serde_json::to_value(command)?,
            reply_topic,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Success,
    /// 领域失败（如聚合不存在、命令非法）
    Failed,
    /// 处理器故障、基础设施错误或重试耗尽
    Fault,
}

/// 命令执行结果，发送给命令发起方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: String,
    pub status: CommandStatus,
    /// 本次命令提交了事件的聚合
    pub aggregate_ids: Vec<String>,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success(command_id: impl Into<String>, aggregate_ids: Vec<String>) -> Self {
        Self {
            command_id: command_id.into(),
            status: CommandStatus::Success,
            aggregate_ids,
            message: None,
        }
    }

    pub fn failure(
        command_id: impl Into<String>,
        status: CommandStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            command_id: command_id.into(),
            status,
            aggregate_ids: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }
}
