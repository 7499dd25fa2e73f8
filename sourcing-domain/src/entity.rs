//! 实体（Entity）基础抽象
//!
//! 为聚合与实体提供统一的标识（Id）与版本能力。
//!
use std::{fmt::Display, str::FromStr};

/// 具备唯一标识与版本的实体抽象
pub trait Entity: Send + Sync {
    /// 实体标识类型，要求可解析、可显示与可克隆
    type Id: FromStr + Clone + Display + Send + Sync;

    /// 使用给定标识创建实体（版本为 0）
    fn new(aggregate_id: Self::Id) -> Self;

    /// 获取实体标识
    fn id(&self) -> &Self::Id;

    /// 获取当前版本（仅反映已提交的历史）
    fn version(&self) -> usize;

    /// 是否已分配标识，空标识视为未分配
    fn has_identity(&self) -> bool {
        !self.id().to_string().is_empty()
    }
}
