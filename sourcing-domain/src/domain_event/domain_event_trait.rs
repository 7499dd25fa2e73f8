use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
pub trait DomainEvent:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 事件唯一标识
    fn event_id(&self) -> &str;

    /// 事件类型（形如 `NoteEvent.Created` 或自定义类型名），用于类型码映射与处理器匹配
    fn event_type(&self) -> &str;

    /// 事件载荷版本
    fn event_version(&self) -> usize;

    /// 溯源事件携带的聚合标识；非溯源事件返回 `None`
    ///
    /// 基础设施依据聚合首个溯源事件上的标识，把持久化的事件归属到对应的聚合流。
    fn sourcing_id(&self) -> Option<&str>;
}
