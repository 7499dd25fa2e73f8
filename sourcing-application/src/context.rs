//! 命令执行上下文（CommandExecutionContext）
//!
//! 一次命令执行尝试内被触及的聚合都登记在上下文中：
//! - `add` 登记新创建的聚合，要求其已产生携带自身标识的溯源事件；
//! - `get`/`get_or_default` 优先返回已登记的实例，否则经仓储重放加载并登记；
//! - 执行器在处理器返回后遍历 `tracked_aggregates` 收集未提交事件。
//!
//! 上下文只被单个任务持有，版本冲突重试前通过 `reset` 清空。
//!
use crate::error::{AppError, AppResult};
use sourcing_domain::{
    aggregate::Aggregate,
    domain_event::EventStream,
    error::DomainResult,
    persist::{AggregateRepository, AggregateRepositoryExt, SerializedEventStream, serialize_events},
    type_code::TypeCodeProvider,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 类型擦除后的被跟踪聚合
pub trait TrackedAggregate: Send + Sync {
    fn tracked_id(&self) -> String;

    fn tracked_type(&self) -> &'static str;

    /// 已提交的版本
    fn committed_version(&self) -> usize;

    /// 未提交事件个数
    fn pending_events(&self) -> usize;

    /// 将未提交事件打包为一条事件流；没有未提交事件时返回 `None`
    fn to_event_stream(
        &self,
        correlation_id: &str,
        codes: &dyn TypeCodeProvider,
    ) -> DomainResult<Option<SerializedEventStream>>;

    /// 事件流提交成功后清空缓冲
    fn clear_committed_events(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A> TrackedAggregate for A
where
    A: Aggregate,
{
    fn tracked_id(&self) -> String {
        self.id().to_string()
    }

    fn tracked_type(&self) -> &'static str {
        A::TYPE
    }

    fn committed_version(&self) -> usize {
        self.version()
    }

    fn pending_events(&self) -> usize {
        self.uncommitted_events().len()
    }

    fn to_event_stream(
        &self,
        correlation_id: &str,
        codes: &dyn TypeCodeProvider,
    ) -> DomainResult<Option<SerializedEventStream>> {
        let events = self.uncommitted_events();
        if events.is_empty() {
            return Ok(None);
        }

        let stream = EventStream::new(
            correlation_id,
            self.id().to_string(),
            A::TYPE,
            self.version() + events.len(),
            serialize_events(events, codes)?,
        )?;
        Ok(Some(stream))
    }

    fn clear_committed_events(&mut self) {
        self.clear_uncommitted_events();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct CommandExecutionContext {
    correlation_id: String,
    check_command_waiting: bool,
    repository: Arc<dyn AggregateRepository>,
    tracked: HashMap<String, Box<dyn TrackedAggregate>>,
}

impl CommandExecutionContext {
    pub fn new(correlation_id: impl Into<String>, repository: Arc<dyn AggregateRepository>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            check_command_waiting: true,
            repository,
            tracked: HashMap::new(),
        }
    }

    /// 关联ID（即命令ID）
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn check_command_waiting(&self) -> bool {
        self.check_command_waiting
    }

    pub fn set_check_command_waiting(&mut self, value: bool) {
        self.check_command_waiting = value;
    }

    /// 登记一个新创建的聚合
    ///
    /// 聚合必须已分配标识，且至少产生了一个携带自身标识的溯源事件。
    /// 同一标识重复登记时保留先登记的实例。
    pub fn add<A>(&mut self, aggregate: A) -> AppResult<()>
    where
        A: Aggregate,
    {
        if !aggregate.has_identity() {
            return Err(AppError::InvalidArgument(format!(
                "aggregate [{}] has no identity",
                A::TYPE
            )));
        }

        if aggregate.sourcing_event().is_none() {
            return Err(AppError::UnsupportedAggregate(format!(
                "aggregate [{}:{}] has no sourcing event, cannot be added",
                A::TYPE,
                aggregate.id()
            )));
        }

        let id = aggregate.id().to_string();
        debug!(aggregate_type = A::TYPE, aggregate_id = %id, "aggregate added");
        self.tracked.entry(id).or_insert_with(|| Box::new(aggregate));
        Ok(())
    }

    /// 获取聚合，不存在时返回 `AggregateNotFound`
    pub async fn get<A>(&mut self, id: &A::Id) -> AppResult<&mut A>
    where
        A: Aggregate,
    {
        self.get_or_default::<A>(id)
            .await?
            .ok_or_else(|| AppError::AggregateNotFound {
                id: id.to_string(),
                aggregate_type: A::TYPE,
            })
    }

    /// 获取聚合，不存在时返回 `None`
    ///
    /// 已登记的实例直接返回，不会再访问仓储。
    pub async fn get_or_default<A>(&mut self, id: &A::Id) -> AppResult<Option<&mut A>>
    where
        A: Aggregate,
    {
        let key = id.to_string();
        if key.is_empty() {
            return Err(AppError::InvalidArgument(format!(
                "empty id for aggregate [{}]",
                A::TYPE
            )));
        }

        if !self.tracked.contains_key(&key) {
            let Some(aggregate) = self.repository.get::<A>(id).await? else {
                return Ok(None);
            };
            debug!(
                aggregate_type = A::TYPE,
                aggregate_id = %key,
                version = aggregate.version(),
                "aggregate loaded"
            );
            self.tracked.insert(key.clone(), Box::new(aggregate));
        }

        let Some(tracked) = self.tracked.get_mut(&key) else {
            return Ok(None);
        };
        let found = tracked.tracked_type();

        tracked
            .as_any_mut()
            .downcast_mut::<A>()
            .map(Some)
            .ok_or(AppError::TypeMismatch {
                expected: A::TYPE,
                found,
            })
    }

    /// 当前登记的全部聚合
    pub fn tracked_aggregates(&self) -> impl Iterator<Item = &dyn TrackedAggregate> {
        self.tracked.values().map(|a| a.as_ref())
    }

    pub(crate) fn tracked_aggregates_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut Box<dyn TrackedAggregate>> {
        self.tracked.values_mut()
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// 清空登记，用于从头重试
    pub fn reset(&mut self) {
        self.tracked.clear();
    }
}
