//! 聚合仓储
//!
//! `AggregateRepository` 只负责按 `(聚合类型, 聚合ID)` 取回已提交的事件流，保持对象安全，
//! 便于以 `Arc<dyn AggregateRepository>` 注入命令执行上下文；
//! 类型化的加载与重放由 `AggregateRepositoryExt::get` 完成。
//!
use crate::{
    aggregate::Aggregate,
    error::{DomainError, DomainResult},
    persist::{CommitLog, SerializedEventStream, deserialize_events},
    type_code::TypeCodeProvider,
};
use async_trait::async_trait;
use bon::Builder;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait AggregateRepository: Send + Sync {
    /// 按提交顺序返回该聚合的全部事件流
    async fn load_streams(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>>;

    /// 事件类型码
    fn type_codes(&self) -> &dyn TypeCodeProvider;
}

#[async_trait]
pub trait AggregateRepositoryExt: AggregateRepository {
    /// 加载并重放聚合，无任何历史时返回 `None`
    async fn get<A>(&self, aggregate_id: &A::Id) -> DomainResult<Option<A>>
    where
        A: Aggregate,
    {
        let id = aggregate_id.to_string();
        let streams = self.load_streams(A::TYPE, &id).await?;

        rebuild::<A>(aggregate_id, &streams, self.type_codes())
    }
}

#[async_trait]
impl<T> AggregateRepositoryExt for T where T: AggregateRepository + ?Sized {}

/// 依次重放事件流重建聚合
///
/// 每条流的起始版本必须与当前版本衔接，否则视为历史缺口。
pub fn rebuild<A>(
    aggregate_id: &A::Id,
    streams: &[SerializedEventStream],
    codes: &dyn TypeCodeProvider,
) -> DomainResult<Option<A>>
where
    A: Aggregate,
{
    if streams.is_empty() {
        return Ok(None);
    }

    let mut aggregate = A::new(aggregate_id.clone());

    for stream in streams {
        if stream.start_version() != aggregate.version() {
            return Err(DomainError::invalid_state(format!(
                "aggregate [{}:{}] history gap: at version {}, next stream starts at {}",
                A::TYPE,
                aggregate_id,
                aggregate.version(),
                stream.start_version()
            )));
        }

        let events = deserialize_events::<A::Event>(stream.events(), codes)?;
        for event in &events {
            aggregate.replay(event);
        }
    }

    Ok(Some(aggregate))
}

/// 基于提交日志的聚合仓储
#[derive(Builder)]
pub struct EventSourcedRepository {
    commit_log: Arc<dyn CommitLog>,
    type_codes: Arc<dyn TypeCodeProvider>,
}

#[async_trait]
impl AggregateRepository for EventSourcedRepository {
    async fn load_streams(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>> {
        let found = self
            .commit_log
            .find_by_aggregate(aggregate_type, aggregate_id)
            .await?;

        debug!(
            aggregate_type,
            aggregate_id,
            streams = found.len(),
            "event streams loaded"
        );
        Ok(found)
    }

    fn type_codes(&self) -> &dyn TypeCodeProvider {
        self.type_codes.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::entity::Entity;
    use crate::persist::{InMemoryCommitLog, serialize_events};
    use crate::type_code::TypeCodeRegistry;
    use sourcing_macros::{aggregate, domain_event};

    #[domain_event]
    enum CounterEvent {
        Opened {},
        Added { amount: i64 },
    }

    #[aggregate(event = CounterEvent)]
    struct Counter {
        total: i64,
    }

    impl Aggregate for Counter {
        const TYPE: &'static str = "counter";

        fn apply(&mut self, event: &Self::Event) {
            if let CounterEvent::Added { amount, .. } = event {
                self.total += amount;
            }
        }
    }

    fn codes() -> Arc<dyn TypeCodeProvider> {
        Arc::new(
            TypeCodeRegistry::new()
                .register(1, "CounterEvent.Opened")
                .unwrap()
                .register(2, "CounterEvent.Added")
                .unwrap(),
        )
    }

    fn added(id: &str, amount: i64) -> CounterEvent {
        CounterEvent::Added {
            id: ulid::Ulid::new().to_string(),
            aggregate_id: id.to_string(),
            amount,
        }
    }

    async fn commit(
        log: &InMemoryCommitLog,
        codes: &dyn TypeCodeProvider,
        cmd: &str,
        id: &str,
        version: usize,
        events: &[CounterEvent],
    ) {
        let stream = SerializedEventStream::new(
            cmd,
            id,
            Counter::TYPE,
            version,
            serialize_events(events, codes).unwrap(),
        )
        .unwrap();
        log.append(stream).await.unwrap();
    }

    #[tokio::test]
    async fn get_replays_only_its_own_streams() {
        let log = Arc::new(InMemoryCommitLog::new());
        let codes = codes();

        commit(
            &log,
            codes.as_ref(),
            "c0",
            "k-1",
            1,
            &[CounterEvent::Opened {
                id: ulid::Ulid::new().to_string(),
                aggregate_id: "k-1".into(),
            }],
        )
        .await;
        for v in 2..=5 {
            commit(&log, codes.as_ref(), &format!("o{v}"), "k-2", v - 1, &[added("k-2", 100)]).await;
            commit(&log, codes.as_ref(), &format!("c{v}"), "k-1", v, &[added("k-1", v as i64)]).await;
        }

        let repo = EventSourcedRepository::builder()
            .commit_log(log.clone())
            .type_codes(codes)
            .build();

        let counter: Counter = repo.get(&"k-1".to_string()).await.unwrap().unwrap();
        assert_eq!(counter.version(), 5);
        assert_eq!(counter.total, 2 + 3 + 4 + 5);
        assert!(counter.uncommitted_events().is_empty());

        let missing: Option<Counter> = repo.get(&"k-9".to_string()).await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn history_gap_is_rejected() {
        let codes = codes();
        let events = serialize_events(&[added("k-1", 1)], codes.as_ref()).unwrap();
        let stream = SerializedEventStream::new("c1", "k-1", Counter::TYPE, 3, events).unwrap();

        let err = rebuild::<Counter>(&"k-1".to_string(), &[stream], codes.as_ref()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }
}
