//! 提交日志（CommitLog）
//!
//! 事件流的追加式持久化：每次追加一条完整事件流并分配严格递增的提交序号（从 1 开始）。
//! 追加时按 `(聚合类型, 聚合ID)` 做乐观并发校验：流的起始版本必须等于该聚合当前已提交的版本。
//! 一次命令对多个聚合的提交通过 `append_all` 整体校验、整体写入。
//!
use crate::{
    error::{DomainError, DomainResult},
    persist::SerializedEventStream,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// 按序号扫描时的分页大小
const SCAN_PAGE_SIZE: usize = 256;

#[async_trait]
pub trait CommitLog: Send + Sync {
    /// 原子追加一组事件流，返回各自的提交序号
    ///
    /// 任一流版本冲突时整体失败，不写入任何流。
    async fn append_all(&self, streams: Vec<SerializedEventStream>) -> DomainResult<Vec<u64>>;

    /// 追加一条事件流，返回其提交序号
    async fn append(&self, stream: SerializedEventStream) -> DomainResult<u64> {
        self.append_all(vec![stream])
            .await?
            .first()
            .copied()
            .ok_or_else(|| DomainError::CommitLog {
                reason: "append returned no sequence".into(),
            })
    }

    /// 按提交序号读取
    async fn get(&self, sequence: u64) -> DomainResult<Option<SerializedEventStream>>;

    /// 从 `start` 起按序号顺序读取至多 `size` 条
    async fn query(&self, start: u64, size: usize) -> DomainResult<Vec<SerializedEventStream>>;

    /// 读取某次命令提交的全部事件流
    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>>;

    /// 按提交顺序读取某个聚合的全部事件流
    ///
    /// 默认按序号分页扫描整个日志，带聚合索引的实现应当覆盖。
    async fn find_by_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>> {
        let mut start = 1u64;
        let mut found = Vec::new();

        loop {
            let page = self.query(start, SCAN_PAGE_SIZE).await?;
            let fetched = page.len();

            found.extend(page.into_iter().filter(|s| {
                s.aggregate_type() == aggregate_type && s.aggregate_id() == aggregate_id
            }));

            if fetched < SCAN_PAGE_SIZE {
                break;
            }
            start += fetched as u64;
        }

        Ok(found)
    }
}

type AggregateKey = (String, String);

fn aggregate_key(stream: &SerializedEventStream) -> AggregateKey {
    (
        stream.aggregate_type().to_string(),
        stream.aggregate_id().to_string(),
    )
}

#[derive(Default)]
struct AggregateEntry {
    version: usize,
    /// 该聚合的流在 `streams` 中的下标
    positions: Vec<usize>,
}

#[derive(Default)]
struct LogState {
    /// 下标 i 对应序号 i + 1
    streams: Vec<SerializedEventStream>,
    aggregates: HashMap<AggregateKey, AggregateEntry>,
}

impl LogState {
    fn committed_version(&self, key: &AggregateKey) -> usize {
        self.aggregates.get(key).map(|a| a.version).unwrap_or(0)
    }
}

/// 内存提交日志
#[derive(Default)]
pub struct InMemoryCommitLog {
    state: RwLock<LogState>,
}

impl InMemoryCommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.streams.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.streams.is_empty()
    }
}

#[async_trait]
impl CommitLog for InMemoryCommitLog {
    async fn append_all(&self, streams: Vec<SerializedEventStream>) -> DomainResult<Vec<u64>> {
        let mut state = self.state.write().await;

        // 先整体校验，同一批内对同一聚合的多条流依次衔接
        let mut pending: HashMap<AggregateKey, usize> = HashMap::new();
        for stream in &streams {
            let key = aggregate_key(stream);
            let actual = pending
                .get(&key)
                .copied()
                .unwrap_or_else(|| state.committed_version(&key));
            let expected = stream.start_version();

            if actual != expected {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id().to_string(),
                    expected,
                    actual,
                });
            }
            pending.insert(key, stream.version());
        }

        let mut sequences = Vec::with_capacity(streams.len());
        for stream in streams {
            let position = state.streams.len();
            let entry = state.aggregates.entry(aggregate_key(&stream)).or_default();
            entry.version = stream.version();
            entry.positions.push(position);

            state.streams.push(stream);
            sequences.push(position as u64 + 1);
        }

        debug!(?sequences, "event streams appended");
        Ok(sequences)
    }

    async fn get(&self, sequence: u64) -> DomainResult<Option<SerializedEventStream>> {
        if sequence == 0 {
            return Ok(None);
        }

        let state = self.state.read().await;
        Ok(state.streams.get((sequence - 1) as usize).cloned())
    }

    async fn query(&self, start: u64, size: usize) -> DomainResult<Vec<SerializedEventStream>> {
        let state = self.state.read().await;
        let skip = start.saturating_sub(1) as usize;

        Ok(state.streams.iter().skip(skip).take(size).cloned().collect())
    }

    async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>> {
        let state = self.state.read().await;

        Ok(state
            .streams
            .iter()
            .filter(|s| s.correlation_id() == correlation_id)
            .cloned()
            .collect())
    }

    async fn find_by_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> DomainResult<Vec<SerializedEventStream>> {
        let state = self.state.read().await;
        let key = (aggregate_type.to_string(), aggregate_id.to_string());

        let Some(entry) = state.aggregates.get(&key) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .positions
            .iter()
            .filter_map(|&i| state.streams.get(i).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::SerializedEvent;
    use serde_json::json;

    fn stream(cmd: &str, id: &str, version: usize, n: usize) -> SerializedEventStream {
        let events = (0..n)
            .map(|_| {
                SerializedEvent::builder()
                    .event_id(ulid::Ulid::new().to_string())
                    .type_code(100)
                    .sourcing_id(id.to_string())
                    .payload(json!({}))
                    .build()
            })
            .collect();
        SerializedEventStream::new(cmd, id, "note", version, events).unwrap()
    }

    #[tokio::test]
    async fn sequences_start_at_one_and_increase() {
        let log = InMemoryCommitLog::new();
        assert_eq!(log.append(stream("c1", "n-1", 1, 1)).await.unwrap(), 1);
        assert_eq!(log.append(stream("c2", "n-1", 3, 2)).await.unwrap(), 2);
        assert_eq!(log.append(stream("c3", "n-2", 1, 1)).await.unwrap(), 3);

        assert!(log.get(0).await.unwrap().is_none());
        assert_eq!(log.get(2).await.unwrap().unwrap().correlation_id(), "c2");
        assert!(log.get(4).await.unwrap().is_none());

        let page = log.query(2, 10).await.unwrap();
        let cmds: Vec<_> = page.iter().map(|s| s.correlation_id()).collect();
        assert_eq!(cmds, vec!["c2", "c3"]);
        assert_eq!(log.find_by_correlation("c3").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_start_version_conflicts() {
        let log = InMemoryCommitLog::new();
        log.append(stream("c1", "n-1", 1, 1)).await.unwrap();

        let err = log.append(stream("c2", "n-1", 1, 1)).await.unwrap_err();
        match err {
            DomainError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => {
                assert_eq!(aggregate_id, "n-1");
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn conflicting_batch_writes_nothing() {
        let log = InMemoryCommitLog::new();
        log.append(stream("c1", "n-b", 1, 1)).await.unwrap();

        let err = log
            .append_all(vec![stream("c2", "n-a", 1, 1), stream("c2", "n-b", 1, 1)])
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert_eq!(log.len().await, 1);
        assert!(log.find_by_aggregate("note", "n-a").await.unwrap().is_empty());

        let sequences = log
            .append_all(vec![stream("c3", "n-a", 1, 1), stream("c3", "n-b", 2, 1)])
            .await
            .unwrap();
        assert_eq!(sequences, vec![2, 3]);
    }

    #[tokio::test]
    async fn batch_chains_streams_of_the_same_aggregate() {
        let log = InMemoryCommitLog::new();

        let sequences = log
            .append_all(vec![stream("c1", "n-1", 1, 1), stream("c1", "n-1", 3, 2)])
            .await
            .unwrap();
        assert_eq!(sequences, vec![1, 2]);

        let err = log
            .append_all(vec![stream("c2", "n-1", 4, 1), stream("c2", "n-1", 4, 1)])
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert_eq!(log.len().await, 2);
    }

    /// 只实现必需方法，走默认的分页扫描
    struct ScanOnly(InMemoryCommitLog);

    #[async_trait]
    impl CommitLog for ScanOnly {
        async fn append_all(&self, streams: Vec<SerializedEventStream>) -> DomainResult<Vec<u64>> {
            self.0.append_all(streams).await
        }

        async fn get(&self, sequence: u64) -> DomainResult<Option<SerializedEventStream>> {
            self.0.get(sequence).await
        }

        async fn query(&self, start: u64, size: usize) -> DomainResult<Vec<SerializedEventStream>> {
            self.0.query(start, size).await
        }

        async fn find_by_correlation(
            &self,
            correlation_id: &str,
        ) -> DomainResult<Vec<SerializedEventStream>> {
            self.0.find_by_correlation(correlation_id).await
        }
    }

    #[tokio::test]
    async fn indexed_and_scanned_lookups_agree() {
        let log = ScanOnly(InMemoryCommitLog::new());
        for v in 1..=300 {
            log.append(stream(&format!("a{v}"), "n-a", v, 1)).await.unwrap();
            if v % 2 == 0 {
                log.append(stream(&format!("b{v}"), "n-b", v / 2, 1)).await.unwrap();
            }
        }

        let scanned = log.find_by_aggregate("note", "n-a").await.unwrap();
        let indexed = log.0.find_by_aggregate("note", "n-a").await.unwrap();
        assert_eq!(scanned.len(), 300);
        assert_eq!(scanned, indexed);
        assert_eq!(scanned.last().unwrap().version(), 300);

        let other = log.0.find_by_aggregate("note", "n-b").await.unwrap();
        assert_eq!(other.len(), 150);
        assert!(log.find_by_aggregate("note", "n-c").await.unwrap().is_empty());
    }
}
