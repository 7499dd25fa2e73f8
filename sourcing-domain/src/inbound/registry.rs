use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// 登记结果
#[derive(Debug)]
pub enum Registration<H> {
    /// 新登记
    Accepted,
    /// 关联ID已存在，原样交还句柄
    Duplicate(H),
}

impl<H> Registration<H> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// 入站关联登记表：关联ID → 确认句柄
///
/// 登记与解析均为原子操作；同一条目只会被解析出一次，
/// 因此无论并发竞争如何，每条入站消息至多确认一次。
#[derive(Debug)]
pub struct InboundCorrelationRegistry<H> {
    entries: DashMap<String, H>,
}

impl<H> Default for InboundCorrelationRegistry<H> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<H> InboundCorrelationRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不存在时插入；已存在时拒绝并交还句柄（已有条目保持不变）
    pub fn try_register(&self, correlation_id: impl Into<String>, handle: H) -> Registration<H> {
        match self.entries.entry(correlation_id.into()) {
            Entry::Occupied(_) => Registration::Duplicate(handle),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Registration::Accepted
            }
        }
    }

    /// 原子移除并返回句柄；条目不存在时返回 `None`
    pub fn try_resolve(&self, correlation_id: &str) -> Option<H> {
        self.entries.remove(correlation_id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
