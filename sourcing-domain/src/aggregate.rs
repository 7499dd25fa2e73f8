//! 聚合（Aggregate）抽象
//!
//! 事件溯源聚合的核心能力：
//! - `raise` 将事件放入未提交缓冲（不改变版本）；
//! - `apply` 将事件投影到状态（由具体聚合实现）；
//! - `replay` 在重建时应用已提交事件并递增版本；
//! - 未提交缓冲只由基础设施在事件持久化后清空。
//!
//! 标识、版本与缓冲三项状态由 `#[aggregate]` 宏注入并实现 `Entity`/`EventSourced`。
//!
use crate::domain_event::DomainEvent;
use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};
use std::slice::Iter;

/// 未提交事件缓冲（FIFO，顺序即追加到提交日志的因果顺序）
#[derive(Debug, Clone, PartialEq)]
pub struct UncommittedEvents<E> {
    events: Vec<E>,
}

impl<E> Default for UncommittedEvents<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> UncommittedEvents<E> {
    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    pub fn iter(&self) -> Iter<'_, E> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// 事件溯源状态访问（由 `#[aggregate]` 宏生成）
pub trait EventSourced: Entity {
    /// 该聚合产生的领域事件类型
    type Event: DomainEvent;

    fn uncommitted(&self) -> &UncommittedEvents<Self::Event>;

    fn uncommitted_mut(&mut self) -> &mut UncommittedEvents<Self::Event>;

    fn version_mut(&mut self) -> &mut usize;
}

/// 聚合根接口
pub trait Aggregate: EventSourced + Default + 'static {
    const TYPE: &'static str;

    /// 应用事件，更新聚合状态（必须确定且无副作用）
    fn apply(&mut self, event: &Self::Event);

    /// 产生一个事件：仅放入未提交缓冲，不递增版本
    ///
    /// 聚合尚未分配标识时立即失败，下游依赖首个事件上的标识进行归属。
    fn raise(&mut self, event: Self::Event) -> DomainResult<()> {
        if !self.has_identity() {
            return Err(DomainError::invalid_state(format!(
                "aggregate [{}] has no identity, cannot raise [{}]",
                Self::TYPE,
                event.event_type()
            )));
        }

        self.uncommitted_mut().push(event);
        Ok(())
    }

    /// 当前未提交事件的只读有序视图
    fn uncommitted_events(&self) -> &[Self::Event] {
        self.uncommitted().as_slice()
    }

    /// 清空未提交事件（事件持久化之后由基础设施调用）
    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_mut().clear();
    }

    /// 重放一个已提交事件：应用状态并使版本加一
    fn replay(&mut self, event: &Self::Event) {
        self.apply(event);
        *self.version_mut() += 1;
    }

    /// 第一个携带自身标识的溯源事件
    fn sourcing_event(&self) -> Option<&Self::Event> {
        let id = self.id().to_string();
        self.uncommitted_events()
            .iter()
            .find(|e| e.sourcing_id() == Some(id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcing_macros::{aggregate, domain_event};

    #[domain_event(version = 1)]
    enum NoteEvent {
        Created {
            title: String,
        },
        TitleChanged {
            title: String,
        },
        #[event(sourcing = false)]
        Viewed {},
    }

    #[aggregate(event = NoteEvent)]
    struct Note {
        title: String,
    }

    impl Aggregate for Note {
        const TYPE: &'static str = "note";

        fn apply(&mut self, event: &Self::Event) {
            match event {
                NoteEvent::Created { title, .. } | NoteEvent::TitleChanged { title, .. } => {
                    self.title = title.clone();
                }
                NoteEvent::Viewed { .. } => {}
            }
        }
    }

    fn created(id: &str, title: &str) -> NoteEvent {
        NoteEvent::Created {
            id: ulid::Ulid::new().to_string(),
            aggregate_id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn title_changed(id: &str, title: &str) -> NoteEvent {
        NoteEvent::TitleChanged {
            id: ulid::Ulid::new().to_string(),
            aggregate_id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn raise_buffers_without_touching_version() {
        let mut note = Note::new("n-1".to_string());
        note.raise(created("n-1", "v1")).unwrap();
        note.raise(title_changed("n-1", "v2")).unwrap();

        assert_eq!(note.version(), 0);
        assert_eq!(note.uncommitted_events().len(), 2);
        assert_eq!(note.uncommitted_events()[0].event_type(), "NoteEvent.Created");
        assert_eq!(
            note.uncommitted_events()[1].event_type(),
            "NoteEvent.TitleChanged"
        );
    }

    #[test]
    fn clear_never_replays() {
        let mut note = Note::new("n-1".to_string());
        note.replay(&created("n-1", "v1"));
        for i in 0..5 {
            note.raise(title_changed("n-1", &format!("t{i}"))).unwrap();
        }

        note.clear_uncommitted_events();
        assert!(note.uncommitted_events().is_empty());
        assert_eq!(note.version(), 1);
        assert_eq!(note.title, "v1");
    }

    #[test]
    fn replay_counts_committed_events() {
        let history: Vec<NoteEvent> = std::iter::once(created("n-1", "t0"))
            .chain((1..7).map(|i| title_changed("n-1", &format!("t{i}"))))
            .collect();

        let mut note = Note::new("n-1".to_string());
        for e in &history {
            note.replay(e);
        }

        assert_eq!(note.version(), history.len());
        assert!(note.uncommitted_events().is_empty());
        assert_eq!(note.title, "t6");
    }

    #[test]
    fn raise_without_identity_fails_fast() {
        let mut note = Note::default();
        let err = note.raise(created("", "v1")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert!(note.uncommitted_events().is_empty());
    }

    #[test]
    fn sourcing_event_must_carry_own_identity() {
        let mut note = Note::new("n-1".to_string());
        note.raise(NoteEvent::Viewed {
            id: ulid::Ulid::new().to_string(),
        })
        .unwrap();
        assert!(note.sourcing_event().is_none());

        note.raise(created("n-2", "other")).unwrap();
        assert!(note.sourcing_event().is_none());

        note.raise(created("n-1", "mine")).unwrap();
        let found = note.sourcing_event().expect("sourcing event");
        assert_eq!(found.sourcing_id(), Some("n-1"));
    }
}
