use sourcing_domain::domain_event::DomainEvent;
use sourcing_macros::domain_event;

#[domain_event(version = 3)]
enum BankEvent {
    #[event(event_type = "bank.opened")]
    Opened { name: String },
    #[event(event_type = "bank.renamed", event_version = 5)]
    Renamed { to: String },
    Closed {},
    #[event(sourcing = false)]
    Audited { by: String },
}

// 已声明的 id 字段原样保留
#[domain_event]
#[derive(Eq)]
enum PlainEvent {
    Happened { id: String, note: String },
}

#[test]
fn event_type_and_version_overrides() {
    let opened = BankEvent::Opened {
        id: "e-1".into(),
        aggregate_id: "b-1".into(),
        name: "main".into(),
    };
    let renamed = BankEvent::Renamed {
        id: "e-2".into(),
        aggregate_id: "b-1".into(),
        to: "side".into(),
    };
    let closed = BankEvent::Closed {
        id: "e-3".into(),
        aggregate_id: "b-1".into(),
    };

    assert_eq!(opened.event_type(), "bank.opened");
    assert_eq!(opened.event_version(), 3);
    assert_eq!(renamed.event_type(), "bank.renamed");
    assert_eq!(renamed.event_version(), 5);
    assert_eq!(closed.event_type(), "BankEvent.Closed");
    assert_eq!(closed.event_id(), "e-3");
}

#[test]
fn sourcing_id_follows_variant_marker() {
    let opened = BankEvent::Opened {
        id: "e-1".into(),
        aggregate_id: "b-1".into(),
        name: "main".into(),
    };
    let audited = BankEvent::Audited {
        id: "e-9".into(),
        by: "ops".into(),
    };

    assert_eq!(opened.sourcing_id(), Some("b-1"));
    assert_eq!(audited.sourcing_id(), None);
}

#[test]
fn existing_fields_are_kept() {
    let e = PlainEvent::Happened {
        id: "p-1".into(),
        aggregate_id: "x-1".into(),
        note: "n".into(),
    };
    assert_eq!(e.event_id(), "p-1");
    assert_eq!(e.event_type(), "PlainEvent.Happened");
    assert_eq!(e.event_version(), 1);
    assert_eq!(e.clone(), e);
}
