use sourcing_macros::entity_id;
use std::collections::HashSet;

#[entity_id]
struct NoteId(String);

#[entity_id]
struct Seq(u64);

#[test]
fn display_and_parse_delegate_to_inner() {
    let id = NoteId::new("n-1".to_string());
    assert_eq!(id.to_string(), "n-1");
    assert_eq!("n-1".parse::<NoteId>().unwrap(), id);
    assert_eq!(id.as_ref(), "n-1");
    assert!(NoteId::default().to_string().is_empty());

    let seq: Seq = "42".parse().unwrap();
    assert_eq!(u64::from(seq), 42);
    assert!("x".parse::<Seq>().is_err());
}

#[test]
fn ids_are_hashable_values() {
    let set: HashSet<NoteId> = ["a", "b", "a"]
        .into_iter()
        .map(|s| NoteId::from(s.to_string()))
        .collect();
    assert_eq!(set.len(), 2);
}
