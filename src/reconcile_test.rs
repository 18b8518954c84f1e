use super::*;
use crate::message::{Role, TempId, TempKind};

fn conv() -> ConversationId {
    ConversationId::from("c1")
}

fn user(id: i64, text: &str) -> Message {
    Message::persisted(id, conv(), Role::User, text)
}

fn assistant(id: i64, text: &str) -> Message {
    Message::persisted(id, conv(), Role::Assistant, text)
}

fn ids(list: &[Message]) -> Vec<MessageId> {
    list.iter().map(|m| m.id).collect()
}

fn placeholders(at: i64) -> (Message, Message) {
    (Message::user_placeholder(conv(), 1, "hello", at), Message::thinking_placeholder(conv(), at + 1))
}

// =============================================================
// Ordering
// =============================================================

#[test]
fn permanent_ids_sort_ascending() {
    let merged = merge(&[], &[user(3, "c"), user(1, "a"), user(2, "b")], &[]);
    assert_eq!(
        ids(&merged),
        vec![MessageId::Permanent(1), MessageId::Permanent(2), MessageId::Permanent(3)]
    );
}

#[test]
fn temporaries_sort_after_permanents_by_issue_time() {
    let (u, t) = placeholders(50);
    let merged = merge(&[t.clone(), u.clone()], &[user(900, "real")], &[]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(900), u.id, t.id]);
}

#[test]
fn equal_issue_times_keep_insertion_order() {
    let a = MessageId::Temporary(TempId { kind: TempKind::Detached, issued_at: 0, nonce: 9 });
    let b = MessageId::Temporary(TempId { kind: TempKind::Detached, issued_at: 0, nonce: 1 });
    let mut first = user(0, "first");
    first.id = a;
    let mut second = user(0, "second");
    second.id = b;
    let merged = merge(&[], &[first, second], &[]);
    assert_eq!(ids(&merged), vec![a, b]);
}

// =============================================================
// Deduplication and overlay
// =============================================================

#[test]
fn incoming_wins_on_id_collision() {
    let merged = merge(&[user(1, "old")], &[user(1, "new")], &[]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].text, "new");
}

#[test]
fn duplicates_inside_batch_collapse() {
    let merged = merge(&[], &[user(1, "a"), user(1, "b"), user(2, "c")], &[]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(1), MessageId::Permanent(2)]);
    assert_eq!(merged[0].text, "b");
}

#[test]
fn merge_is_idempotent() {
    let current = vec![user(1, "a")];
    let batch = vec![user(3, "c"), assistant(2, "b")];
    let once = merge(&current, &batch, &[]);
    let twice = merge(&once, &batch, &[]);
    assert_eq!(once, twice);
}

#[test]
fn empty_batch_returns_current_unchanged() {
    let current = vec![user(1, "a"), user(2, "b")];
    let merged = merge(&current, &[], &[]);
    assert_eq!(merged, current);
}

#[test]
fn animation_hint_survives_overlay() {
    let mut flagged = assistant(2, "hi");
    flagged.should_animate = true;
    let merged = merge(&[flagged], &[assistant(2, "hi")], &[]);
    assert!(merged[0].should_animate);
}

// =============================================================
// Placeholder eviction
// =============================================================

#[test]
fn named_placeholders_are_evicted_by_permanent_batch() {
    let (u, t) = placeholders(1000);
    let merged = merge(&[u.clone(), t.clone()], &[user(5, "hello"), assistant(6, "hi there")], &[u.id, t.id]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(5), MessageId::Permanent(6)]);
}

#[test]
fn unnamed_placeholders_survive() {
    let (u1, t1) = placeholders(1000);
    let (u2, t2) = placeholders(2000);
    let current = vec![u1.clone(), t1.clone(), u2.clone(), t2.clone()];
    let merged = merge(&current, &[user(5, "hello"), assistant(6, "hi")], &[u1.id, t1.id]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(5), MessageId::Permanent(6), u2.id, t2.id]);
}

#[test]
fn no_eviction_without_permanent_ids_in_batch() {
    let (u, t) = placeholders(1000);
    let mut detached = user(0, "x");
    detached.id = MessageId::Temporary(TempId { kind: TempKind::Detached, issued_at: 0, nonce: 3 });
    let merged = merge(&[u.clone(), t.clone()], &[detached], &[u.id, t.id]);
    assert!(merged.iter().any(|m| m.id == u.id));
    assert!(merged.iter().any(|m| m.id == t.id));
}

#[test]
fn evict_counts_only_named_temporaries() {
    let (u, t) = placeholders(1000);
    let mut list = vec![user(1, "a"), u.clone(), t.clone()];
    assert_eq!(evict(&mut list, &[u.id, MessageId::Permanent(1)]), 1);
    assert_eq!(ids(&list), vec![MessageId::Permanent(1), t.id]);
    assert_eq!(evict(&mut list, &[]), 0);
}

#[test]
fn superseded_list_never_removes_permanent_messages() {
    let merged = merge(&[user(1, "a")], &[user(2, "b")], &[MessageId::Permanent(1)]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(1), MessageId::Permanent(2)]);
}

#[test]
fn assistant_only_batch_is_plain_union() {
    let merged = merge(&[user(1, "q")], &[assistant(2, "a")], &[]);
    assert_eq!(ids(&merged), vec![MessageId::Permanent(1), MessageId::Permanent(2)]);
}

// =============================================================
// without / apply
// =============================================================

#[test]
fn without_removes_named_ids_and_keeps_order() {
    let list = vec![user(1, "a"), user(2, "b"), user(3, "c")];
    let rest = without(&list, &[MessageId::Permanent(2)]);
    assert_eq!(ids(&rest), vec![MessageId::Permanent(1), MessageId::Permanent(3)]);
}

#[test]
fn apply_replaces_stored_list() {
    let mut store = ConversationStore::new();
    store.set_messages(&conv(), vec![user(1, "a")]);
    apply(&mut store, &conv(), &[user(2, "b")], &[]);
    assert_eq!(ids(store.messages(&conv())), vec![MessageId::Permanent(1), MessageId::Permanent(2)]);
}

#[test]
fn apply_empty_batch_keeps_same_list_allocation() {
    let mut store = ConversationStore::new();
    store.set_messages(&conv(), vec![user(1, "a"), user(2, "b")]);
    let before = store.snapshot(&conv());
    apply(&mut store, &conv(), &[], &[]);
    assert!(std::sync::Arc::ptr_eq(&before, &store.snapshot(&conv())));
}
