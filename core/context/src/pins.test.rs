use super::*;
use pretty_assertions::assert_eq;

#[test]
fn insert_and_render() {
    let mut store = PinStore::new(1024);
    store.insert(Pin::new("standards", "use snake_case"));
    store.insert(Pin::new("constraint", "no network calls"));
    assert_eq!(store.len(), 2);

    let rendered = store.render(Instant::now()).unwrap();
    assert!(rendered.contains("[standards] use snake_case"));
    assert!(rendered.contains("[constraint] no network calls"));
}

#[test]
fn reinserting_an_id_replaces_it() {
    let mut store = PinStore::new(1024);
    store.insert(Pin::new("standards", "old"));
    store.insert(Pin::new("standards", "new"));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("standards").unwrap().content, "new");
}

#[test]
fn budget_evicts_lowest_priority_first() {
    let mut store = PinStore::new(20);
    store.insert(Pin::new("low", "0123456789").with_priority(1));
    store.insert(Pin::new("high", "abcdefghij").with_priority(10));
    // 10 more bytes would exceed the budget; the low-priority pin goes.
    let evicted = store.insert(Pin::new("mid", "qrstuvwxyz").with_priority(5));
    assert_eq!(evicted, vec!["low".to_string()]);
    assert!(store.get("high").is_some());
    assert!(store.get("mid").is_some());
}

#[test]
fn oversized_pin_is_rejected_outright() {
    let mut store = PinStore::new(8);
    let evicted = store.insert(Pin::new("huge", "far too large for the budget"));
    assert_eq!(evicted, vec!["huge".to_string()]);
    assert!(store.is_empty());
}

#[test]
fn ttl_expiry_filters_active_pins() {
    let mut store = PinStore::new(1024);
    store.insert(Pin::new("volatile", "short-lived").with_ttl(Duration::from_millis(0)));
    store.insert(Pin::new("durable", "stays"));

    let later = Instant::now() + Duration::from_millis(10);
    let active = store.active_pins(later);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "durable");

    store.expire(later);
    assert_eq!(store.len(), 1);
}

#[test]
fn active_pins_order_by_priority_then_insertion() {
    let mut store = PinStore::new(1024);
    store.insert(Pin::new("b", "2").with_priority(1));
    store.insert(Pin::new("a", "1").with_priority(9));
    store.insert(Pin::new("c", "3").with_priority(1));
    let ids: Vec<&str> = store
        .active_pins(Instant::now())
        .iter()
        .map(|pin| pin.id.as_str())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn empty_store_renders_nothing() {
    let store = PinStore::default();
    assert!(store.render(Instant::now()).is_none());
}
