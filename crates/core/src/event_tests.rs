// SPDX-License-Identifier: MIT

use super::*;
use crate::id::StateId;
use serde_json::json;
use std::sync::atomic::AtomicUsize;

fn event(kind: ChangeKind, property: &str) -> ChangeEvent {
    ChangeEvent::new(StatePath::root(StateId::new("ROOT")), kind, property)
}

#[test]
fn subscribers_receive_matching_kinds_only() {
    let bus = ObserverBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    bus.subscribe(&[ChangeKind::Transition], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(event(ChangeKind::Transition, "add_transition"));
    bus.emit(event(ChangeKind::State, "add_state"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_kind_list_subscribes_to_everything() {
    let bus = ObserverBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    bus.subscribe(&[], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(event(ChangeKind::State, "a"));
    bus.emit(event(ChangeKind::Execution, "b"));
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn unsubscribe_stops_delivery() {
    let bus = ObserverBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let id = bus.subscribe(&[], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    bus.emit(event(ChangeKind::State, "a"));
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn channel_subscription_delivers_in_order() {
    let bus = ObserverBus::new();
    let (_id, rx) = bus.channel(&[ChangeKind::Outcome]);
    bus.emit(event(ChangeKind::Outcome, "first"));
    bus.emit(event(ChangeKind::Outcome, "second"));

    assert_eq!(rx.recv().unwrap().property, "first");
    assert_eq!(rx.recv().unwrap().property, "second");
    assert!(rx.try_recv().is_err());
}

#[test]
fn panicking_subscriber_is_dropped_not_propagated() {
    let bus = ObserverBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    bus.subscribe(&[], |_| panic!("bad subscriber"));
    bus.subscribe(&[], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(event(ChangeKind::State, "a"));
    bus.emit(event(ChangeKind::State, "b"));
    // The healthy subscriber keeps receiving; the bad one is gone.
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(bus.subscribers.read().len(), 1);
}

#[test]
fn event_builder_carries_payloads() {
    let ev = event(ChangeKind::InputPort, "add_input_port")
        .with_before(json!(null))
        .with_after(json!({"name": "x"}))
        .with_info("attached");
    assert_eq!(ev.before, Some(json!(null)));
    assert_eq!(ev.after, Some(json!({"name": "x"})));
    assert_eq!(ev.info.as_deref(), Some("attached"));
}
