//! Property tests for activation pairing and delivery order.

use location_store::{Deactivate, Publisher, Readable, Unsubscriber};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Subscribe,
    /// Index into the live handles, taken modulo their count.
    Unsubscribe(usize),
    Publish(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Subscribe),
        any::<usize>().prop_map(Op::Unsubscribe),
        any::<u32>().prop_map(Op::Publish),
    ]
}

struct Harness {
    store: Readable<u32>,
    activations: Arc<AtomicUsize>,
    deactivations: Arc<AtomicUsize>,
    publisher: Arc<Mutex<Option<Publisher<u32>>>>,
}

fn harness() -> Harness {
    let activations = Arc::new(AtomicUsize::new(0));
    let deactivations = Arc::new(AtomicUsize::new(0));
    let publisher = Arc::new(Mutex::new(None));

    let store = {
        let activations = Arc::clone(&activations);
        let deactivations = Arc::clone(&deactivations);
        let slot = Arc::clone(&publisher);
        Readable::from_fn(0u32, move |p| {
            activations.fetch_add(1, Ordering::SeqCst);
            *slot.lock() = Some(p);
            let deactivations = Arc::clone(&deactivations);
            Ok(Deactivate::new(move || {
                deactivations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
        })
    };

    Harness {
        store,
        activations,
        deactivations,
        publisher,
    }
}

struct Live {
    handle: Unsubscriber,
    seen: Arc<Mutex<Vec<u32>>>,
    expected: Vec<u32>,
}

proptest! {
    #[test]
    fn activation_pairs_with_observer_count(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let h = harness();
        let mut live: Vec<Live> = Vec::new();
        let mut current = 0u32;
        let mut rises = 0usize;
        let mut falls = 0usize;

        for op in ops {
            match op {
                Op::Subscribe => {
                    if live.is_empty() {
                        rises += 1;
                    }
                    let seen = Arc::new(Mutex::new(Vec::new()));
                    let sink = Arc::clone(&seen);
                    let handle = h.store.subscribe(move |v: &u32| sink.lock().push(*v)).unwrap();
                    // Delivered before subscribe returned.
                    prop_assert_eq!(seen.lock().clone(), vec![current]);
                    live.push(Live { handle, seen, expected: vec![current] });
                }
                Op::Unsubscribe(i) => {
                    if live.is_empty() {
                        continue;
                    }
                    let entry = live.remove(i % live.len());
                    entry.handle.unsubscribe().unwrap();
                    entry.handle.unsubscribe().unwrap();
                    prop_assert_eq!(entry.seen.lock().clone(), entry.expected);
                    if live.is_empty() {
                        falls += 1;
                    }
                }
                Op::Publish(v) => {
                    if live.is_empty() {
                        continue;
                    }
                    let publisher = h.publisher.lock().clone().unwrap();
                    publisher.publish(v);
                    current = v;
                    for entry in live.iter_mut() {
                        entry.expected.push(v);
                    }
                }
            }

            prop_assert_eq!(h.activations.load(Ordering::SeqCst), rises);
            prop_assert_eq!(h.deactivations.load(Ordering::SeqCst), falls);
            prop_assert_eq!(h.store.is_active(), !live.is_empty());
            prop_assert_eq!(h.store.observer_count(), live.len());
        }

        for entry in &live {
            prop_assert_eq!(entry.seen.lock().clone(), entry.expected.clone());
        }
    }
}
