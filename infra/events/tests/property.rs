pub mod fixtures;

use fixtures::{Counter, TestEvent};
use herald_event_bus::EventBus;
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Register(usize),
    Unregister(usize),
    Post,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize).prop_map(Op::Register),
        (0..4usize).prop_map(Op::Unregister),
        Just(Op::Post),
    ]
}

proptest! {
    #[test]
    fn delivery_matches_registration_model(ops in proptest::collection::vec(op(), 0..64)) {
        let bus = EventBus::new();
        let owners: Vec<_> = (0..4).map(|_| Arc::new(Counter::default())).collect();
        let mut registered = [false; 4];
        let mut expected = [0usize; 4];

        for op in ops {
            match op {
                Op::Register(index) => {
                    let inserted = bus.register(&owners[index]).unwrap();
                    prop_assert_eq!(inserted, usize::from(!registered[index]));
                    registered[index] = true;
                },
                Op::Unregister(index) => {
                    let removed = bus.unregister(&owners[index]);
                    prop_assert_eq!(removed, usize::from(registered[index]));
                    registered[index] = false;
                },
                Op::Post => {
                    let delivered = bus.post(TestEvent(1));
                    prop_assert_eq!(delivered, registered.iter().filter(|r| **r).count());
                    for (count, is_registered) in expected.iter_mut().zip(registered) {
                        *count += usize::from(is_registered);
                    }
                },
            }
            prop_assert_eq!(bus.len(), registered.iter().filter(|r| **r).count());
        }

        for (owner, count) in owners.iter().zip(expected) {
            prop_assert_eq!(owner.calls(), count);
        }
    }
}
