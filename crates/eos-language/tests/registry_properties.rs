//! Registry invariants under random and concurrent add/drop sequences.

use std::collections::HashSet;
use std::sync::Arc;

use eos_core::RegistryConfig;
use eos_language::{DoubleArray, RegisteredObject, Session};
use proptest::prelude::*;
use rayon::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add,
    Drop(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Add), (0usize..64).prop_map(Op::Drop)]
}

fn small_session() -> Session {
    Session::with_config(RegistryConfig {
        initial_capacity: 4,
        growth_step: 3,
    })
    .unwrap()
}

proptest! {
    #[test]
    fn live_keys_stay_distinct(ops in prop::collection::vec(op(), 1..200)) {
        let session = small_session();
        let mut live: Vec<Arc<DoubleArray>> = Vec::new();
        let mut last_freed = None;

        for op in ops {
            match op {
                Op::Add => {
                    let arr = session.new_double_array(1, 0.0).unwrap();
                    if let Some(freed) = last_freed.take() {
                        prop_assert_eq!(arr.key(), Some(freed));
                    }
                    live.push(arr);
                }
                Op::Drop(i) if !live.is_empty() => {
                    let arr = live.swap_remove(i % live.len());
                    let key = arr.key().unwrap();
                    drop(arr);
                    prop_assert!(!session.registry().is_object(key));
                    last_freed = Some(key);
                }
                Op::Drop(_) => {}
            }

            let keys: HashSet<_> = live.iter().map(|a| a.key().unwrap()).collect();
            prop_assert_eq!(keys.len(), live.len());
            prop_assert_eq!(session.live_objects(), live.len());
        }
    }
}

#[test]
fn concurrent_registration_never_duplicates_keys() {
    let session = small_session();

    let first: Vec<Arc<DoubleArray>> = (0..500)
        .into_par_iter()
        .map(|i| session.new_double_array(2, f64::from(i)).unwrap())
        .collect();
    let keys: HashSet<_> = first.iter().map(|a| a.key().unwrap()).collect();
    assert_eq!(keys.len(), first.len());

    // drop every other array from worker threads while registering more
    let (kept, dropped): (Vec<_>, Vec<_>) = first
        .into_iter()
        .enumerate()
        .partition(|(i, _)| i % 2 == 0);
    let second: Vec<Arc<DoubleArray>> = dropped
        .into_par_iter()
        .map(|(i, arr)| {
            drop(arr);
            session.new_double_array(1, i as f64).unwrap()
        })
        .collect();

    let all: Vec<_> = kept
        .iter()
        .map(|(_, a)| a)
        .chain(second.iter())
        .map(|a| a.key().unwrap())
        .collect();
    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(unique.len(), all.len());
    assert_eq!(session.live_objects(), all.len());

    let stats = session.registry().stats().snapshot();
    assert_eq!(stats.adds, 750);
    assert_eq!(stats.deletes, 250);
}

#[test]
fn lookups_run_alongside_structural_changes() {
    let session = small_session();
    let anchors: Vec<_> = (0..32)
        .map(|i| session.new_double_array(1, f64::from(i)).unwrap())
        .collect();
    let keys: Vec<_> = anchors.iter().map(|a| a.key().unwrap()).collect();

    (0..256).into_par_iter().for_each(|i| {
        if i % 2 == 0 {
            let tmp = session.new_double_array(1, 0.0).unwrap();
            drop(tmp);
        } else {
            let key = keys[i % keys.len()];
            let found: Arc<DoubleArray> = session.object_as(key).unwrap();
            assert_eq!(found.key(), Some(key));
        }
    });

    assert_eq!(session.live_objects(), anchors.len());
}
