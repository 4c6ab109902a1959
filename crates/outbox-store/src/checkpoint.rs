/// `(last_block, last_event_index)` ordered the same way
/// `bridge_types::EventCursor` is, used by [`advances`] to decide whether a
/// proposed checkpoint may be written. Kept free of any database type so
/// the monotonicity rule  can be proptested without a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint {
    pub last_block: u64,
    pub last_event_index: i32,
}

/// True iff `proposed` is strictly greater than `current` under
/// `(last_block, last_event_index)` lexicographic order — the same
/// condition `advance_checkpoint`'s `WHERE (EXCLUDED...) > (...)` clause
/// encodes in SQL .
pub fn advances(current: Checkpoint, proposed: Checkpoint) -> bool {
    proposed > current
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn checkpoint_strategy() -> impl Strategy<Value = Checkpoint> {
        (0u64..1_000_000, -1i32..1_000_000).prop_map(|(last_block, last_event_index)| Checkpoint {
            last_block,
            last_event_index,
        })
    }

    proptest! {
        #[test]
        fn applying_random_sequence_never_regresses(checkpoints in proptest::collection::vec(checkpoint_strategy(), 1..50)) {
            let mut current = Checkpoint { last_block: 0, last_event_index: -1 };
            for proposed in checkpoints {
                if advances(current, proposed) {
                    current = proposed;
                }
                prop_assert!(current.last_block >= 0);
            }
        }

        #[test]
        fn a_checkpoint_never_regresses_after_being_applied(a in checkpoint_strategy(), b in checkpoint_strategy()) {
            let mut current = a;
            if advances(current, b) {
                current = b;
            }
            prop_assert!(current >= a);
        }

        #[test]
        fn equal_checkpoints_never_advance(a in checkpoint_strategy()) {
            prop_assert!(!advances(a, a));
        }
    }

    #[test]
    fn same_block_later_event_index_advances() {
        let current = Checkpoint { last_block: 10, last_event_index: 2 };
        let proposed = Checkpoint { last_block: 10, last_event_index: 3 };
        assert!(advances(current, proposed));
    }

    #[test]
    fn earlier_block_never_advances_even_with_higher_event_index() {
        let current = Checkpoint { last_block: 10, last_event_index: 0 };
        let proposed = Checkpoint { last_block: 9, last_event_index: 99 };
        assert!(!advances(current, proposed));
    }
}
