// SPDX-License-Identifier: MIT

use super::*;
use proptest::prelude::*;

#[test]
fn generated_state_ids_use_uppercase_alphabet() {
    let id = generate_state_id(&HashSet::new());
    assert_eq!(id.as_str().len(), STATE_ID_LEN);
    assert!(id.as_str().chars().all(|c| c.is_ascii_uppercase()));
}

#[test]
fn generate_retries_until_free() {
    // Exhausting the 6-char space is infeasible, so check that a fresh id
    // never lands in a large taken set.
    let taken: HashSet<StateId> = (0..64).map(|_| generate_state_id(&HashSet::new())).collect();
    let id = generate_state_id(&taken);
    assert!(!taken.contains(&id));
}

#[test]
fn state_id_hash_map_lookup_by_str() {
    let mut map = std::collections::HashMap::new();
    map.insert(StateId::new("ROOT"), 1);
    assert_eq!(map.get("ROOT"), Some(&1));
}

#[test]
fn state_id_serde_is_transparent() {
    let id = StateId::new("ABCDEF");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"ABCDEF\"");
    let back: StateId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[yare::parameterized(
    empty      = { &[], 0 },
    dense      = { &[0, 1, 2], 3 },
    with_gap   = { &[0, 2], 1 },
    reserved   = { &[-1, -2], 0 },
    mixed      = { &[-1, -2, 0, 1], 2 },
)]
fn next_element_id_finds_smallest_free(taken: &[i64], expected: i64) {
    assert_eq!(next_element_id(taken.iter().copied()), expected);
}

#[test]
fn run_ids_are_unique() {
    assert_ne!(RunId::generate(), RunId::generate());
}

proptest! {
    #[test]
    fn next_element_id_never_in_taken(taken in proptest::collection::vec(-4i64..16, 0..12)) {
        let id = next_element_id(taken.iter().copied());
        prop_assert!(!taken.contains(&id));
        prop_assert!(id >= 0);
    }
}
