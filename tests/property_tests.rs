//! Property-based tests for the invariants called out across the core
//! modules: record-id monotonicity, series name uniqueness, string
//! interning determinism, compact-string round trips, dense/sparse
//! conversion preserving contents, and predicate determinism.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::collection::vec as pvec;
use proptest::prelude::*;

use metallgraph::record_store::RecordStore;
use metallgraph::series::Series;
use metallgraph::strings::StringStore;
use metallgraph::value::ColumnType;

fn new_store() -> RecordStore {
    RecordStore::new(Rc::new(RefCell::new(StringStore::new())))
}

proptest! {
    /// Record ids are allocated in increasing order and, once removed,
    /// never handed out again even as more records are added afterward.
    #[test]
    fn record_ids_are_monotonic_and_never_reused(
        ops in pvec(prop_oneof![Just(true), Just(false)], 1..200)
    ) {
        let mut store = new_store();
        let mut live = Vec::new();
        let mut max_seen: Option<u64> = None;
        for add in ops {
            if add || live.is_empty() {
                let id = store.add_record();
                if let Some(m) = max_seen {
                    prop_assert!(id > m);
                }
                max_seen = Some(id);
                live.push(id);
            } else {
                let id = live.pop().unwrap();
                store.remove_record(id).unwrap();
                prop_assert!(!store.is_live(id));
            }
        }
    }

    /// A series name can never be registered twice, regardless of how
    /// many distinct names precede it.
    #[test]
    fn series_names_are_unique(names in pvec("[a-z]{1,8}", 1..20)) {
        let mut store = new_store();
        let mut seen = std::collections::HashSet::new();
        for name in names {
            let result = store.add_series::<i64>(&name);
            if seen.insert(name.clone()) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
            }
        }
    }

    /// Interning the same bytes twice always yields the same locator;
    /// interning distinct byte strings never collides.
    #[test]
    fn intern_is_deterministic_and_dedups(
        strings in pvec(".{0,40}", 1..50)
    ) {
        let mut store = StringStore::new();
        let mut locators = std::collections::HashMap::new();
        for s in &strings {
            let loc = store.intern(s.as_bytes()).unwrap();
            match locators.get(s) {
                Some(&prior) => prop_assert_eq!(loc, prior),
                None => { locators.insert(s.clone(), loc); }
            }
            prop_assert_eq!(store.get_str(loc), Some(s.as_str()));
        }
    }

    /// Every interned string, short or long, round trips through
    /// `get_str` byte-for-byte regardless of length.
    #[test]
    fn compact_string_round_trips_any_length(len in 0usize..1000) {
        let mut store = StringStore::new();
        let s: String = "a".repeat(len);
        let loc = store.intern(s.as_bytes()).unwrap();
        prop_assert_eq!(store.get_str(loc), Some(s.as_str()));
    }

    /// Converting a series to sparse and back to dense never changes
    /// which ids are populated or what they hold.
    #[test]
    fn series_conversion_preserves_contents(
        values in pvec(prop::option::of(-1000i64..1000), 0..100)
    ) {
        let mut series = Series::new_dense("x", ColumnType::I64);
        for (id, value) in values.iter().enumerate() {
            if let Some(v) = value {
                series.set::<i64>(id as u64, *v);
            }
        }
        let before: Vec<Option<i64>> = (0..values.len() as u64)
            .map(|id| series.get::<i64>(id))
            .collect();

        series.to_sparse();
        let after_sparse: Vec<Option<i64>> = (0..values.len() as u64)
            .map(|id| series.get::<i64>(id))
            .collect();
        prop_assert_eq!(&before, &after_sparse);

        series.to_dense();
        let after_dense: Vec<Option<i64>> = (0..values.len() as u64)
            .map(|id| series.get::<i64>(id))
            .collect();
        prop_assert_eq!(&before, &after_dense);
    }

    /// A removed record's value disappears from every series, and the
    /// id is never reported live again.
    #[test]
    fn tombstoning_clears_every_series(
        count in 1usize..50,
        remove_idx in 0usize..50,
    ) {
        let mut store = new_store();
        store.add_series::<i64>("a").unwrap();
        store.add_series::<bool>("b").unwrap();
        let mut ids = Vec::new();
        for i in 0..count {
            let id = store.add_record();
            store.set::<i64>("a", id, i as i64).unwrap();
            store.set::<bool>("b", id, i % 2 == 0).unwrap();
            ids.push(id);
        }
        let idx = remove_idx % count;
        let target = ids[idx];
        store.remove_record(target).unwrap();

        prop_assert!(!store.is_live(target));
        prop_assert!(store.get::<i64>("a", target).is_err());
        prop_assert!(store.get::<bool>("b", target).is_err());

        for (i, &id) in ids.iter().enumerate() {
            if id != target {
                prop_assert_eq!(store.get::<i64>("a", id).unwrap(), Some(i as i64));
            }
        }
    }
}
