use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

const MAX_INDEX: usize = 1_000;

#[derive(Clone, Debug)]
enum Op {
    Push(u64),
    Insert(usize, u64),
    Remove(usize),
    Erase(usize),
    Shrink,
    Clear,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let index = 0..(MAX_INDEX + 100);
    let op = prop_oneof![
        40 => any::<u64>().prop_map(Op::Push),
        10 => (0..MAX_INDEX, any::<u64>()).prop_map(|(i, v)| Op::Insert(i, v)),
        25 => index.clone().prop_map(Op::Remove),
        20 => index.prop_map(Op::Erase),
        4 => Just(Op::Shrink),
        1 => Just(Op::Clear),
    ];
    prop::collection::vec(op, 0..=1500)
}

//  Lowest index not in use, which is where the next push lands.
fn lowest_free(m: &BTreeMap<usize, u64>) -> usize {
    (0..).find(|i| !m.contains_key(i)).unwrap_or(usize::MAX)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut v: SparseVec<u64> = SparseVec::new();
        let mut m: BTreeMap<usize, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    let expected = lowest_free(&m);
                    let index = v.push(value);
                    prop_assert_eq!(expected, index);
                    m.insert(index, value);
                }
                Op::Insert(index, value) => {
                    let old_v = v.insert(index, value);
                    let old_m = m.insert(index, value);
                    prop_assert_eq!(old_v, old_m);
                }
                Op::Remove(index) => {
                    let old_v = v.remove(index);
                    let old_m = m.remove(&index);
                    prop_assert_eq!(old_v, old_m);
                }
                Op::Erase(index) => {
                    let erased = v.erase(index);
                    prop_assert_eq!(erased, m.remove(&index).is_some());
                }
                Op::Shrink => {
                    v.shrink_to_fit();
                    let expected = m.keys().next_back().map_or(64, |last| (last / 64 + 1) * 64);
                    prop_assert_eq!(expected, v.capacity());
                }
                Op::Clear => {
                    v.clear();
                    m.clear();
                    prop_assert_eq!(64, v.capacity());
                }
            }

            prop_assert_eq!(v.len(), m.len());
            prop_assert_eq!(v.next_index().is_some(), lowest_free(&m) < v.capacity());
        }

        v.assert_invariants();

        let got: Vec<(usize, u64)> = v.iter().map(|(i, value)| (i, *value)).collect();
        let expected: Vec<(usize, u64)> = m.iter().map(|(i, value)| (*i, *value)).collect();
        prop_assert_eq!(&got, &expected);

        for (index, value) in &m {
            prop_assert_eq!(Some(value), v.get(*index));
        }

        let clone = v.clone();
        clone.assert_invariants();
        prop_assert_eq!(&clone, &v);

        let owned: Vec<(usize, u64)> = v.into_iter().collect();
        prop_assert_eq!(owned, expected);
    }

    #[test]
    fn prop_iter_from(indexes in prop::collection::btree_set(0..MAX_INDEX, 0..200), start in 0..(MAX_INDEX + 100)) {
        let mut v = SparseVec::new();

        for index in &indexes {
            v.insert(*index, *index);
        }

        v.assert_invariants();

        let got: Vec<usize> = v.iter_from(start).map(|(i, _)| i).collect();
        let expected: Vec<usize> = indexes.range(start..).copied().collect();

        prop_assert_eq!(v.iter_from(start).len(), expected.len());
        prop_assert_eq!(got, expected);
    }
}

#[test]
fn exhaustive_erase_then_push_single_chunk() {
    for erased in 0..64 {
        let mut v = SparseVec::new();

        for i in 0..64 {
            v.push(i);
        }

        assert!(v.erase(erased));
        assert_eq!(erased, v.push(100), "{erased}");
        assert_eq!(64, v.capacity());

        v.assert_invariants();
    }
}

#[test]
fn erase_all_then_refill() {
    let mut v = SparseVec::new();

    for i in 0..(64 * 65) {
        v.push(i);
    }

    for i in (0..(64 * 65)).rev() {
        assert!(v.erase(i));
    }

    v.assert_invariants();

    for i in 0..(64 * 65) {
        assert_eq!(i, v.push(i));
    }

    v.assert_invariants();
}
