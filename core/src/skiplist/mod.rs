//! Probabilistic skip list ordered by an integer score.
//!
//! Every entry carries an `i64` score. When the caller does not supply one the
//! score is the value's hash, so values are ordered by hash and two values with
//! the same hash share a position; lookups then compare the values themselves.
//!
//! Nodes live in a slab and link to each other by index. Head and tail are
//! sentinel slots, recognised by index rather than score, so real entries may
//! use the whole `i64` range.
//!
//! Writers need `&mut self`; readers only `&self`. A memtable that wants
//! concurrent readers alongside one writer puts the list behind an `RwLock`.

mod iterator;
mod node;

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::SKIPLIST_DEFAULT_LEVELS;

pub use iterator::{Iter, ScoredIter};
use node::{HEAD, Node, NodeId, NodeSlab, TAIL};

/// Default score of a value: its hash.
pub fn hash_score<T: Hash + ?Sized>(value: &T) -> i64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish() as i64
}

pub struct SkipList<T> {
    nodes: NodeSlab<T>,
    /// Number of levels the head participates in.
    level: usize,
    /// Number of real entries.
    size: usize,
    rng: StdRng,
}

impl<T> SkipList<T> {
    pub fn new() -> Self {
        Self::with_levels(SKIPLIST_DEFAULT_LEVELS)
    }

    pub fn with_levels(levels: usize) -> Self {
        Self::with_rng(levels, StdRng::from_entropy())
    }

    /// A list whose level choices are reproducible.
    pub fn with_seed(levels: usize, seed: u64) -> Self {
        Self::with_rng(levels, StdRng::seed_from_u64(seed))
    }

    fn with_rng(levels: usize, rng: StdRng) -> Self {
        let level = levels.max(1);
        Self {
            nodes: NodeSlab::new(level),
            level,
            size: 0,
            rng,
        }
    }

    /// Insert `value` at `score`. Equal scores are allowed; the newest entry
    /// goes in front of older ones with the same score.
    pub fn add_with_score(&mut self, value: T, score: i64) -> bool {
        let update = self.predecessors(score);
        let top = self.random_level();
        let id = self.nodes.insert(Node::new(value, score, top + 1));

        for (level, &pred) in update.iter().enumerate().take(top + 1) {
            let next = self.nodes.get(pred).forward[level];
            self.nodes.get_mut(id).forward.push(next);
            self.nodes.get_mut(pred).forward[level] = id;
        }

        self.size += 1;
        if (self.size - 1) >> (self.level + 1) > 0 {
            self.add_level();
        }
        true
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of levels.
    pub fn height(&self) -> usize {
        self.level
    }

    /// Values in score order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.iter_scored())
    }

    /// `(score, value)` pairs in score order.
    pub fn iter_scored(&self) -> ScoredIter<'_, T> {
        let first = self.nodes.next(HEAD, 0).unwrap_or(TAIL);
        ScoredIter::new(&self.nodes, first, self.size)
    }

    /// `(score, value)` pairs starting at the first entry whose score is
    /// `>= score`.
    pub fn iter_from(&self, score: i64) -> ScoredIter<'_, T> {
        let pred = self.predecessors(score)[0];
        let first = self.nodes.next(pred, 0).unwrap_or(TAIL);
        ScoredIter::new(&self.nodes, first, self.size)
    }

    /// For each level, the last node whose score is below `score`.
    fn predecessors(&self, score: i64) -> Vec<NodeId> {
        let mut update = vec![HEAD; self.level];
        let mut x = HEAD;
        for level in (0..self.level).rev() {
            while let Some(next) = self.nodes.next(x, level) {
                if next == TAIL || self.nodes.get(next).score >= score {
                    break;
                }
                x = next;
            }
            update[level] = x;
        }
        update
    }

    /// Highest level for a new node: flip a fair coin until it stops, capped
    /// below the current level count.
    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level < self.level - 1 && !self.rng.gen_bool(0.5) {
            level += 1;
        }
        level
    }

    /// Add a level above the current top, promoting every second node of the
    /// old top level into it.
    fn add_level(&mut self) {
        let top = self.level - 1;
        let mut last = HEAD;
        let mut cur = self.nodes.get(HEAD).forward[top];
        let mut promoted = 0usize;
        let mut counter = 1u64;

        while cur != TAIL {
            if counter & 1 == 1 {
                self.nodes.get_mut(last).forward.push(cur);
                last = cur;
                promoted += 1;
            }
            counter += 1;
            cur = self.nodes.get(cur).forward[top];
        }
        self.nodes.get_mut(last).forward.push(TAIL);
        self.level += 1;

        tracing::trace!(height = self.level, size = self.size, promoted, "skip list grew a level");
    }
}

impl<T: PartialEq> SkipList<T> {
    /// Find a stored value equal to `value` at `score`.
    pub fn find_val_with_score(&self, value: &T, score: i64) -> Option<&T> {
        if self.size == 0 {
            return None;
        }

        let mut x = HEAD;
        for level in (0..self.level).rev() {
            loop {
                // A link missing at this level reads as "not found".
                let next = self.nodes.next(x, level)?;
                if next == TAIL || self.nodes.get(next).score >= score {
                    break;
                }
                x = next;
            }
        }

        let mut cur = self.nodes.next(x, 0)?;
        while cur != TAIL {
            let node = self.nodes.get(cur);
            if node.score != score {
                return None;
            }
            if node.value.as_ref() == Some(value) {
                return node.value.as_ref();
            }
            cur = self.nodes.next(cur, 0)?;
        }
        None
    }

    /// Unlink one entry equal to `value` at `score` from every level it is on.
    /// Returns `false` if no such entry exists.
    pub fn remove_with_score(&mut self, value: &T, score: i64) -> bool {
        if self.size == 0 {
            return false;
        }

        let update = self.predecessors(score);
        let Some(victim) = self.locate(update[0], value, score) else {
            return false;
        };

        let mut unlinked_bottom = false;
        let height = self.nodes.get(victim).forward.len();
        for level in (0..height).rev() {
            // Walk past other entries sharing the score to reach the victim.
            let mut pred = update[level];
            loop {
                let next = self.nodes.get(pred).forward[level];
                if next == victim || next == TAIL {
                    break;
                }
                pred = next;
            }
            if self.nodes.get(pred).forward[level] != victim {
                continue;
            }

            let after = self.nodes.get(victim).forward[level];
            self.nodes.get_mut(pred).forward[level] = after;
            self.nodes.get_mut(victim).forward.pop();
            if level == 0 {
                unlinked_bottom = true;
            }
        }

        if unlinked_bottom {
            self.nodes.release(victim);
            self.size -= 1;
        }
        unlinked_bottom
    }

    /// First node after `pred` on level 0 holding `value` at `score`.
    fn locate(&self, pred: NodeId, value: &T, score: i64) -> Option<NodeId> {
        let mut cur = self.nodes.next(pred, 0)?;
        while cur != TAIL {
            let node = self.nodes.get(cur);
            if node.score != score {
                return None;
            }
            if node.value.as_ref() == Some(value) {
                return Some(cur);
            }
            cur = self.nodes.next(cur, 0)?;
        }
        None
    }
}

impl<T: Hash> SkipList<T> {
    /// Insert `value` scored by its hash.
    pub fn add(&mut self, value: T) -> bool {
        let score = hash_score(&value);
        self.add_with_score(value, score)
    }
}

impl<T: Hash + PartialEq> SkipList<T> {
    pub fn find_val(&self, value: &T) -> Option<&T> {
        self.find_val_with_score(value, hash_score(value))
    }

    pub fn contains(&self, value: &T) -> bool {
        self.find_val(value).is_some()
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.remove_with_score(value, hash_score(value))
    }
}

impl<T: fmt::Display> SkipList<T> {
    /// One line per level, bottom level first, listing the values linked on it.
    pub fn describe(&self) -> String {
        let mut lines = Vec::with_capacity(self.level);
        for level in 0..self.level {
            let mut line = Vec::new();
            let mut cur = self.nodes.next(HEAD, level).unwrap_or(TAIL);
            while cur != TAIL {
                if let Some(value) = self.nodes.get(cur).value.as_ref() {
                    line.push(value.to_string());
                }
                cur = self.nodes.next(cur, level).unwrap_or(TAIL);
            }
            lines.push(line.join(" "));
        }
        lines.join("\n")
    }
}

impl<T> Default for SkipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Display> fmt::Display for SkipList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

impl<T: fmt::Debug> fmt::Debug for SkipList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a SkipList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Hash> Extend<T> for SkipList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T: Hash> FromIterator<T> for SkipList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    impl<T> SkipList<T> {
        /// Panics if any level is out of score order, does not end at the
        /// tail, or if level 0 disagrees with `size`.
        fn check_invariants(&self) {
            assert_eq!(self.nodes.get(HEAD).forward.len(), self.level);
            for level in 0..self.level {
                let mut prev_score = i64::MIN;
                let mut cur = self.nodes.get(HEAD).forward[level];
                let mut count = 0;
                while cur != TAIL {
                    let node = self.nodes.get(cur);
                    assert!(node.value.is_some(), "released node linked on level {}", level);
                    assert!(node.forward.len() > level);
                    assert!(node.score >= prev_score, "level {} out of order", level);
                    prev_score = node.score;
                    cur = node.forward[level];
                    count += 1;
                    assert!(count <= self.size, "cycle on level {}", level);
                }
                if level == 0 {
                    assert_eq!(count, self.size);
                }
            }
        }
    }

    #[test]
    fn test_add_and_find() {
        let mut list = SkipList::new();
        for v in [5, 1, 9, 3, 7] {
            assert!(list.add(v));
        }
        assert_eq!(list.len(), 5);
        assert_eq!(list.find_val(&9), Some(&9));
        assert_eq!(list.find_val(&4), None);
        assert!(list.contains(&1));
        list.check_invariants();
    }

    #[test]
    fn test_find_on_empty() {
        let list: SkipList<u32> = SkipList::new();
        assert_eq!(list.find_val(&1), None);
        assert!(list.is_empty());
        assert_eq!(list.iter().next(), None);
    }

    #[test]
    fn test_iter_order() {
        let mut list = SkipList::with_seed(3, 1);
        for (value, score) in [("c", 30), ("a", 10), ("d", -5), ("b", 20)] {
            list.add_with_score(value, score);
        }

        let values: Vec<_> = list.iter().copied().collect();
        assert_eq!(values, vec!["d", "a", "b", "c"]);

        let scores: Vec<_> = list.iter_scored().map(|(s, _)| s).collect();
        assert_eq!(scores, vec![-5, 10, 20, 30]);
    }

    #[test]
    fn test_extreme_scores() {
        let mut list = SkipList::with_seed(3, 2);
        list.add_with_score("max", i64::MAX);
        list.add_with_score("min", i64::MIN);
        list.add_with_score("zero", 0);

        let values: Vec<_> = list.iter().copied().collect();
        assert_eq!(values, vec!["min", "zero", "max"]);
        assert_eq!(list.find_val_with_score(&"min", i64::MIN), Some(&"min"));
        assert_eq!(list.find_val_with_score(&"max", i64::MAX), Some(&"max"));
        assert!(list.remove_with_score(&"max", i64::MAX));
        list.check_invariants();
    }

    #[test]
    fn test_shared_score() {
        let mut list = SkipList::with_seed(3, 3);
        for v in ["x", "y", "z"] {
            list.add_with_score(v, 42);
        }
        list.add_with_score("lower", 41);
        list.add_with_score("higher", 43);

        for v in ["x", "y", "z"] {
            assert_eq!(list.find_val_with_score(&v, 42), Some(&v));
        }
        assert_eq!(list.find_val_with_score(&"lower", 42), None);

        assert!(list.remove_with_score(&"y", 42));
        assert_eq!(list.find_val_with_score(&"y", 42), None);
        assert_eq!(list.find_val_with_score(&"x", 42), Some(&"x"));
        assert_eq!(list.find_val_with_score(&"z", 42), Some(&"z"));
        assert_eq!(list.len(), 4);
        list.check_invariants();
    }

    #[test]
    fn test_duplicate_values() {
        let mut list = SkipList::new();
        list.add(7);
        list.add(7);
        assert_eq!(list.len(), 2);

        assert!(list.remove(&7));
        assert_eq!(list.len(), 1);
        assert!(list.contains(&7));

        assert!(list.remove(&7));
        assert!(!list.contains(&7));
        assert!(list.is_empty());
        list.check_invariants();
    }

    #[test]
    fn test_remove_absent() {
        let mut list = SkipList::new();
        assert!(!list.remove(&1));

        list.add(1);
        list.add(2);
        assert!(!list.remove(&3));
        assert_eq!(list.len(), 2);

        assert!(list.remove(&1));
        assert!(!list.remove(&1));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_find_past_shrunk_link_is_not_found() {
        let mut list = SkipList::with_seed(1, 7);
        list.add_with_score("a", 10);
        list.add_with_score("b", 20);
        list.add_with_score("c", 30);
        assert_eq!(list.height(), 1);

        // Simulate a removal that already dropped the first node's links.
        let first = list.nodes.next(HEAD, 0).unwrap();
        list.nodes.get_mut(first).forward.clear();

        assert_eq!(list.find_val_with_score(&"b", 20), None);
        assert_eq!(list.find_val_with_score(&"c", 30), None);
        assert_eq!(list.find_val_with_score(&"a", 10), Some(&"a"));
    }

    #[test]
    fn test_height_growth() {
        let mut list = SkipList::with_seed(3, 11);
        for i in 0..16 {
            list.add_with_score(i, i as i64);
        }
        assert_eq!(list.height(), 3);

        list.add_with_score(16, 16);
        assert_eq!(list.height(), 4);
        list.check_invariants();

        for i in 17..33 {
            list.add_with_score(i, i as i64);
        }
        assert_eq!(list.height(), 5);
        list.check_invariants();

        // Promoted nodes are still found after the resize.
        for i in 0..33 {
            assert_eq!(list.find_val_with_score(&i, i as i64), Some(&i));
        }
    }

    #[test]
    fn test_new_top_level_alternates() {
        // One level: every node is on the top level, so the resize promotes
        // the 1st, 3rd, 5th... node.
        let mut list = SkipList::with_seed(1, 5);
        for i in 0..4 {
            list.add_with_score(i, i as i64);
        }
        assert_eq!(list.height(), 1);
        list.add_with_score(4, 4);
        assert_eq!(list.height(), 2);

        let promoted: Vec<_> = {
            let mut out = Vec::new();
            let mut cur = list.nodes.get(HEAD).forward[1];
            while cur != TAIL {
                out.push(*list.nodes.get(cur).value.as_ref().unwrap());
                cur = list.nodes.get(cur).forward[1];
            }
            out
        };
        assert_eq!(promoted, vec![0, 2, 4]);
    }

    #[test]
    fn test_slot_reuse() {
        let mut list = SkipList::with_seed(3, 9);
        for i in 0..100 {
            list.add_with_score(i, i as i64);
        }
        for i in (0..100).step_by(2) {
            assert!(list.remove_with_score(&i, i as i64));
        }
        for i in 100..150 {
            list.add_with_score(i, i as i64);
        }
        assert_eq!(list.len(), 100);
        list.check_invariants();

        let values: Vec<_> = list.iter().copied().collect();
        let expected: Vec<_> = (0..100).filter(|i| i % 2 == 1).chain(100..150).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_iter_from() {
        let mut list = SkipList::with_seed(3, 4);
        for i in [10, 20, 30, 40] {
            list.add_with_score(i, i as i64);
        }
        let from: Vec<_> = list.iter_from(25).map(|(_, v)| *v).collect();
        assert_eq!(from, vec![30, 40]);
        let from: Vec<_> = list.iter_from(20).map(|(_, v)| *v).collect();
        assert_eq!(from, vec![20, 30, 40]);
        assert_eq!(list.iter_from(41).next(), None);
    }

    #[test]
    fn test_display_and_describe() {
        let mut list = SkipList::with_seed(2, 8);
        assert_eq!(list.to_string(), "[]");
        for i in [3, 1, 2] {
            list.add_with_score(i, i as i64);
        }
        assert_eq!(list.to_string(), "[1,2,3]");

        let description = list.describe();
        let lines: Vec<_> = description.split('\n').collect();
        assert_eq!(lines.len(), list.height());
        assert_eq!(lines[0], "1 2 3");
    }

    #[test]
    fn test_collect_and_extend() {
        let mut list: SkipList<u64> = (0..10).collect();
        list.extend(10..20);
        assert_eq!(list.len(), 20);
        for i in 0..20u64 {
            assert!(list.contains(&i));
        }
        assert_eq!((&list).into_iter().count(), 20);
    }

    #[test]
    fn test_concurrent_readers_with_serialized_writer() {
        let list = Arc::new(RwLock::new(SkipList::with_seed(3, 21)));
        for i in 0..200u32 {
            list.write().add(i);
        }

        std::thread::scope(|s| {
            let writer = Arc::clone(&list);
            s.spawn(move || {
                for i in 0..200u32 {
                    if i % 2 == 0 {
                        assert!(writer.write().remove(&i));
                    }
                    writer.write().add(1000 + i);
                }
            });

            for _ in 0..4 {
                let reader = Arc::clone(&list);
                s.spawn(move || {
                    for round in 0..50 {
                        let guard = reader.read();
                        // Odd values are never removed.
                        for i in (1..200u32).step_by(2) {
                            assert_eq!(guard.find_val(&i), Some(&i), "round {}", round);
                        }
                        assert_eq!(guard.iter().count(), guard.len());
                    }
                });
            }
        });

        let list = list.read();
        assert_eq!(list.len(), 300);
        list.check_invariants();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Remove(u8),
    }

    fn gen_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => any::<u8>().prop_map(Op::Add),
            2 => any::<u8>().prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_multiset_model(ops in prop::collection::vec(gen_op(), 1..300), seed in any::<u64>()) {
            let mut list = SkipList::with_seed(3, seed);
            let mut model: BTreeMap<u8, usize> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Add(v) => {
                        prop_assert!(list.add(v));
                        *model.entry(v).or_default() += 1;
                    }
                    Op::Remove(v) => {
                        let expected = model.get(&v).copied().unwrap_or(0) > 0;
                        prop_assert_eq!(list.remove(&v), expected);
                        if expected {
                            *model.get_mut(&v).unwrap() -= 1;
                        }
                    }
                }
                prop_assert_eq!(list.len(), model.values().sum::<usize>());
            }

            list.check_invariants();
            for v in 0..=u8::MAX {
                let active = model.get(&v).copied().unwrap_or(0) > 0;
                prop_assert_eq!(list.find_val(&v).is_some(), active);
            }
            let scores: Vec<_> = list.iter_scored().map(|(s, _)| s).collect();
            prop_assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn prop_explicit_scores_sorted(values in prop::collection::vec(any::<i16>(), 1..200)) {
            let mut list = SkipList::with_seed(3, 0);
            for v in &values {
                list.add_with_score(*v, *v as i64);
            }
            let mut expected = values.clone();
            expected.sort();
            let actual: Vec<_> = list.iter().copied().collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
