//! Forward iterators over the bottom level of a skip list.

use std::iter::FusedIterator;

use super::node::{NodeId, NodeSlab, TAIL};

/// Values in score order.
pub struct Iter<'a, T> {
    inner: ScoredIter<'a, T>,
}

/// `(score, value)` pairs in score order.
pub struct ScoredIter<'a, T> {
    nodes: &'a NodeSlab<T>,
    next: NodeId,
    remaining: usize,
}

impl<'a, T> ScoredIter<'a, T> {
    pub(crate) fn new(nodes: &'a NodeSlab<T>, first: NodeId, remaining: usize) -> Self {
        Self {
            nodes,
            next: first,
            remaining,
        }
    }
}

impl<'a, T> Iterator for ScoredIter<'a, T> {
    type Item = (i64, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next != TAIL {
            let node = self.nodes.get(self.next);
            self.next = self.nodes.next(self.next, 0).unwrap_or(TAIL);
            if let Some(value) = node.value.as_ref() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some((node.score, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.next == TAIL {
            (0, Some(0))
        } else {
            (1, Some(self.remaining))
        }
    }
}

impl<T> FusedIterator for ScoredIter<'_, T> {}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(inner: ScoredIter<'a, T>) -> Self {
        Self { inner }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> FusedIterator for Iter<'_, T> {}
