//! Begin/end detection for touching pairs.
//!
//! Keys of the pairs touching this step are kept sorted, so comparing them
//! with the previous step's keys is a single merge walk over both lists.

use alloc::vec::Vec;
use core::cmp::Ordering;

#[derive(Debug, Clone)]
pub(crate) struct OverlapKeeper<K> {
    current: Vec<K>,
    previous: Vec<K>,
}

impl<K> Default for OverlapKeeper<K> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<K: Ord + Copy> OverlapKeeper<K> {
    /// Start a new step: this step's pairs become the previous ones.
    pub(crate) fn tick(&mut self) {
        core::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Record a pair touching in this step. Repeats are ignored.
    pub(crate) fn set(&mut self, key: K) {
        if let Err(pos) = self.current.binary_search(&key) {
            self.current.insert(pos, key);
        }
    }

    /// Pairs that started touching (`additions`) and stopped touching
    /// (`removals`) since the previous step.
    pub(crate) fn diff(&self, additions: &mut Vec<K>, removals: &mut Vec<K>) {
        additions.clear();
        removals.clear();
        let (mut i, mut j) = (0, 0);
        while i < self.current.len() && j < self.previous.len() {
            match self.current[i].cmp(&self.previous[j]) {
                Ordering::Less => {
                    additions.push(self.current[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    removals.push(self.previous[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        additions.extend_from_slice(&self.current[i..]);
        removals.extend_from_slice(&self.previous[j..]);
    }

    /// Drop every pair, current and previous, matching `pred`.
    pub(crate) fn retain<F: FnMut(&K) -> bool>(&mut self, mut pred: F) {
        self.current.retain(&mut pred);
        self.previous.retain(&mut pred);
    }

    pub(crate) fn current(&self) -> &[K] {
        &self.current
    }
}
