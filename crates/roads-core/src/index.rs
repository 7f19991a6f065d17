//! Ordered key/value index backed by a treap.
//!
//! Every node carries a random priority and the tree keeps a max-heap on it,
//! which gives expected logarithmic depth without any balancing bookkeeping.
//! Nodes live in a dense arena addressed by integer links, and every walk is
//! iterative, so an unlucky tree shape never turns into deep recursion.
//!
//! The priority source is a type parameter. [`Treap::seeded`] builds one on
//! `ChaCha8Rng`, so two indexes fed the same seed and the same operations end
//! up with the same shape.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::borrow::Borrow;
use std::cmp::Ordering;

type Link = Option<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    priority: u32,
    left: Link,
    right: Link,
}

impl<K, V> Node<K, V> {
    fn child(&self, side: Side) -> Link {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn set_child(&mut self, side: Side, link: Link) {
        match side {
            Side::Left => self.left = link,
            Side::Right => self.right = link,
        }
    }
}

/// Result of [`Treap::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The pair was stored.
    Inserted,
    /// The key was already present; the stored value is untouched.
    AlreadyPresent,
    /// No room for another node: the configured node limit was reached or
    /// the arena could not grow. The index is unchanged.
    AllocationFailed,
}

/// A randomized balanced search tree mapping `K` to `V`.
#[derive(Debug, Clone)]
pub struct Treap<K, V, R = ChaCha8Rng> {
    nodes: Vec<Node<K, V>>,
    root: Link,
    limit: Option<usize>,
    rng: R,
}

impl<K: Ord, V> Treap<K, V, ChaCha8Rng> {
    /// Create an empty index whose priorities come from `ChaCha8Rng` seeded
    /// with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<K: Ord, V, R: RngCore> Treap<K, V, R> {
    /// Create an empty index drawing node priorities from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            limit: None,
            rng,
        }
    }

    /// Cap the number of nodes; inserts beyond the cap report
    /// [`InsertOutcome::AllocationFailed`].
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up the value stored under `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cursor = self.root;
        while let Some(i) = cursor {
            let node = &self.nodes[i];
            match key.cmp(node.key.borrow()) {
                Ordering::Less => cursor = node.left,
                Ordering::Greater => cursor = node.right,
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Insert `key → value` unless the key is already present.
    pub fn insert(&mut self, key: K, value: V) -> InsertOutcome {
        // Ancestors of the insertion point, with the side taken below each.
        let mut path: Vec<(usize, Side)> = Vec::new();
        let mut cursor = self.root;
        while let Some(i) = cursor {
            let side = match key.cmp(&self.nodes[i].key) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => return InsertOutcome::AlreadyPresent,
            };
            path.push((i, side));
            cursor = self.nodes[i].child(side);
        }

        if self.limit.is_some_and(|limit| self.nodes.len() >= limit)
            || self.nodes.try_reserve(1).is_err()
        {
            return InsertOutcome::AllocationFailed;
        }

        let fresh = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            priority: self.rng.next_u32(),
            left: None,
            right: None,
        });
        self.relink(path.last().copied(), Some(fresh));

        // Rotate the new node up while it outranks its parent.
        while let Some((parent, side)) = path.pop() {
            if self.nodes[fresh].priority <= self.nodes[parent].priority {
                break;
            }
            self.rotate_up(parent, side, path.last().copied());
        }

        InsertOutcome::Inserted
    }

    /// Remove `key` and return its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut parent = None;
        let mut cursor = self.root;
        let target = loop {
            let i = cursor?;
            let side = match key.cmp(self.nodes[i].key.borrow()) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => break i,
            };
            parent = Some((i, side));
            cursor = self.nodes[i].child(side);
        };
        Some(self.remove_node(target, parent).1)
    }

    /// Remove and return the smallest entry.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let mut parent = None;
        let mut target = self.root?;
        while let Some(left) = self.nodes[target].left {
            parent = Some((target, Side::Left));
            target = left;
        }
        Some(self.remove_node(target, parent))
    }

    /// In-order iteration over all entries.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            stack: Vec::new(),
            cursor: self.root,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Point `parent`'s link (or the root) at `link`.
    fn relink(&mut self, parent: Option<(usize, Side)>, link: Link) {
        match parent {
            Some((p, side)) => self.nodes[p].set_child(side, link),
            None => self.root = link,
        }
    }

    /// Rotate `node`'s child on `side` into `node`'s place and return it.
    /// `parent` is the link that currently holds `node`.
    fn rotate_up(&mut self, node: usize, side: Side, parent: Option<(usize, Side)>) -> usize {
        let Some(child) = self.nodes[node].child(side) else {
            return node;
        };
        let inner = self.nodes[child].child(side.opposite());
        self.nodes[node].set_child(side, inner);
        self.nodes[child].set_child(side.opposite(), Some(node));
        self.relink(parent, Some(child));
        child
    }

    /// Push `target` down until it has at most one child, splice it out and
    /// release its slot.
    fn remove_node(&mut self, target: usize, mut parent: Option<(usize, Side)>) -> (K, V) {
        loop {
            let node = &self.nodes[target];
            match (node.left, node.right) {
                (Some(left), Some(right)) => {
                    let side = if self.nodes[left].priority > self.nodes[right].priority {
                        Side::Left
                    } else {
                        Side::Right
                    };
                    let raised = self.rotate_up(target, side, parent);
                    parent = Some((raised, side.opposite()));
                }
                (only, None) | (None, only) => {
                    self.relink(parent, only);
                    break;
                }
            }
        }
        let node = self.release(target);
        (node.key, node.value)
    }

    /// Drop the (already unlinked) node at `index`, moving the last arena
    /// node into its slot.
    fn release(&mut self, index: usize) -> Node<K, V> {
        let last = self.nodes.len() - 1;
        if index != last {
            let holder = self.link_to(last);
            self.relink(holder, Some(index));
        }
        self.nodes.swap_remove(index)
    }

    /// The link that currently points at `index`.
    fn link_to(&self, index: usize) -> Option<(usize, Side)> {
        let key = &self.nodes[index].key;
        let mut parent = None;
        let mut cursor = self.root;
        while let Some(i) = cursor {
            if i == index {
                break;
            }
            let side = if key < &self.nodes[i].key {
                Side::Left
            } else {
                Side::Right
            };
            parent = Some((i, side));
            cursor = self.nodes[i].child(side);
        }
        parent
    }

    /// Height of the tree (0 when empty).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((i, level)) = stack.pop() {
            deepest = deepest.max(level);
            let node = &self.nodes[i];
            stack.extend(node.left.map(|l| (l, level + 1)));
            stack.extend(node.right.map(|r| (r, level + 1)));
        }
        deepest
    }
}

/// In-order iterator returned by [`Treap::iter`].
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    stack: Vec<usize>,
    cursor: Link,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(i) = self.cursor {
            self.stack.push(i);
            self.cursor = self.nodes[i].left;
        }
        let i = self.stack.pop()?;
        let node = &self.nodes[i];
        self.cursor = node.right;
        Some((&node.key, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Walk the whole tree checking key order and the heap on priorities.
    fn assert_well_formed<K: Ord + std::fmt::Debug, V>(treap: &Treap<K, V>) {
        let mut reachable = 0;
        let mut stack: Vec<(usize, Option<&K>, Option<&K>)> =
            treap.root.map(|r| (r, None, None)).into_iter().collect();
        while let Some((i, low, high)) = stack.pop() {
            reachable += 1;
            let node = &treap.nodes[i];
            if let Some(low) = low {
                assert!(&node.key > low, "{:?} not above {:?}", node.key, low);
            }
            if let Some(high) = high {
                assert!(&node.key < high, "{:?} not below {:?}", node.key, high);
            }
            for child in [node.left, node.right].into_iter().flatten() {
                assert!(treap.nodes[child].priority <= node.priority);
            }
            if let Some(l) = node.left {
                stack.push((l, low, Some(&node.key)));
            }
            if let Some(r) = node.right {
                stack.push((r, Some(&node.key), high));
            }
        }
        assert_eq!(reachable, treap.len(), "every arena node is reachable");
    }

    #[test]
    fn test_insert_and_find() {
        let mut treap = Treap::seeded(7);
        assert_eq!(treap.insert("b".to_string(), 2), InsertOutcome::Inserted);
        assert_eq!(treap.insert("a".to_string(), 1), InsertOutcome::Inserted);
        assert_eq!(treap.insert("c".to_string(), 3), InsertOutcome::Inserted);

        assert_eq!(treap.find("a"), Some(&1));
        assert_eq!(treap.find("c"), Some(&3));
        assert_eq!(treap.find("d"), None);
        assert_eq!(treap.len(), 3);
        assert_well_formed(&treap);
    }

    #[test]
    fn test_insert_existing_key_keeps_value() {
        let mut treap = Treap::seeded(7);
        treap.insert(5, "first");
        assert_eq!(treap.insert(5, "second"), InsertOutcome::AlreadyPresent);
        assert_eq!(treap.find(&5), Some(&"first"));
        assert_eq!(treap.len(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut treap: Treap<u32, ()> = Treap::seeded(1);
        treap.insert(1, ());
        assert_eq!(treap.remove(&2), None);
        assert_eq!(treap.len(), 1);
    }

    #[test]
    fn test_remove_returns_value() {
        let mut treap = Treap::seeded(3);
        for k in 0..20 {
            treap.insert(k, k * 10);
        }
        assert_eq!(treap.remove(&7), Some(70));
        assert_eq!(treap.find(&7), None);
        assert_eq!(treap.len(), 19);
        assert_well_formed(&treap);
    }

    #[test]
    fn test_pop_first_yields_sorted_order() {
        let mut treap = Treap::seeded(11);
        for k in [9, 3, 7, 1, 8, 2] {
            treap.insert(k, ());
        }
        let mut drained = Vec::new();
        while let Some((k, ())) = treap.pop_first() {
            drained.push(k);
            assert_well_formed(&treap);
        }
        assert_eq!(drained, vec![1, 2, 3, 7, 8, 9]);
        assert!(treap.is_empty());
    }

    #[test]
    fn test_iter_does_not_remove() {
        let mut treap = Treap::seeded(2);
        treap.insert(4, 'd');
        treap.insert(2, 'b');
        assert_eq!(treap.iter().next(), Some((&2, &'b')));
        assert_eq!(treap.len(), 2);
    }

    #[test]
    fn test_iter_in_key_order() {
        let mut treap = Treap::seeded(5);
        for name in ["Warszawa", "Kraków", "Gdańsk", "Łódź", "Poznań"] {
            treap.insert(name.to_string(), name.len());
        }
        let keys: Vec<&String> = treap.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_limit_reports_allocation_failure() {
        let mut treap = Treap::seeded(5).with_limit(Some(2));
        assert_eq!(treap.insert(1, ()), InsertOutcome::Inserted);
        assert_eq!(treap.insert(2, ()), InsertOutcome::Inserted);
        assert_eq!(treap.insert(3, ()), InsertOutcome::AllocationFailed);
        assert_eq!(treap.len(), 2);
        assert!(!treap.contains_key(&3));

        treap.remove(&1);
        assert_eq!(treap.insert(3, ()), InsertOutcome::Inserted);
    }

    #[test]
    fn test_same_seed_same_shape() {
        let build = || {
            let mut treap = Treap::seeded(99);
            for k in 0..200 {
                treap.insert(k, ());
            }
            treap
        };
        let (a, b) = (build(), build());
        assert_eq!(a.root, b.root);
        assert_eq!(a.depth(), b.depth());
    }

    #[test]
    fn test_sorted_inserts_stay_shallow() {
        let mut treap = Treap::seeded(1234);
        for k in 0..4096 {
            treap.insert(k, ());
        }
        // A plain BST would be 4096 deep here.
        assert!(treap.depth() < 64, "depth {}", treap.depth());
        assert_well_formed(&treap);
    }

    #[test]
    fn test_random_operations_keep_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let mut treap = Treap::seeded(17);
        let mut model = std::collections::BTreeMap::new();

        for _ in 0..2000 {
            let key: u16 = rng.gen_range(0..300);
            if rng.gen_bool(0.6) {
                let outcome = treap.insert(key, u32::from(key) * 2);
                let expected = if model.contains_key(&key) {
                    InsertOutcome::AlreadyPresent
                } else {
                    model.insert(key, u32::from(key) * 2);
                    InsertOutcome::Inserted
                };
                assert_eq!(outcome, expected);
            } else {
                assert_eq!(treap.remove(&key), model.remove(&key));
            }
        }

        assert_well_formed(&treap);
        let entries: Vec<(u16, u32)> = treap.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u32)> = model.into_iter().collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_custom_priority_source() {
        // A constant source degenerates to a plain BST but must stay correct.
        struct Flat;
        impl RngCore for Flat {
            fn next_u32(&mut self) -> u32 {
                0
            }
            fn next_u64(&mut self) -> u64 {
                0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                dest.fill(0);
                Ok(())
            }
        }

        let mut treap = Treap::with_rng(Flat);
        for k in [3, 1, 2] {
            treap.insert(k, ());
        }
        assert_eq!(treap.remove(&1), Some(()));
        assert_eq!(treap.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    }
}
