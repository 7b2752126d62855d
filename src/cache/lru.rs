//! LRU Table Module
//!
//! Recency-ordered entry table for LRU eviction.

use std::collections::HashMap;

use crate::cache::CacheEntry;

type NodeId = usize;

#[derive(Debug)]
struct Node<V> {
    entry: CacheEntry<V>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

// == LRU Table ==
/// Owns resident entries in access order.
///
/// Entries live in an arena of slots linked into a doubly-linked list, with
/// a hash index from key to slot:
/// - Head = Least recently used (next eviction candidate)
/// - Tail = Most recently used
///
/// Lookup, move-to-tail, removal and eviction are all O(1).
#[derive(Debug)]
pub struct LruTable<V> {
    nodes: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl<V> Default for LruTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LruTable<V> {
    // == Constructor ==
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    // == Insert ==
    /// Inserts an entry at the most recently used position.
    ///
    /// If the key is already resident its entry is replaced in place, moved
    /// to the tail, and the previous entry is returned.
    pub fn insert(&mut self, entry: CacheEntry<V>) -> Option<CacheEntry<V>> {
        if let Some(&id) = self.index.get(&entry.key) {
            let previous = self.nodes[id]
                .as_mut()
                .map(|node| std::mem::replace(&mut node.entry, entry));
            self.detach(id);
            self.attach_back(id);
            return previous;
        }

        let key = entry.key.clone();
        let node = Node {
            entry,
            prev: None,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, id);
        self.attach_back(id);
        None
    }

    // == Touch ==
    /// Marks a key as recently used (moves to tail).
    ///
    /// Returns false if the key is not resident.
    pub fn touch(&mut self, key: &str) -> bool {
        match self.index.get(key) {
            Some(&id) => {
                self.detach(id);
                self.attach_back(id);
                true
            }
            None => false,
        }
    }

    // == Lookup ==
    /// Returns the entry for `key` without changing recency.
    pub fn get(&self, key: &str) -> Option<&CacheEntry<V>> {
        let id = *self.index.get(key)?;
        self.nodes[id].as_ref().map(|node| &node.entry)
    }

    /// Mutable access to the entry for `key` without changing recency.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry<V>> {
        let id = *self.index.get(key)?;
        self.nodes[id].as_mut().map(|node| &mut node.entry)
    }

    // == Remove ==
    /// Removes a key from the table, returning its entry.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let id = self.index.remove(key)?;
        self.detach(id);
        let node = self.nodes[id].take()?;
        self.free.push(id);
        Some(node.entry)
    }

    // == Pop Oldest ==
    /// Removes and returns the least recently used entry.
    ///
    /// Returns None if the table is empty.
    pub fn pop_oldest(&mut self) -> Option<CacheEntry<V>> {
        let id = self.head?;
        let key = self.nodes[id].as_ref()?.entry.key.clone();
        self.remove(&key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used entry without removing it.
    #[cfg(test)]
    pub(crate) fn peek_oldest(&self) -> Option<&CacheEntry<V>> {
        self.head
            .and_then(|id| self.nodes[id].as_ref())
            .map(|node| &node.entry)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    // == Length ==
    /// Returns the number of resident entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // == Contains ==
    /// Checks if a key is resident.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    // == Iteration ==
    /// Iterates entries from least to most recently used.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            cursor: self.head,
        }
    }

    fn detach(&mut self, id: NodeId) {
        let (prev, next) = match self.nodes[id].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.nodes[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.nodes[id].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_back(&mut self, id: NodeId) {
        let old_tail = self.tail;
        if let Some(node) = self.nodes[id].as_mut() {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => {
                if let Some(node) = self.nodes[t].as_mut() {
                    node.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }
}

/// Iterator over entries, least recently used first.
pub struct Iter<'a, V> {
    table: &'a LruTable<V>,
    cursor: Option<NodeId>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a CacheEntry<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.table.nodes[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some(&node.entry)
    }
}
