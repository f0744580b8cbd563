// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Monitored node store: a generational arena threaded by a circular
//! doubly-linked list of indices.
//!
//! INVARIANTS:
//! - Every occupied entry is linked into the ring exactly once.
//! - `head` is `None` iff the ring is empty.
//! - A freed entry bumps its generation, so old handles never resolve again.

use crate::types::{CounterModule, EntityKey, NodeHandle, COUNTERS_PER_MODULE};

/// Wrap-compensation state of one counter on one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AccumulatorState {
    /// Monotonic, caller-visible value.
    pub(crate) accumulated_value: u64,
    /// Last raw value folded into `accumulated_value`.
    pub(crate) last_raw_sample: u64,
    /// Most recent raw read.
    pub(crate) last_fetched_raw: u64,
}

/// Per-entity record.
#[derive(Debug, Clone)]
pub(crate) struct MonitoredNode {
    pub(crate) entity_key: EntityKey,
    pub(crate) valid: bool,
    pub(crate) slots: [AccumulatorState; COUNTERS_PER_MODULE],
}

impl MonitoredNode {
    fn new(entity_key: EntityKey) -> Self {
        Self { entity_key, valid: true, slots: [AccumulatorState::default(); COUNTERS_PER_MODULE] }
    }
}

struct Entry {
    generation: u32,
    node: Option<MonitoredNode>,
    prev: u32,
    next: u32,
}

/// Nodes of one module plus their round-robin order.
pub(crate) struct NodeRing {
    module: CounterModule,
    entries: Vec<Entry>,
    free: Vec<u32>,
    head: Option<u32>,
    len: usize,
    capacity: usize,
}

impl NodeRing {
    pub(crate) fn new(module: CounterModule, capacity: usize) -> Self {
        Self { module, entries: Vec::new(), free: Vec::new(), head: None, len: 0, capacity }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn head(&self) -> Option<u32> {
        self.head
    }

    /// Inserts a zeroed node at the ring tail. `None` when the arena is full.
    pub(crate) fn insert(&mut self, entity_key: EntityKey) -> Option<NodeHandle> {
        if self.len >= self.capacity {
            return None;
        }
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index as usize].node = Some(MonitoredNode::new(entity_key));
                index
            }
            None => {
                let index = u32::try_from(self.entries.len()).ok()?;
                self.entries.push(Entry { generation: 0, node: Some(MonitoredNode::new(entity_key)), prev: index, next: index });
                index
            }
        };
        self.link_tail(index);
        self.len += 1;
        Some(NodeHandle { module: self.module, index, generation: self.entries[index as usize].generation })
    }

    /// Unlinks and releases the node behind `handle`.
    pub(crate) fn remove(&mut self, handle: NodeHandle) -> Option<MonitoredNode> {
        self.resolve(handle)?;
        let index = handle.index;
        if let Some(node) = self.entries[index as usize].node.as_mut() {
            node.valid = false;
        }
        self.unlink(index);
        let entry = &mut self.entries[index as usize];
        entry.generation = entry.generation.wrapping_add(1);
        let node = entry.node.take();
        self.free.push(index);
        self.len -= 1;
        node
    }

    /// Drops every node. Outstanding handles become stale.
    pub(crate) fn clear(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.node.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.head = None;
        self.len = 0;
    }

    pub(crate) fn get(&self, handle: NodeHandle) -> Option<&MonitoredNode> {
        let index = self.resolve(handle)?;
        self.entries[index].node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut MonitoredNode> {
        let index = self.resolve(handle)?;
        self.entries[index].node.as_mut()
    }

    pub(crate) fn node_at_mut(&mut self, index: u32) -> Option<&mut MonitoredNode> {
        self.entries.get_mut(index as usize).and_then(|entry| entry.node.as_mut())
    }

    /// Moves `index` to the tail. Rotating the head just advances `head`.
    pub(crate) fn rotate_to_tail(&mut self, index: u32) {
        if self.head == Some(index) {
            self.head = Some(self.entries[index as usize].next);
            return;
        }
        self.unlink(index);
        self.link_tail(index);
    }

    /// Ring order starting at the head.
    #[cfg(test)]
    pub(crate) fn order(&self) -> Vec<NodeHandle> {
        let mut out = Vec::with_capacity(self.len);
        let Some(head) = self.head else {
            return out;
        };
        let mut cursor = head;
        loop {
            let entry = &self.entries[cursor as usize];
            out.push(NodeHandle { module: self.module, index: cursor, generation: entry.generation });
            cursor = entry.next;
            if cursor == head {
                break;
            }
        }
        out
    }

    fn resolve(&self, handle: NodeHandle) -> Option<usize> {
        if handle.module != self.module {
            return None;
        }
        let entry = self.entries.get(handle.index as usize)?;
        (entry.generation == handle.generation && entry.node.is_some()).then_some(handle.index as usize)
    }

    fn link_tail(&mut self, index: u32) {
        match self.head {
            None => {
                let entry = &mut self.entries[index as usize];
                entry.prev = index;
                entry.next = index;
                self.head = Some(index);
            }
            Some(head) => {
                let tail = self.entries[head as usize].prev;
                self.entries[tail as usize].next = index;
                self.entries[head as usize].prev = index;
                let entry = &mut self.entries[index as usize];
                entry.prev = tail;
                entry.next = head;
            }
        }
    }

    fn unlink(&mut self, index: u32) {
        let (prev, next) = {
            let entry = &self.entries[index as usize];
            (entry.prev, entry.next)
        };
        if next == index {
            self.head = None;
        } else {
            self.entries[prev as usize].next = next;
            self.entries[next as usize].prev = prev;
            if self.head == Some(index) {
                self.head = Some(next);
            }
        }
        let entry = &mut self.entries[index as usize];
        entry.prev = index;
        entry.next = index;
    }
}
