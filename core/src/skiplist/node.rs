//! Skip list nodes and the slab that owns them.

/// Index of a node in the slab.
pub(crate) type NodeId = usize;

/// Head sentinel. Sorts before every real node.
pub(crate) const HEAD: NodeId = 0;
/// Tail sentinel. Sorts after every real node and has no forward links.
pub(crate) const TAIL: NodeId = 1;

pub(crate) struct Node<T> {
    /// `None` for the sentinels and for released slots.
    pub(crate) value: Option<T>,
    pub(crate) score: i64,
    /// Successor per level; `forward.len()` is the number of levels the node
    /// participates in.
    pub(crate) forward: Vec<NodeId>,
}

impl<T> Node<T> {
    pub(crate) fn sentinel(levels: usize) -> Self {
        Self {
            value: None,
            score: 0,
            forward: vec![TAIL; levels],
        }
    }

    pub(crate) fn new(value: T, score: i64, levels: usize) -> Self {
        Self {
            value: Some(value),
            score,
            forward: Vec::with_capacity(levels),
        }
    }
}

/// Node storage with slot reuse. Slots 0 and 1 hold the sentinels.
pub(crate) struct NodeSlab<T> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
}

impl<T> NodeSlab<T> {
    pub(crate) fn new(levels: usize) -> Self {
        Self {
            nodes: vec![Node::sentinel(levels), Node::sentinel(0)],
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, node: Node<T>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Drop the value held by an unlinked node and make its slot reusable.
    pub(crate) fn release(&mut self, id: NodeId) -> Option<T> {
        debug_assert!(id != HEAD && id != TAIL);
        let node = &mut self.nodes[id];
        node.forward = Vec::new();
        self.free.push(id);
        node.value.take()
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.nodes[id]
    }

    /// Successor of `id` at `level`, or `None` if the node has no link there.
    #[inline]
    pub(crate) fn next(&self, id: NodeId, level: usize) -> Option<NodeId> {
        self.nodes[id].forward.get(level).copied()
    }
}
