//! The ordered, observable node collection.
//!
//! A [`NodeCollection`] is a doubly linked sequence of [`NodeId`]s. Links live
//! in the collection, indexed by node id, so a node can be in at most one
//! collection's sequence at a time and the collection never needs access to
//! the view data.
//!
//! All operations take `&self`. Listeners receive the collection itself and
//! may add or remove nodes from inside a notification.
//!
//! ## Walking while mutating
//!
//! [`NodeCursor`] (and [`NodeIter`], which wraps one) remembers the node it
//! last returned, that node's removal count, and its successor at the time. On
//! the next step it follows the live link if the last node has not been
//! removed since, and the remembered successor otherwise. A node that was
//! removed and added back (or whose id was recycled) counts as removed.
//! Removing the current node, or the node right after it, therefore never
//! skips or repeats any other node. If both are removed before the next step,
//! the walk ends early.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use tracing::trace;

use crate::error::CollectionError;
use crate::node::NodeId;
use crate::signal::{Signal, SubscriptionId};

/// Listener type for node added/removed notifications.
///
/// Listeners get the collection and the node id only. The family owning the
/// collection is mid-update while they run, so view data and the node's
/// entity are not reachable from inside the listener; record the id and look
/// it up through the family once the triggering call has returned.
pub type NodeListener = dyn Fn(&NodeCollection, NodeId);

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    previous: Option<NodeId>,
    next: Option<NodeId>,
    member: bool,
    // Times this slot has left the collection.
    removals: u64,
}

/// An ordered doubly linked sequence of nodes.
///
/// Default order is insertion order. Append, removal, and swap are O(1).
pub struct NodeCollection {
    links: RefCell<Vec<Link>>,
    head: Cell<Option<NodeId>>,
    tail: Cell<Option<NodeId>>,
    len: Cell<usize>,
    added: Signal<NodeListener>,
    removed: Signal<NodeListener>,
}

impl NodeCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            links: RefCell::new(Vec::new()),
            head: Cell::new(None),
            tail: Cell::new(None),
            len: Cell::new(0),
            added: Signal::new(),
            removed: Signal::new(),
        }
    }

    /// The first node, if any.
    #[must_use]
    pub fn head(&self) -> Option<NodeId> {
        self.head.get()
    }

    /// The last node, if any.
    #[must_use]
    pub fn tail(&self) -> Option<NodeId> {
        self.tail.get()
    }

    /// The node after `id`. `None` for the tail and for non-members.
    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.link(id).next
    }

    /// The node before `id`. `None` for the head and for non-members.
    #[must_use]
    pub fn previous(&self, id: NodeId) -> Option<NodeId> {
        self.link(id).previous
    }

    /// Whether `id` is currently linked into this collection.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.link(id).member
    }

    /// Number of member nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Returns `true` if the collection has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Append `id` at the tail, then notify `added` listeners.
    pub fn add(&self, id: NodeId) -> Result<(), CollectionError> {
        {
            let mut links = self.links.borrow_mut();
            if links.len() <= id.index() {
                links.resize(id.index() + 1, Link::default());
            }
            if links[id.index()].member {
                return Err(CollectionError::AlreadyMember(id));
            }

            let tail = self.tail.get();
            let link = &mut links[id.index()];
            link.previous = tail;
            link.next = None;
            link.member = true;
            match tail {
                Some(t) => links[t.index()].next = Some(id),
                None => self.head.set(Some(id)),
            }
            self.tail.set(Some(id));
            self.len.set(self.len.get() + 1);
        }

        trace!(node = %id, len = self.len(), "node added");
        self.emit(&self.added, id);
        Ok(())
    }

    /// Unlink `id` from its neighbours, notify `removed` listeners, then clear
    /// the node's own links.
    ///
    /// While the listeners run, the removed node still points at its former
    /// neighbours.
    pub fn remove(&self, id: NodeId) -> Result<(), CollectionError> {
        {
            let mut links = self.links.borrow_mut();
            let link = match links.get(id.index()) {
                Some(link) if link.member => *link,
                _ => return Err(CollectionError::NotMember(id)),
            };

            match link.previous {
                Some(p) => links[p.index()].next = link.next,
                None => self.head.set(link.next),
            }
            match link.next {
                Some(n) => links[n.index()].previous = link.previous,
                None => self.tail.set(link.previous),
            }
            links[id.index()].member = false;
            links[id.index()].removals += 1;
            self.len.set(self.len.get() - 1);
        }

        trace!(node = %id, len = self.len(), "node removed");
        self.emit(&self.removed, id);

        // A listener may have added the node back.
        let mut links = self.links.borrow_mut();
        if let Some(link) = links.get_mut(id.index())
            && !link.member
        {
            link.previous = None;
            link.next = None;
        }
        Ok(())
    }

    /// Exchange the positions of two members.
    ///
    /// Handles adjacent pairs and pairs touching the head or tail. Swapping a
    /// node with itself is a no-op. No notifications are sent.
    pub fn swap(&self, a: NodeId, b: NodeId) -> Result<(), CollectionError> {
        let mut links = self.links.borrow_mut();
        for id in [a, b] {
            if !links.get(id.index()).is_some_and(|l| l.member) {
                return Err(CollectionError::NotMember(id));
            }
        }
        if a == b {
            return Ok(());
        }

        let la = links[a.index()];
        let lb = links[b.index()];

        if la.next == Some(b) {
            self.swap_adjacent(&mut links, a, b);
        } else if lb.next == Some(a) {
            self.swap_adjacent(&mut links, b, a);
        } else {
            links[a.index()].previous = lb.previous;
            links[a.index()].next = lb.next;
            links[b.index()].previous = la.previous;
            links[b.index()].next = la.next;

            match la.previous {
                Some(p) => links[p.index()].next = Some(b),
                None => self.head.set(Some(b)),
            }
            match la.next {
                Some(n) => links[n.index()].previous = Some(b),
                None => self.tail.set(Some(b)),
            }
            match lb.previous {
                Some(p) => links[p.index()].next = Some(a),
                None => self.head.set(Some(a)),
            }
            match lb.next {
                Some(n) => links[n.index()].previous = Some(a),
                None => self.tail.set(Some(a)),
            }
        }

        trace!(a = %a, b = %b, "nodes swapped");
        Ok(())
    }

    // `first` immediately precedes `second`.
    fn swap_adjacent(&self, links: &mut [Link], first: NodeId, second: NodeId) {
        let lf = links[first.index()];
        let ls = links[second.index()];

        links[second.index()].previous = lf.previous;
        links[second.index()].next = Some(first);
        links[first.index()].previous = Some(second);
        links[first.index()].next = ls.next;

        match lf.previous {
            Some(p) => links[p.index()].next = Some(second),
            None => self.head.set(Some(second)),
        }
        match ls.next {
            Some(n) => links[n.index()].previous = Some(first),
            None => self.tail.set(Some(first)),
        }
    }

    /// Unlink every node, head first, clearing each node's links and notifying
    /// `removed` listeners for each one.
    pub fn remove_all(&self) {
        loop {
            let id = {
                let mut links = self.links.borrow_mut();
                let Some(id) = self.head.get() else {
                    break;
                };
                let link = &mut links[id.index()];
                let next = link.next;
                *link = Link {
                    removals: link.removals + 1,
                    ..Link::default()
                };
                self.head.set(next);
                match next {
                    Some(n) => links[n.index()].previous = None,
                    None => self.tail.set(None),
                }
                self.len.set(self.len.get() - 1);
                id
            };
            self.emit(&self.removed, id);
        }
        trace!("collection emptied");
    }

    /// Reorder the members with a stable sort. No notifications are sent.
    pub fn sort_by(&self, mut compare: impl FnMut(NodeId, NodeId) -> Ordering) {
        let mut ids: Vec<NodeId> = self.iter().collect();
        if ids.len() < 2 {
            return;
        }
        ids.sort_by(|a, b| compare(*a, *b));

        let mut links = self.links.borrow_mut();
        for (i, id) in ids.iter().enumerate() {
            let link = &mut links[id.index()];
            link.previous = i.checked_sub(1).map(|p| ids[p]);
            link.next = ids.get(i + 1).copied();
        }
        self.head.set(ids.first().copied());
        self.tail.set(ids.last().copied());
    }

    /// A walk over the members that tolerates removal of the current node and
    /// of its successor.
    #[must_use]
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            nodes: self,
            cursor: NodeCursor::new(),
        }
    }

    /// A detached cursor, for walks that need to mutate the owner of this
    /// collection between steps.
    #[must_use]
    pub fn cursor(&self) -> NodeCursor {
        NodeCursor::new()
    }

    /// Subscribe to node additions. See [`NodeListener`] for what a listener
    /// can reach.
    pub fn on_node_added(
        &self,
        listener: impl Fn(&NodeCollection, NodeId) + 'static,
    ) -> SubscriptionId {
        self.added.connect(Rc::new(listener))
    }

    /// Subscribe to node removals. See [`NodeListener`] for what a listener
    /// can reach.
    pub fn on_node_removed(
        &self,
        listener: impl Fn(&NodeCollection, NodeId) + 'static,
    ) -> SubscriptionId {
        self.removed.connect(Rc::new(listener))
    }

    /// Unsubscribe an `on_node_added` listener.
    pub fn disconnect_added(&self, id: SubscriptionId) -> bool {
        self.added.disconnect(id)
    }

    /// Unsubscribe an `on_node_removed` listener.
    pub fn disconnect_removed(&self, id: SubscriptionId) -> bool {
        self.removed.disconnect(id)
    }

    // Member without having been removed since `removals` was observed.
    fn still_linked(&self, id: NodeId, removals: u64) -> bool {
        let link = self.link(id);
        link.member && link.removals == removals
    }

    fn link(&self, id: NodeId) -> Link {
        self.links
            .borrow()
            .get(id.index())
            .copied()
            .unwrap_or_default()
    }

    fn emit(&self, signal: &Signal<NodeListener>, id: NodeId) {
        for listener in signal.snapshot() {
            listener(self, id);
        }
    }
}

impl Default for NodeCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// A position in a walk over a [`NodeCollection`] that borrows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeCursor {
    started: bool,
    last: Option<NodeId>,
    last_removals: u64,
    upcoming: Option<NodeId>,
}

impl NodeCursor {
    /// A cursor positioned before the head.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Step to the next member of `nodes`.
    pub fn advance(&mut self, nodes: &NodeCollection) -> Option<NodeId> {
        let candidate = match self.last {
            None if !self.started => nodes.head(),
            None => None,
            Some(last) if nodes.still_linked(last, self.last_removals) => nodes.next(last),
            Some(_) => self.upcoming.filter(|id| nodes.contains(*id)),
        };
        self.started = true;
        self.last = candidate;
        self.last_removals = candidate.map_or(0, |id| nodes.link(id).removals);
        self.upcoming = candidate.and_then(|id| nodes.next(id));
        candidate
    }
}

/// Borrowing iterator over a [`NodeCollection`]; see [`NodeCursor`].
#[derive(Debug)]
pub struct NodeIter<'a> {
    nodes: &'a NodeCollection,
    cursor: NodeCursor,
}

impl Iterator for NodeIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.cursor.advance(self.nodes)
    }
}
