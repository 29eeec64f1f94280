use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{Error, InitError};
use crate::task::Payload;

/// A node's position in its enclosing graph.
///
/// `Beginning`/`End` mark the two ends of a standalone graph (or subgraph);
/// once that subgraph has been spliced into a larger one via [`Node::after`]
/// or [`Node::between`] its ends are downgraded to `MiddleBeginning`/
/// `MiddleEnd` so the walker no longer treats them as graph boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Middle,
    Beginning,
    End,
    MiddleBeginning,
    MiddleEnd,
    Hidden,
}

pub(crate) fn middle_type(kind: Kind) -> Kind {
    match kind {
        Kind::Beginning => Kind::MiddleBeginning,
        Kind::End => Kind::MiddleEnd,
        other => other,
    }
}

pub(crate) fn is_middle_type(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Middle | Kind::MiddleBeginning | Kind::MiddleEnd | Kind::Hidden
    )
}

/// A node's progress through one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotSeen,
    Visited,
    Done,
    Failed,
}

struct Inner {
    payload: Option<Payload>,
    status: Status,
    kind: Kind,
    parents: Vec<Node>,
    children: Vec<Node>,
    // Set on the beginning node of a `New()` pair, pointing at its end.
    end: Option<Node>,
    // Set on the end node of a `New()` pair, pointing at its beginning.
    beginning: Option<Node>,
}

/// A handle into the graph. Cloning a `Node` clones the handle, not the
/// node: all clones refer to the same underlying data, the way a pointer
/// does in the original implementation. This crate never tears a graph
/// down mid-process, so the reference cycles this implies (a node's
/// payload holds the task, which holds the node back) are an accepted
/// leak rather than a bug; see `DESIGN.md`.
#[derive(Clone)]
pub struct Node(Arc<Mutex<Inner>>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    // A node's `Inner` holds other `Node`s (parents, children, and the
    // beginning/end cross-link), so a derived, recursive Debug would walk
    // the whole graph -- and the beginning/end cross-link makes that walk
    // cyclic. Identify the node by its handle's address instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:p})", Arc::as_ptr(&self.0))
    }
}

impl Node {
    fn from_inner(inner: Inner) -> Self {
        Node(Arc::new(Mutex::new(inner)))
    }

    /// Creates a standalone beginning/end pair, the skeleton of an empty
    /// graph or subgraph.
    pub fn new_pair() -> (Node, Node) {
        let b = Node::from_inner(Inner {
            payload: None,
            status: Status::NotSeen,
            kind: Kind::Beginning,
            parents: Vec::new(),
            children: Vec::new(),
            end: None,
            beginning: None,
        });
        let e = Node::from_inner(Inner {
            payload: None,
            status: Status::NotSeen,
            kind: Kind::End,
            parents: Vec::new(),
            children: Vec::new(),
            end: None,
            beginning: None,
        });

        b.0.lock().unwrap().children.push(e.clone());
        e.0.lock().unwrap().parents.push(b.clone());
        b.0.lock().unwrap().end = Some(e.clone());
        e.0.lock().unwrap().beginning = Some(b.clone());

        (b, e)
    }

    /// An empty node of the given kind, awaiting a payload set once the
    /// owning task knows its own handle (mirrors the original's two-step
    /// `setAnchor`).
    pub fn empty_with_kind(kind: Kind) -> Node {
        Node::from_inner(Inner {
            payload: None,
            status: Status::NotSeen,
            kind,
            parents: Vec::new(),
            children: Vec::new(),
            end: None,
            beginning: None,
        })
    }

    /// A plain, single task node: not part of a `New()` pair.
    pub fn empty() -> Node {
        Node::empty_with_kind(Kind::Middle)
    }

    /// A node excluded from the walker's normal traversal output (it is
    /// always marked done the instant it is visited): used for static
    /// fan-in inputs spliced between a `ForEach` beginning and end.
    pub fn hidden() -> Node {
        Node::empty_with_kind(Kind::Hidden)
    }

    pub fn set_payload(&self, payload: Payload) {
        self.0.lock().unwrap().payload = Some(payload);
    }

    pub fn payload(&self) -> Option<Payload> {
        self.0.lock().unwrap().payload.clone()
    }

    pub fn kind(&self) -> Kind {
        self.0.lock().unwrap().kind
    }

    fn set_kind(&self, kind: Kind) {
        self.0.lock().unwrap().kind = kind;
    }

    pub fn status(&self) -> Status {
        self.0.lock().unwrap().status
    }

    pub fn set_status(&self, status: Status) {
        self.0.lock().unwrap().status = status;
    }

    pub fn mark_done(&self) {
        self.set_status(Status::Done);
    }

    pub fn mark_failed(&self) {
        self.set_status(Status::Failed);
    }

    /// A node counts as done once it has finished, or if it is a beginning
    /// node (which has no work of its own to do).
    pub fn done(&self) -> bool {
        let inner = self.0.lock().unwrap();
        inner.status == Status::Done || inner.kind == Kind::Beginning
    }

    pub fn parents(&self) -> Vec<Node> {
        self.0.lock().unwrap().parents.clone()
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.lock().unwrap().children.clone()
    }

    pub fn parents_done(&self) -> bool {
        self.parents().iter().all(|p| p.done())
    }

    fn end_node(&self) -> Option<Node> {
        self.0.lock().unwrap().end.clone()
    }

    fn beginning_node(&self) -> Option<Node> {
        self.0.lock().unwrap().beginning.clone()
    }

    fn is_graph(&self) -> bool {
        let inner = self.0.lock().unwrap();
        inner.beginning.is_some() || inner.end.is_some()
    }

    fn children_add(&self, node: Node) {
        let mut inner = self.0.lock().unwrap();
        if !inner.children.contains(&node) {
            inner.children.push(node);
        }
    }

    fn children_remove(&self, node: &Node) {
        self.0.lock().unwrap().children.retain(|n| n != node);
    }

    fn children_replace(&self, before: &Node, after: &Node) {
        let mut inner = self.0.lock().unwrap();
        match inner.children.iter().position(|n| n == before) {
            Some(i) => inner.children[i] = after.clone(),
            None => {
                if !inner.children.contains(after) {
                    inner.children.push(after.clone());
                }
            }
        }
    }

    fn parents_add(&self, node: Node) {
        let mut inner = self.0.lock().unwrap();
        if !inner.parents.contains(&node) {
            inner.parents.push(node);
        }
    }

    fn parents_replace(&self, before: &Node, after: &Node) {
        let mut inner = self.0.lock().unwrap();
        match inner.parents.iter().position(|n| n == before) {
            Some(i) => inner.parents[i] = after.clone(),
            None => {
                if !inner.parents.contains(after) {
                    inner.parents.push(after.clone());
                }
            }
        }
    }

    /// Splices `node` in immediately after `self`, reparenting every one of
    /// `self`'s current children onto `node` (or, if `node` is itself a
    /// subgraph, onto its end).
    ///
    /// If `node` is a subgraph, its own beginning/end are downgraded to
    /// `MiddleBeginning`/`MiddleEnd`: it is no longer a graph boundary, it
    /// is the middle of a bigger one.
    pub fn after(&self, node: &Node) -> Result<(), Error> {
        log::trace!("taskflow: dag: splicing {:?} after {:?}", node, self);
        for child in self.children() {
            if node.is_graph() {
                let end = node.end_node().expect("graph node has an end");
                child.parents_replace(self, &end);
                end.children_add(child.clone());
            } else {
                child.parents_replace(self, node);
                node.children_add(child.clone());
            }
            self.children_remove(&child);
        }

        if node.is_graph() {
            if node.beginning_node().is_some() {
                return Err(InitError::new(
                    "cannot pass the last node of a group into after()",
                )
                .into());
            }
            node.set_kind(middle_type(node.kind()));
            let end = node.end_node().expect("graph node has an end");
            end.set_kind(middle_type(end.kind()));
        }

        node.parents_add(self.clone());
        self.children_add(node.clone());

        Ok(())
    }

    /// Splices `self` in between `beginning` and `end`, replacing whatever
    /// edge currently connects them.
    pub fn between(&self, beginning: &Node, end: &Node) -> Result<(), Error> {
        log::trace!(
            "taskflow: dag: splicing {:?} between {:?} and {:?}",
            self,
            beginning,
            end
        );
        if self.is_graph() {
            beginning.children_replace(end, self);
            end.parents_replace(beginning, &self.end_node().expect("graph node has an end"));

            self.parents_add(beginning.clone());
            let self_end = self.end_node().expect("graph node has an end");
            self_end.children_add(end.clone());

            self.set_kind(middle_type(self.kind()));
            self_end.set_kind(middle_type(self_end.kind()));

            return Ok(());
        }

        beginning.children_remove(end);
        end.0.lock().unwrap().parents.retain(|p| p != beginning);

        beginning.children_replace(end, self);
        end.parents_replace(beginning, self);

        self.parents_add(beginning.clone());
        self.children_add(end.clone());

        Ok(())
    }
}
