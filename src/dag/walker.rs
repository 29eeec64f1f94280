use super::node::{is_middle_type, Kind, Status};
use super::stack::Stack;
use super::Node;
use crate::error::{BrokenGraph, Error};

/// Drives a single-threaded topological walk over a graph rooted at a
/// beginning node.
///
/// The walker is intentionally sequential (unlike the parallel `traverse`
/// style used elsewhere in the corpus for build-graph scheduling): task
/// results fan in from parents to children in a way that needs one node
/// finished, and its result read, before the next is chosen, and
/// `ForEach` splices new nodes into the graph *while* the walk is in
/// progress, which would not be safe under concurrent traversal.
pub struct Walker {
    stack: Stack,
    previous: Option<Node>,
}

impl Walker {
    /// Builds a walker starting at `root`, which must be the beginning node
    /// of a graph.
    pub fn new(root: Node) -> Result<Self, Error> {
        if root.kind() != Kind::Beginning {
            return Err(Error::init("taskflow: dag: start node expected"));
        }

        let mut w = Walker {
            stack: Stack::new(),
            previous: None,
        };
        w.stack.push(root);
        Ok(w)
    }

    /// Advances the walk by one node.
    ///
    /// Returns `Ok(None)` once the walk is complete, `Ok(Some(node))` for
    /// each node that becomes eligible to run (all of its parents done),
    /// and `Err(BrokenGraph)` if the stack empties out while join nodes are
    /// still waiting on parents that will never finish.
    pub fn walk(&mut self) -> Result<Option<Node>, Error> {
        let mut memory = Stack::new();

        let result = loop {
            if let Some(prev) = self.previous.clone() {
                if prev.status() != Status::Failed {
                    let children = prev.children();
                    for child in children.into_iter().rev() {
                        if child.status() == Status::NotSeen {
                            child.set_status(Status::Visited);
                            self.stack.push(child);
                        }
                    }
                }
            }

            let node = match self.stack.pop() {
                Some(n) => n,
                None => {
                    if !memory.is_empty() {
                        log::warn!(
                            "taskflow: dag: walker stack emptied with {} node(s) still waiting on parents",
                            memory.len()
                        );
                        break Err(BrokenGraph.into());
                    }
                    break Ok(None);
                }
            };

            if node.done() && is_middle_type(node.kind()) {
                continue;
            }

            if node.parents_done() {
                if node.kind() == Kind::End {
                    break Ok(None);
                }

                log::trace!("taskflow: dag: walker yielding {:?} (kind {:?})", node, node.kind());
                self.previous = Some(node.clone());
                break Ok(Some(node));
            }

            memory.push(node);
        };

        // Whatever happens, any node we set aside waiting on a parent goes
        // back onto the real stack so the next call retries it first.
        while let Some(node) = memory.pop() {
            self.stack.push(node);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_end(w: &mut Walker) -> Result<Vec<Node>, Error> {
        let mut seen = Vec::new();
        while let Some(n) = w.walk()? {
            n.mark_done();
            seen.push(n);
        }
        Ok(seen)
    }

    #[test]
    fn rejects_a_non_beginning_root() {
        let n = Node::empty();
        assert!(Walker::new(n).is_err());
    }

    #[test]
    fn walks_a_straight_chain_in_order() {
        let (b, _e) = Node::new_pair();
        let mid = Node::empty();
        b.after(&mid).unwrap();

        let mut w = Walker::new(b).unwrap();
        let seen = run_to_end(&mut w).unwrap();

        assert_eq!(seen, vec![mid]);
    }

    #[test]
    fn defers_a_join_node_until_every_parent_is_done() {
        // `between(parent, child)` called repeatedly against the *same*
        // edge accumulates fan-out/fan-in rather than re-splitting it once
        // the direct edge is gone, exactly like `node.go`'s `between`: the
        // diamond below gives `join` two parents.
        let (b, e) = Node::new_pair();
        let left = Node::empty();
        let right = Node::empty();
        let join = Node::empty();

        left.between(&b, &e).unwrap();
        right.between(&b, &e).unwrap();
        join.between(&left, &e).unwrap();
        join.between(&right, &e).unwrap();

        assert_eq!(join.parents().len(), 2);

        let mut w = Walker::new(b).unwrap();
        let seen = run_to_end(&mut w).unwrap();

        assert_eq!(seen.last().cloned(), Some(join));
    }

    #[test]
    fn reports_broken_graph_when_a_consumer_never_finishes_a_node() {
        let (b, e) = Node::new_pair();
        let left = Node::empty();
        let right = Node::empty();
        let join = Node::empty();

        left.between(&b, &e).unwrap();
        right.between(&b, &e).unwrap();
        join.between(&left, &e).unwrap();
        join.between(&right, &e).unwrap();

        let mut w = Walker::new(b).unwrap();

        // Mark every node done except `right`: `join` (and, in turn, `e`)
        // can then never see all of their parents finished.
        let err = loop {
            match w.walk() {
                Ok(Some(n)) => {
                    if n != right {
                        n.mark_done();
                    }
                }
                Ok(None) => panic!("walk should never cleanly finish here"),
                Err(err) => break err,
            }
        };

        assert!(matches!(err, Error::BrokenGraph(_)));
    }
}
