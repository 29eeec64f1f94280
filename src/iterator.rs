//! The consumer-facing wrapper around a [`Walker`](crate::dag::Walker):
//! turns raw walked nodes into the `Joint`s a runner actually cares about,
//! silently disposing of everything else.

use crate::dag::{Kind, Node, Walker};
use crate::error::Error;
use crate::task::{Executor, Joint};

/// Walks a graph one executable (or otherwise interesting) `Joint` at a
/// time. Non-executable payloads (group boundaries, `ForEach`'s hidden
/// static inputs) are marked done and skipped transparently, the way
/// `iterator.go`'s `Next` does with its `Joint`/default type-switch arms.
pub struct Iterator {
    walker: Walker,
}

impl Iterator {
    pub fn new(root: Node) -> Result<Self, Error> {
        Ok(Iterator {
            walker: Walker::new(root)?,
        })
    }

    /// Advances to the next node worth surfacing to a caller.
    ///
    /// Returns `(Some(joint), true)` for every node whose payload is an
    /// [`Executor`] -- note this can also be `None` for a payload that is a
    /// bare `Joint` with no execution semantics but is not an `End`
    /// boundary, matching the original's behavior where such nodes are
    /// still handed to the caller (they simply can't be downcast to
    /// `Executor`, so a driver that only ever calls `Exec` on what this
    /// returns is unaffected either way).
    pub fn next(&mut self) -> Result<Joints, Error> {
        loop {
            let node = match self.walker.walk()? {
                Some(node) => node,
                None => return Ok(Joints::End),
            };

            let payload = match node.payload() {
                Some(payload) => payload,
                None => {
                    node.mark_done();
                    continue;
                }
            };

            if let Some(executor) = payload.as_executor() {
                return Ok(Joints::Executor(executor));
            }

            node.mark_done();
            if node.kind() != Kind::End {
                return Ok(Joints::Joint(payload.as_joint()));
            }
        }
    }
}

/// What [`Iterator::next`] hands back: either something the caller should
/// drive via [`Executor::exec`], a plain informational `Joint`, or the
/// end of the walk. Splitting this out as an enum (rather than the
/// original's `(Joint, bool)` pair, where a non-`Executor` `Joint` and
/// "no more nodes" both have to be distinguished by the caller via a type
/// assertion) gives a caller an exhaustive match instead of a runtime
/// downcast.
pub enum Joints {
    Executor(std::sync::Arc<dyn Executor>),
    Joint(std::sync::Arc<dyn Joint>),
    End,
}
