//! A small in-process stand-in for the original's standalone `testrunner`
//! package: drives an [`Iterator`] to completion, the way a real runner
//! (out of scope for this crate) would, so this crate's own tests don't
//! each have to hand-roll that drive loop. Grounded on
//! `examples/original_source/pkg/runner/testrunner/runner.go`.

use std::thread;
use std::time::Duration;

use crate::context::Context;
use crate::dag::Node;
use crate::error::Error;
use crate::iterator::{Iterator, Joints};

/// Anything an [`Iterator`] can be started from. Implemented for
/// [`GroupTask`](crate::task::GroupTask) and for a bare `Attacher`'s anchor
/// node, covering every shape a caller builds a workflow as.
pub trait IteratorProvider {
    fn iter(&self) -> Result<Iterator, Error>;
}

impl IteratorProvider for crate::task::GroupTask {
    fn iter(&self) -> Result<Iterator, Error> {
        crate::task::GroupTask::iter(self)
    }
}

/// An `IteratorProvider` rooted directly at a graph's beginning node,
/// for tests that build a bare chain with `Attacher::then` and never wrap
/// it in a named `GroupTask`.
pub struct Anchored(pub Node);

impl IteratorProvider for Anchored {
    fn iter(&self) -> Result<Iterator, Error> {
        Iterator::new(self.0.clone())
    }
}

/// Drives `prov`'s iterator to completion, executing every runnable task
/// and draining its output, the way a CLI runner would. Returns the first
/// error observed, whether from starting a task, from one of its streamed
/// pieces, or from the walker itself.
///
/// A background thread cancels the context after five minutes, mirroring
/// the original's `context.WithTimeout`, so a test that deadlocks on a
/// broken pipeline fails instead of hanging the suite forever.
pub fn run(prov: &dyn IteratorProvider) -> Result<(), Error> {
    // `pretty_env_logger` is a dev-dependency, so this install only compiles
    // for this crate's own `cargo test` (where `cfg(test)` holds); a
    // downstream crate calling `test_support::run` in its own tests wires up
    // its own logger the same way button's daemon does for its process.
    // Harmless past the first call if a logger is already installed.
    #[cfg(test)]
    let _ = pretty_env_logger::try_init();

    let ctx = Context::new();
    let cancel = ctx.cancel_handle();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(5 * 60));
        cancel.cancel();
    });

    let mut iter = prov.iter()?;

    loop {
        match iter.next()? {
            Joints::End => return Ok(()),
            Joints::Joint(_) => continue,
            Joints::Executor(executor) => {
                let pieces = executor.exec(ctx.clone())?;
                for piece in pieces {
                    log::debug!("{}", piece.text);
                    if let Some(err) = piece.err {
                        return Err(err);
                    }
                }
            }
        }
    }
}
