//! `taskflow` is a small library for composing data-processing workflows as
//! a directed acyclic graph whose nodes are units of computation -- in-
//! process closures or spawned external processes -- and whose edges carry
//! typed results from predecessors to successors.
//!
//! A workflow is built programmatically with [`group`] and [`Attacher::then`]
//! and executed by pulling an [`iterator::Iterator`] to completion, driving
//! each runnable task's [`Executor::exec`] and draining its streamed output.
//! The hard parts -- the graph's subgraph-splicing invariants, the walker's
//! topological order, fan-in result aggregation, and `ForEach`'s dynamic
//! graph expansion -- live in [`dag`] and [`task`]; everything else (a
//! terminal drawer, a CLI runner, declarative workflow files) is explicitly
//! out of scope, see `DESIGN.md`.

pub mod context;
pub mod dag;
pub mod drawer;
pub mod error;
pub mod iterator;
pub mod task;
pub mod template;
pub mod test_support;

pub use context::Context;
pub use dag::{Kind, Node, Status};
pub use drawer::Drawer;
pub use error::{BrokenGraph, Error, InitError, MultiError, TypeError};
pub use iterator::{Iterator, Joints};
pub use task::{
    cmd, dir, env, for_each, group, make_dir, nothing, r#fn, remove_dir, string_closure,
    string_slice_closure, transform, unmarshal_file, without, Attacher, CmdTask, Executor,
    FnClosure, FnTask, ForEachFactory, GroupTask, Joint, Piece, Resulter, StringClosureFn,
    StringSliceClosureFn, TaskResult, Value,
};
