//! The task layer: task kinds, their capability traits, and the fan-in
//! result aggregation that binds them to the graph in `dag`.

mod base;
mod cmd_task;
mod fn_task;
mod foreach;
mod group;
mod payload;

pub use base::{Attacher, Executor, Joint, Piece, Resulter, TaskBase, TaskResult, Value};
pub use cmd_task::{cmd, dir, env, make_dir, remove_dir, CmdTask};
pub use fn_task::{
    nothing, r#fn, string_closure, string_slice_closure, transform, unmarshal_file, without,
    FnClosure, FnTask, StringClosureFn, StringSliceClosureFn,
};
pub use foreach::{for_each, ForEachFactory};
pub use group::{group, GroupTask};
pub(crate) use payload::Payload;
