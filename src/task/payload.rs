use std::sync::Arc;

use super::base::{Executor, Joint, Resulter, TaskBase};
use super::cmd_task::CmdTask;
use super::fn_task::FnTask;

/// The closed set of shapes a node's payload can take. This replaces the
/// original's type-switch-on-`interface{}` dispatch (`task.go`'s
/// `gatherParentResults`, `iterator.go`'s `Next`) with exhaustive matching.
#[derive(Clone)]
pub enum Payload {
    /// A plain task: has a result, cannot be executed. Used for group
    /// boundaries and `ForEach`'s per-item static inputs.
    Base(Arc<TaskBase>),
    Fn(Arc<FnTask>),
    Cmd(Arc<CmdTask>),
}

impl Payload {
    pub fn as_joint(&self) -> Arc<dyn Joint> {
        match self {
            Payload::Base(t) => t.clone() as Arc<dyn Joint>,
            Payload::Fn(t) => t.clone() as Arc<dyn Joint>,
            Payload::Cmd(t) => t.clone() as Arc<dyn Joint>,
        }
    }

    pub fn as_resulter(&self) -> Option<Arc<dyn Resulter>> {
        match self {
            Payload::Base(t) => Some(t.clone() as Arc<dyn Resulter>),
            Payload::Fn(t) => Some(t.clone() as Arc<dyn Resulter>),
            Payload::Cmd(t) => Some(t.clone() as Arc<dyn Resulter>),
        }
    }

    pub fn as_executor(&self) -> Option<Arc<dyn Executor>> {
        match self {
            Payload::Base(_) => None,
            Payload::Fn(t) => Some(t.clone() as Arc<dyn Executor>),
            Payload::Cmd(t) => Some(t.clone() as Arc<dyn Executor>),
        }
    }
}
