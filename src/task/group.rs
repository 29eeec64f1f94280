use std::sync::Arc;

use crate::dag::Node;
use crate::error::Error;
use crate::iterator::Iterator;

use super::base::{Attacher, Joint};

/// A named sequence of tasks, chained `beginning -> task[0] -> ... ->
/// task[n] -> end` and itself usable as a single `Attacher`/`Joint`
/// wherever a task can appear.
pub struct GroupTask {
    name: String,
    beginning: Arc<dyn Attacher>,
    end: Arc<dyn Attacher>,
}

impl GroupTask {
    pub(crate) fn from_parts(
        name: impl Into<String>,
        beginning: Arc<dyn Attacher>,
        end: Arc<dyn Attacher>,
    ) -> Arc<GroupTask> {
        Arc::new(GroupTask {
            name: name.into(),
            beginning,
            end,
        })
    }

    /// The group's first node, usable to attach tasks directly after it
    /// rather than via the constructor's `tasks` list.
    pub fn beginning(&self) -> Arc<dyn Attacher> {
        self.beginning.clone()
    }

    /// The group's last node.
    pub fn end(&self) -> Arc<dyn Attacher> {
        self.end.clone()
    }

    /// Starts a walk over this group's tasks.
    pub fn iter(&self) -> Result<Iterator, Error> {
        Iterator::new(self.beginning.node())
    }
}

impl Joint for GroupTask {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn node(&self) -> Node {
        self.beginning.node()
    }
}

impl Attacher for GroupTask {
    fn then(&self, next: Arc<dyn Attacher>) -> Arc<dyn Attacher> {
        self.end.then(next)
    }
}

/// Chains `tasks` one after another between a fresh beginning and end,
/// naming the whole sequence `name`.
pub fn group(name: impl Into<String>, tasks: Vec<Arc<dyn Attacher>>) -> Arc<GroupTask> {
    let name = name.into();
    let (anchor_beginning, anchor_end) = Node::new_pair();

    let b = Arc::new(super::base::TaskBase::new(name.clone(), anchor_beginning.clone()));
    let e = Arc::new(super::base::TaskBase::new(
        format!("{}-end", name),
        anchor_end.clone(),
    ));
    anchor_beginning.set_payload(super::payload::Payload::Base(b.clone()));
    anchor_end.set_payload(super::payload::Payload::Base(e.clone()));

    let mut previous = anchor_beginning.clone();
    for task in tasks {
        task.node()
            .between(&previous, &anchor_end)
            .expect("taskflow: invalid task chain");
        previous = task.node();
    }

    GroupTask::from_parts(name, b as Arc<dyn Attacher>, e as Arc<dyn Attacher>)
}
