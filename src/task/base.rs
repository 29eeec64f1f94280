use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crossbeam_channel::Receiver;

use crate::context::Context;
use crate::dag::Node;
use crate::error::{append_error, Error};

/// A task's output. A closed sum type stands in for the original's
/// `interface{}` + `reflect`-based dynamic typing: fan-in aggregation
/// builds `Seq`/`Map` of these directly instead of reflecting over element
/// types at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    /// Returned by a `Transform` closure to drop an entry from the
    /// collection being rebuilt; see [`crate::task::fn_task::Nothing`].
    Drop,
    Str(String),
    Int(i64),
    Bool(bool),
    StrList(Vec<String>),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Value::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Value::Drop)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A single task's outcome: the value it produced, if any, and whether it
/// failed. `key` is set on results produced for one entry of a fanned-out
/// collection (e.g. a map's key, or `ForEach`'s per-item static input) and
/// is empty for plain sequential results; `gather_parent_results` uses its
/// presence/absence to decide whether parents fan in as a `Map` or a `Seq`.
#[derive(Clone, Debug, Default)]
pub struct TaskResult {
    pub(crate) task_name: String,
    pub(crate) key: String,
    pub(crate) err: Option<Error>,
    pub(crate) value: Value,
}

impl TaskResult {
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }
}

/// One chunk of streamed output from a running task: either a line of text
/// or a terminal error. `Exec`'s channel ends the moment a `Piece` carrying
/// `err` is observed, or when the channel closes with no such piece.
#[derive(Debug, Clone)]
pub struct Piece {
    pub text: String,
    pub err: Option<Error>,
}

impl Piece {
    pub fn text(text: impl Into<String>) -> Self {
        Piece {
            text: text.into(),
            err: None,
        }
    }

    pub fn error(err: Error) -> Self {
        Piece {
            text: String::new(),
            err: Some(err),
        }
    }
}

/// A human-friendly name plus a handle into the graph. The minimal
/// capability every node payload has.
pub trait Joint: Send + Sync {
    fn name(&self) -> String;
    fn node(&self) -> Node;
}

/// A task whose result can be read, possibly by fanning its parents'
/// results in. Safe to call repeatedly with no side effects.
pub trait Resulter: Joint {
    fn result(&self) -> TaskResult;
}

/// A task that can actually be run. `exec` starts the task in the
/// background and returns a channel the caller drains for streamed output;
/// an `Err` return means the task could not even be started.
pub trait Executor: Resulter {
    fn exec(&self, ctx: Context) -> Result<Receiver<Piece>, Error>;
}

/// A task (or group of tasks) that can be chained with another.
pub trait Attacher: Joint {
    fn then(&self, next: Arc<dyn Attacher>) -> Arc<dyn Attacher>;
}

struct TaskState {
    description: String,
    result: Option<TaskResult>,
}

/// The state shared by every concrete task kind: a name, an anchor node in
/// the graph, and a settable result. `FnTask`/`CmdTask` each embed one of
/// these rather than inheriting from it, since Rust has no struct
/// embedding; see their `Joint`/`Resulter` impls, which simply forward
/// here.
pub struct TaskBase {
    name: String,
    anchor: Node,
    state: RwLock<TaskState>,
}

impl TaskBase {
    pub fn new(name: impl Into<String>, anchor: Node) -> Self {
        TaskBase {
            name: name.into(),
            anchor,
            state: RwLock::new(TaskState {
                description: String::new(),
                result: None,
            }),
        }
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn node(&self) -> Node {
        self.anchor.clone()
    }

    pub fn description(&self) -> String {
        self.state.read().unwrap().description.clone()
    }

    pub fn set_description(&self, desc: impl Into<String>) {
        self.state.write().unwrap().description = desc.into();
    }

    pub fn set_err(&self, err: Error) {
        let mut state = self.state.write().unwrap();
        let mut result = state.result.take().unwrap_or_else(|| TaskResult {
            task_name: self.name.clone(),
            ..Default::default()
        });
        result.err = Some(err);
        state.result = Some(result);
    }

    pub fn set_result(&self, mut result: TaskResult) {
        if result.task_name.is_empty() {
            result.task_name = self.name.clone();
        }
        self.state.write().unwrap().result = Some(result);
    }

    /// Marks the anchor node done or failed depending on the current
    /// result, and surfaces that result's error, if any.
    pub fn run(&self) -> Result<(), Error> {
        {
            let state = self.state.read().unwrap();
            if state.result.as_ref().and_then(|r| r.err.as_ref()).is_some() {
                self.anchor.mark_failed();
            } else {
                self.anchor.mark_done();
            }
        }
        match self.result().err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns this task's own result if it has run, otherwise falls back
    /// to fanning its parents' results in.
    pub fn result(&self) -> TaskResult {
        if let Some(result) = self.state.read().unwrap().result.clone() {
            return result;
        }
        gather_parent_results(&self.anchor, &self.name)
    }
}

/// A fixed result standing in for a task, used to hand a `ForEach` branch
/// its per-item input without a real upstream task producing it.
pub struct StaticResulter {
    pub name: String,
    pub res: TaskResult,
}

impl Joint for StaticResulter {
    fn name(&self) -> String {
        format!("{}-{}", self.res.task_name, self.res.key)
    }

    fn node(&self) -> Node {
        unreachable!("StaticResulter is never attached to the graph directly")
    }
}

impl Resulter for StaticResulter {
    fn result(&self) -> TaskResult {
        self.res.clone()
    }
}

/// The result of fanning two or more parents' results together.
struct CombinedResult {
    name: String,
    value: Value,
    err: Option<Error>,
}

/// Walks `anchor`'s parents and builds the `Resulter` a task should read
/// its input from:
///
/// - no parents: an empty result.
/// - exactly one parent: that parent's own result, verbatim.
/// - two or more parents: a combined result, built as a `Map` from parents
///   whose own result carries a key and as a `Seq` from parents whose
///   result does not. If both kinds of parent are present, the sequence
///   wins and the keyed entries are dropped — this mirrors a quirk of the
///   original's reflection-based aggregation (it builds a map first, then
///   unconditionally overwrites it with a non-empty slice) rather than
///   silently fixing it into different, unverified behavior.
pub(crate) fn gather_parent_results(anchor: &Node, name: &str) -> TaskResult {
    let parents = anchor.parents();

    let combined = match parents.len() {
        0 => return TaskResult::default(),
        1 => return resulter_of(&parents[0]).map(|r| r.result()).unwrap_or_default(),
        _ => {
            let mut map = BTreeMap::new();
            let mut seq = Vec::new();
            let mut err: Option<Error> = None;

            for parent in &parents {
                if let Some(r) = resulter_of(parent) {
                    let res = r.result();
                    if !res.key.is_empty() {
                        map.insert(res.key.clone(), res.value.clone());
                    } else {
                        seq.push(res.value.clone());
                    }
                    err = append_error(err, res.err.clone());
                }
            }

            let value = if !seq.is_empty() {
                Value::Seq(seq)
            } else if !map.is_empty() {
                Value::Map(map)
            } else {
                Value::Null
            };

            CombinedResult {
                name: name.to_string(),
                value,
                err,
            }
        }
    };

    TaskResult {
        task_name: combined.name,
        key: String::new(),
        err: combined.err,
        value: combined.value,
    }
}

fn resulter_of(node: &Node) -> Option<Arc<dyn Resulter>> {
    node.payload().and_then(|p| p.as_resulter())
}

/// Like [`gather_parent_results`], but returns something an `Executor` can
/// hand its closure directly: the sole parent's own `Resulter` when there
/// is exactly one, or a [`StaticResulter`] wrapping the combined result
/// otherwise.
pub(crate) fn gather_resulter(base: &TaskBase) -> Arc<dyn Resulter> {
    let parents = base.node().parents();
    if parents.len() == 1 {
        if let Some(r) = resulter_of(&parents[0]) {
            return r;
        }
    }
    let result = gather_parent_results(&base.node(), &base.name());
    Arc::new(StaticResulter {
        name: result.task_name.clone(),
        res: result,
    })
}

impl Joint for TaskBase {
    fn name(&self) -> String {
        self.name()
    }

    fn node(&self) -> Node {
        self.node()
    }
}

impl Resulter for TaskBase {
    fn result(&self) -> TaskResult {
        self.result()
    }
}

/// Shared `Attacher::then` body: every concrete task kind chains the same
/// way, by splicing `next`'s node in after its own anchor.
pub(crate) fn attach_then(anchor: &Node, next: Arc<dyn Attacher>) -> Arc<dyn Attacher> {
    anchor
        .after(&next.node())
        .expect("taskflow: invalid task chain");
    next
}
