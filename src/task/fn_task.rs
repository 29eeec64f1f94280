use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Receiver};

use crate::context::Context;
use crate::dag::Node;
use crate::error::{type_error, Error};

use super::base::{
    attach_then, gather_resulter, Attacher, Executor, Joint, Piece, Resulter, StaticResulter,
    TaskBase, TaskResult, Value,
};
use super::payload::Payload;

/// A closure run as a task: given the context, a writer for streamed
/// progress text and the fanned-in result of its parents, produces a new
/// value. Mirrors `FnClosure` in the original, with the `(ret, err)` pair
/// folded into a single `Result`.
pub type FnClosure =
    Arc<dyn Fn(&Context, &mut dyn Write, &dyn Resulter) -> Result<Value, Error> + Send + Sync>;

/// A closure that only wants to look at a `Value::Str` input; anything
/// else is rejected with a type error before the closure ever runs.
pub type StringClosureFn =
    Arc<dyn Fn(&Context, &mut dyn Write, &str) -> Result<Value, Error> + Send + Sync>;

/// A closure that only wants to look at a `Value::StrList` input.
pub type StringSliceClosureFn =
    Arc<dyn Fn(&Context, &mut dyn Write, &[String]) -> Result<Value, Error> + Send + Sync>;

/// Wraps a string-only closure with the type check the original's
/// `StringClosure` performs via `reflect`.
pub fn string_closure(f: StringClosureFn) -> FnClosure {
    Arc::new(move |ctx, w, res| match res.result().value() {
        Value::Str(s) => f(ctx, w, s),
        other => Err(type_error("string", other.clone())),
    })
}

/// Wraps a string-slice-only closure with the same kind of type check.
pub fn string_slice_closure(f: StringSliceClosureFn) -> FnClosure {
    Arc::new(move |ctx, w, res| match res.result().value() {
        Value::StrList(s) => f(ctx, w, s),
        other => Err(type_error("[]string", other.clone())),
    })
}

/// Sentinel value a `Transform` closure returns to drop an entry from the
/// collection being rebuilt, standing in for the original's singleton
/// `*transformKey`.
pub fn nothing() -> Value {
    Value::Drop
}

/// A task that runs an arbitrary closure, streaming anything it writes to
/// its writer as progress output.
pub struct FnTask {
    base: Arc<TaskBase>,
    closure: FnClosure,
    previous_resulter: Mutex<Option<Arc<dyn Resulter>>>,
}

impl FnTask {
    fn build(base: Arc<TaskBase>, anchor: Node, closure: FnClosure) -> Arc<FnTask> {
        let task = Arc::new(FnTask {
            base,
            closure,
            previous_resulter: Mutex::new(None),
        });
        anchor.set_payload(Payload::Fn(task.clone()));
        task
    }
}

/// Builds a named closure task.
pub fn r#fn(name: impl Into<String>, closure: FnClosure) -> Arc<FnTask> {
    let anchor = Node::empty();
    let base = Arc::new(TaskBase::new(name, anchor.clone()));
    FnTask::build(base, anchor, closure)
}

/// Builds a closure task anchored to a node the caller already created
/// (and already wired into a graph), rather than a fresh standalone one.
/// Used by `ForEach`, whose beginning/end are the two ends of a `Node`
/// pair it needs to splice new branches into as it runs.
pub(crate) fn attach_to(anchor: Node, name: impl Into<String>, closure: FnClosure) -> Arc<FnTask> {
    let base = Arc::new(TaskBase::new(name, anchor.clone()));
    FnTask::build(base, anchor, closure)
}

/// Rebuilds a sequence or map, one `Transform` call per entry, dropping any
/// entry for which `filter` returns [`nothing`].
pub fn transform(name: impl Into<String>, filter: FnClosure) -> Arc<FnTask> {
    let name = name.into();
    let name_for_closure = name.clone();
    r#fn(
        name,
        Arc::new(move |ctx, w, res| {
            let value = res.result().value().clone();
            match value {
                Value::Null => Ok(Value::Null),
                Value::Seq(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        let entry = StaticResulter {
                            name: name_for_closure.clone(),
                            res: TaskResult {
                                task_name: name_for_closure.clone(),
                                key: i.to_string(),
                                err: None,
                                value: item,
                            },
                        };
                        let got = filter(ctx, w, &entry)?;
                        if !got.is_drop() {
                            out.push(got);
                        }
                    }
                    Ok(Value::Seq(out))
                }
                Value::Map(map) => {
                    let mut out = BTreeMap::new();
                    for (key, item) in map.into_iter() {
                        let entry = StaticResulter {
                            name: name_for_closure.clone(),
                            res: TaskResult {
                                task_name: name_for_closure.clone(),
                                key: key.clone(),
                                err: None,
                                value: item,
                            },
                        };
                        let got = filter(ctx, w, &entry)?;
                        if !got.is_drop() {
                            out.insert(key, got);
                        }
                    }
                    Ok(Value::Map(out))
                }
                other => Err(Error::init(format!(
                    "taskflow: transform: unsupported value: {:?}",
                    other
                ))),
            }
        }),
    )
}

/// Removes entries from a sequence or map: entries equal to one of
/// `values`'s values (for a `Seq`) or keyed by one of `keys`'s strings
/// (for a `Map`) are dropped.
pub fn without(value: Value) -> Arc<FnTask> {
    match value {
        Value::Seq(values) => transform(
            "without",
            Arc::new(move |_ctx, _w, res| {
                let v = res.result().value().clone();
                if values.contains(&v) {
                    Ok(nothing())
                } else {
                    Ok(v)
                }
            }),
        ),
        Value::StrList(keys) => transform(
            "without",
            Arc::new(move |_ctx, _w, res| {
                let res = res.result();
                if keys.iter().any(|k| k == res.key()) {
                    Ok(nothing())
                } else {
                    Ok(res.value().clone())
                }
            }),
        ),
        other => transform(
            "without",
            Arc::new(move |_ctx, _w, _res| {
                Err(Error::init(format!(
                    "taskflow: without: unsupported value: {:?}",
                    other
                )))
            }),
        ),
    }
}

/// Reads a YAML/JSON file named by its input value and unmarshals it.
/// Out of scope for this crate (no YAML/JSON dependency is carried); kept
/// as a named, explicitly failing stub so the external interface this
/// crate exposes still has a slot for it.
pub fn unmarshal_file() -> Arc<FnTask> {
    r#fn(
        "unmarshal-file",
        Arc::new(|_ctx, _w, _res| {
            Err(Error::init(
                "taskflow: unmarshal-file is not implemented by this crate",
            ))
        }),
    )
}

impl Joint for FnTask {
    fn name(&self) -> String {
        self.base.name()
    }

    fn node(&self) -> Node {
        self.base.node()
    }
}

impl Resulter for FnTask {
    fn result(&self) -> TaskResult {
        self.base.result()
    }
}

impl Attacher for FnTask {
    fn then(&self, next: Arc<dyn Attacher>) -> Arc<dyn Attacher> {
        attach_then(&self.base.node(), next)
    }
}

impl Executor for FnTask {
    fn exec(&self, ctx: Context) -> Result<Receiver<Piece>, Error> {
        if ctx.is_cancelled() {
            let err = Error::init("taskflow: fn: context already cancelled");
            self.base.set_err(err.clone());
            return Err(err);
        }

        log::debug!("taskflow: fn: {}: running", self.base.name());
        let previous = {
            let mut cached = self.previous_resulter.lock().unwrap();
            if cached.is_none() {
                *cached = Some(gather_resulter(&self.base));
            }
            cached.clone().unwrap()
        };

        let (reader, mut writer) = os_pipe::pipe()?;
        let (out_tx, out_rx) = bounded(0);

        let closure = self.closure.clone();
        let base = self.base.clone();
        let out_tx_worker = out_tx.clone();
        let task_name = self.base.name();

        // One thread runs the closure, writing any progress text into the
        // pipe; the other scans that pipe and forwards lines to the
        // caller, then waits for the closure to finish to record the
        // task's result. This mirrors the original's two-goroutine split
        // (`fn.go`'s `Exec`), synchronized there by a `done` channel and
        // here by joining the worker thread.
        let worker = thread::spawn(move || {
            let previous_key = previous.result().key().to_string();
            match closure(&ctx, &mut writer, previous.as_ref()) {
                Ok(value) => {
                    drop(writer);
                    (previous_key, value, None)
                }
                Err(err) => {
                    log::warn!("taskflow: fn: {}: {}", task_name, err);
                    let _ = out_tx_worker.send(Piece::error(err.clone()));
                    drop(writer);
                    (previous_key, Value::Null, Some(err))
                }
            }
        });

        thread::spawn(move || {
            let mut lines = BufReader::new(reader).lines();
            while let Some(Ok(line)) = lines.next() {
                if out_tx.send(Piece::text(line)).is_err() {
                    break;
                }
            }

            let (key, value, closure_err) = match worker.join() {
                Ok(r) => r,
                Err(_) => (
                    String::new(),
                    Value::Null,
                    Some(Error::init("taskflow: fn task panicked")),
                ),
            };

            base.set_result(TaskResult {
                task_name: base.name(),
                key,
                err: closure_err,
                value,
            });

            if let Err(err) = base.run() {
                let _ = out_tx.send(Piece::error(err));
            }
        });

        Ok(out_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::group::group;
    use crate::test_support::run;

    fn seq(items: Vec<Value>) -> Value {
        Value::Seq(items)
    }

    fn lowercase_filter() -> FnClosure {
        Arc::new(|_ctx, _w, res| match res.result().value() {
            Value::Str(s) if s.to_lowercase() == *s => Ok(Value::Str(s.clone())),
            Value::Str(_) => Ok(nothing()),
            other => Err(type_error("string", other.clone())),
        })
    }

    #[test]
    fn runs_its_closure_and_streams_what_it_writes() {
        let task = r#fn(
            "greet",
            Arc::new(|_ctx, w, _res| {
                writeln!(w, "hello").unwrap();
                Ok(Value::Str("done".into()))
            }),
        );
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);
        run(&*g).unwrap();

        assert_eq!(task.result().value(), &Value::Str("done".into()));
        assert!(task.result().err().is_none());
    }

    #[test]
    fn transform_keeps_only_the_lowercase_entries_of_a_sequence() {
        let stub = r#fn(
            "stub",
            Arc::new(|_ctx, _w, _res| {
                Ok(seq(vec![
                    Value::Str("A".into()),
                    Value::Str("B".into()),
                    Value::Str("c".into()),
                    Value::Str("d".into()),
                ]))
            }),
        );
        let lower = transform("lowercase", lowercase_filter());
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                lower.clone() as Arc<dyn Attacher>,
            ],
        );
        run(&*g).unwrap();

        assert_eq!(
            lower.result().value(),
            &seq(vec![Value::Str("c".into()), Value::Str("d".into())])
        );
    }

    #[test]
    fn transform_keeps_only_the_lowercase_entries_of_a_map_and_preserves_keys() {
        let stub = r#fn(
            "stub",
            Arc::new(|_ctx, _w, _res| {
                let mut map = BTreeMap::new();
                map.insert("1".to_string(), Value::Str("A".into()));
                map.insert("2".to_string(), Value::Str("B".into()));
                map.insert("3".to_string(), Value::Str("c".into()));
                map.insert("4".to_string(), Value::Str("d".into()));
                Ok(Value::Map(map))
            }),
        );
        let lower = transform("lowercase", lowercase_filter());
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                lower.clone() as Arc<dyn Attacher>,
            ],
        );
        run(&*g).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("3".to_string(), Value::Str("c".into()));
        expected.insert("4".to_string(), Value::Str("d".into()));
        assert_eq!(lower.result().value(), &Value::Map(expected));
    }

    #[test]
    fn without_removes_matching_entries_from_a_sequence() {
        let stub = r#fn(
            "stub",
            Arc::new(|_ctx, _w, _res| {
                Ok(seq(vec![
                    Value::Str("A".into()),
                    Value::Str("B".into()),
                    Value::Str("c".into()),
                    Value::Str("d".into()),
                ]))
            }),
        );
        let filtered = without(Value::Seq(vec![
            Value::Str("c".into()),
            Value::Str("d".into()),
        ]));
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                filtered.clone() as Arc<dyn Attacher>,
            ],
        );
        run(&*g).unwrap();

        assert_eq!(
            filtered.result().value(),
            &seq(vec![Value::Str("A".into()), Value::Str("B".into())])
        );
    }

    #[test]
    fn without_removes_entries_by_value_from_a_map() {
        let stub = r#fn(
            "stub",
            Arc::new(|_ctx, _w, _res| {
                let mut map = BTreeMap::new();
                map.insert("a".to_string(), Value::Int(1));
                map.insert("b".to_string(), Value::Int(2));
                map.insert("c".to_string(), Value::Int(3));
                map.insert("d".to_string(), Value::Int(4));
                Ok(Value::Map(map))
            }),
        );
        let filtered = without(Value::Seq(vec![Value::Int(2), Value::Int(4)]));
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                filtered.clone() as Arc<dyn Attacher>,
            ],
        );
        run(&*g).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Int(1));
        expected.insert("c".to_string(), Value::Int(3));
        assert_eq!(filtered.result().value(), &Value::Map(expected));
    }

    #[test]
    fn without_removes_entries_by_key_from_a_map() {
        let stub = r#fn(
            "stub",
            Arc::new(|_ctx, _w, _res| {
                let mut map = BTreeMap::new();
                map.insert("a".to_string(), Value::Int(1));
                map.insert("b".to_string(), Value::Int(2));
                map.insert("c".to_string(), Value::Int(3));
                map.insert("d".to_string(), Value::Int(4));
                Ok(Value::Map(map))
            }),
        );
        let filtered = without(Value::StrList(vec!["a".into(), "b".into()]));
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                filtered.clone() as Arc<dyn Attacher>,
            ],
        );
        run(&*g).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("c".to_string(), Value::Int(3));
        expected.insert("d".to_string(), Value::Int(4));
        assert_eq!(filtered.result().value(), &Value::Map(expected));
    }

    #[test]
    fn string_closure_rejects_a_non_string_input() {
        let stub = r#fn("stub", Arc::new(|_ctx, _w, _res| Ok(Value::Int(1))));
        let typed = r#fn(
            "typed",
            string_closure(Arc::new(|_ctx, _w, _s| Ok(Value::Null))),
        );
        let g = group(
            "g",
            vec![
                stub.clone() as Arc<dyn Attacher>,
                typed.clone() as Arc<dyn Attacher>,
            ],
        );

        assert!(run(&*g).is_err());
        assert!(typed.result().err().is_some());
    }

    #[test]
    fn unmarshal_file_is_an_explicit_unimplemented_stub() {
        let task = unmarshal_file();
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);
        assert!(run(&*g).is_err());
        assert!(task.result().err().is_some());
    }

    #[test]
    fn exec_fails_synchronously_against_an_already_cancelled_context() {
        let task = r#fn("stub", Arc::new(|_ctx, _w, _res| Ok(Value::Null)));
        let ctx = Context::new();
        ctx.cancel();

        assert!(task.exec(ctx).is_err());
        assert!(task.result().err().is_some());
    }
}
