use std::io::Write;
use std::sync::Arc;

use crate::context::Context;
use crate::dag::Node;
use crate::error::Error;

use super::base::{Attacher, Resulter, TaskBase, TaskResult, Value};
use super::fn_task::attach_to;
use super::group::GroupTask;
use super::payload::Payload;

/// Given the key a `ForEach` branch is running for (a 1-based "i/len" for a
/// sequence entry, or the original map key), produces the attachable that
/// should run for that entry.
pub type ForEachFactory = Arc<dyn Fn(String) -> Arc<dyn Attacher> + Send + Sync>;

/// A fixed result standing in for a single `ForEach` entry: a `Hidden` node
/// that is never executed, only read from, so the per-entry branch has
/// something to fan its result in from.
fn static_input(label: impl Into<String>, result: TaskResult) -> Node {
    let anchor = Node::hidden();
    let base = Arc::new(TaskBase::new(label, anchor.clone()));
    base.set_result(result);
    anchor.set_payload(Payload::Base(base));
    anchor
}

/// Dynamically fans a sequence or mapping out into one subgraph branch per
/// entry, gathered back into a homogeneous sequence (or mapping) by the
/// group's end task. `factory` is asked for the attachable to run for each
/// entry, keyed by a 1-based `"i/len"` string for a sequence entry or by the
/// entry's own key for a mapping; `None` runs nothing (the group's end then
/// simply passes its own empty result through).
///
/// New nodes are spliced in only between the group's own beginning and end
/// boundary, both of which the walker has not yet visited at the point this
/// closure runs — see `DESIGN.md` for why that makes the splice safe.
pub fn for_each(name: impl Into<String>, factory: Option<ForEachFactory>) -> Arc<GroupTask> {
    let name = name.into();
    let group_name = format!("for-each({})", name);

    let (anchor_beginning, anchor_end) = Node::new_pair();

    let begin_anchor = anchor_beginning.clone();
    let begin_end = anchor_end.clone();
    let begin_task_name = group_name.clone();

    let beginning = attach_to(
        anchor_beginning.clone(),
        group_name.clone(),
        Arc::new(move |_ctx: &Context, _w: &mut dyn Write, res: &dyn Resulter| {
            let factory = match &factory {
                Some(f) => f.clone(),
                None => return Ok(Value::Null),
            };

            let add = |key: String, result: TaskResult| -> Result<(), Error> {
                let static_node = static_input(format!("{}-static-input", key), result);
                static_node.between(&begin_anchor, &begin_end)?;
                factory(key).node().between(&static_node, &begin_end)?;
                Ok(())
            };

            match res.result().value().clone() {
                Value::Null => {}
                Value::Seq(items) => {
                    let len = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        add(
                            format!("{}/{}", i + 1, len),
                            TaskResult {
                                task_name: begin_task_name.clone(),
                                key: String::new(),
                                err: None,
                                value: item,
                            },
                        )?;
                    }
                }
                Value::Map(map) => {
                    for (key, item) in map.into_iter() {
                        add(
                            key.clone(),
                            TaskResult {
                                task_name: begin_task_name.clone(),
                                key,
                                err: None,
                                value: item,
                            },
                        )?;
                    }
                }
                other => {
                    return Err(Error::init(format!(
                        "taskflow: for-each: unexpected type: {:?}",
                        other
                    )))
                }
            }

            Ok(Value::Null)
        }),
    );

    let end = attach_to(
        anchor_end.clone(),
        format!("{}-gather-slice", group_name),
        Arc::new(|_ctx: &Context, _w: &mut dyn Write, res: &dyn Resulter| {
            Ok(res.result().value().clone())
        }),
    );

    GroupTask::from_parts(
        group_name,
        beginning as Arc<dyn Attacher>,
        end as Arc<dyn Attacher>,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::type_error;
    use crate::task::cmd_task::cmd;
    use crate::task::fn_task::r#fn;
    use crate::task::group::group;
    use crate::test_support::run;

    #[test]
    fn a_null_input_runs_nothing_and_the_chain_continues() {
        let stub = r#fn("create-nothing", Arc::new(|_ctx, _w, _res| Ok(Value::Null)));
        let after = r#fn(
            "after-empty-foreach",
            Arc::new(|_ctx, _w, _res| Ok(Value::Str("ran".into()))),
        );

        let g = group("test-foreach-nil", vec![]);
        g.beginning()
            .then(stub.clone() as Arc<dyn Attacher>)
            .then(for_each("print", None) as Arc<dyn Attacher>)
            .then(after.clone() as Arc<dyn Attacher>);

        run(&*g).unwrap();
        assert_eq!(after.result().value(), &Value::Str("ran".into()));
    }

    #[test]
    fn fans_a_sequence_out_into_one_branch_per_entry_and_gathers_a_sequence_back() {
        let stub = r#fn(
            "create-slice",
            Arc::new(|_ctx, _w, _res| {
                Ok(Value::Seq(vec![
                    Value::Str("A".into()),
                    Value::Str("B".into()),
                    Value::Str("C".into()),
                ]))
            }),
        );

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_for_factory = seen.clone();
        let factory: ForEachFactory = Arc::new(move |key: String| {
            seen_for_factory.lock().unwrap().push(key.clone());
            cmd("echo", vec!["echo".into(), key]) as Arc<dyn Attacher>
        });

        let collect = r#fn(
            "collect",
            Arc::new(|_ctx, _w, res| Ok(res.result().value().clone())),
        );

        let g = group("test-foreach-slice", vec![]);
        g.beginning()
            .then(stub.clone() as Arc<dyn Attacher>)
            .then(for_each("print", Some(factory)) as Arc<dyn Attacher>)
            .then(collect.clone() as Arc<dyn Attacher>);

        run(&*g).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["1/3".to_string(), "2/3".to_string(), "3/3".to_string()]
        );
        match collect.result().value() {
            Value::Seq(items) => assert_eq!(items.len(), 3),
            other => panic!("expected a gathered sequence, got {:?}", other),
        }
    }

    #[test]
    fn fans_a_map_out_into_one_branch_per_entry_and_gathers_a_map_back() {
        let stub = r#fn(
            "create-map",
            Arc::new(|_ctx, _w, _res| {
                let mut map = BTreeMap::new();
                map.insert("A".to_string(), Value::Int(1));
                map.insert("B".to_string(), Value::Int(2));
                map.insert("C".to_string(), Value::Int(3));
                Ok(Value::Map(map))
            }),
        );

        let factory: ForEachFactory = Arc::new(|_key: String| {
            r#fn(
                "double",
                Arc::new(|_ctx, _w, res| match res.result().value() {
                    Value::Int(n) => Ok(Value::Str((n * 2).to_string())),
                    other => Err(type_error("int", other.clone())),
                }),
            ) as Arc<dyn Attacher>
        });

        let collect = r#fn(
            "result",
            Arc::new(|_ctx, _w, res| Ok(res.result().value().clone())),
        );

        let g = group("test-foreach-map", vec![]);
        g.beginning()
            .then(stub.clone() as Arc<dyn Attacher>)
            .then(for_each("double", Some(factory)) as Arc<dyn Attacher>)
            .then(collect.clone() as Arc<dyn Attacher>);

        run(&*g).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("A".to_string(), Value::Str("2".into()));
        expected.insert("B".to_string(), Value::Str("4".into()));
        expected.insert("C".to_string(), Value::Str("6".into()));
        assert_eq!(collect.result().value(), &Value::Map(expected));
    }
}
