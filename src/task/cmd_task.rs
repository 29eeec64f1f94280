use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

use crate::context::Context;
use crate::dag::Node;
use crate::error::{Error, InitError};
use crate::template;

use super::base::{
    attach_then, gather_resulter, Attacher, Executor, Joint, Piece, Resulter, TaskBase, TaskResult,
    Value,
};
use super::payload::Payload;

/// What a `CmdTask` needs in order to actually spawn a process, built fresh
/// (by rendering the command templates against the fanned-in parent
/// result) on every call to `exec`.
struct ProcessSpec {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    extra_env: Vec<(String, String)>,
}

type BuildFn = dyn Fn(&dyn Resulter) -> Result<ProcessSpec, Error> + Send + Sync;

/// A task that executes a locally available program, whose command-line
/// arguments may reference the fanned-in parent result via `[[.Result]]`.
pub struct CmdTask {
    base: Arc<TaskBase>,
    build: Box<BuildFn>,
}

fn new_cmd_task(name: String, build: Box<BuildFn>) -> Arc<CmdTask> {
    let anchor = Node::empty();
    let base = Arc::new(TaskBase::new(name, anchor.clone()));
    let task = Arc::new(CmdTask { base, build });
    anchor.set_payload(Payload::Cmd(task.clone()));
    task
}

/// Builds a command task from a name and at least one command-line
/// element (the program, then its arguments). Each element is treated as a
/// template understood by [`crate::template::render`].
///
/// Panics if `commands` is empty, or if any element's template is malformed
/// (an unterminated `[[` or a field this crate's minimal template syntax
/// doesn't understand): a command with nothing to run, or one that could
/// never render, is a construction-time mistake, not a runtime condition,
/// matching the original's panic-based `InitError` for both cases.
pub fn cmd(name: impl Into<String>, commands: Vec<String>) -> Arc<CmdTask> {
    if commands.is_empty() {
        panic!("{}", InitError::new("command is mandatory"));
    }
    for command in &commands {
        if let Err(err) = template::validate(command) {
            panic!("{}", err);
        }
    }
    let name = name.into();
    new_cmd_task(
        name,
        Box::new(move |res: &dyn Resulter| {
            let value = res.result().value().clone();
            let mut rendered = Vec::with_capacity(commands.len());
            for command in &commands {
                rendered.push(template::render(command, &value)?);
            }
            Ok(ProcessSpec {
                program: rendered[0].clone(),
                args: rendered[1..].to_vec(),
                dir: None,
                extra_env: Vec::new(),
            })
        }),
    )
}

/// Wraps `wrapped` so the resulting process runs with its working
/// directory set to `dir`.
pub fn dir(wrapped: Arc<CmdTask>, dir: impl Into<PathBuf>) -> Arc<CmdTask> {
    let dir = dir.into();
    let name = format!("dir({})", wrapped.name());
    new_cmd_task(
        name,
        Box::new(move |res: &dyn Resulter| {
            let mut spec = (wrapped.build)(res)?;
            spec.dir = Some(dir.clone());
            Ok(spec)
        }),
    )
}

/// Wraps `wrapped` so the resulting process runs with `vars` appended to
/// its environment.
pub fn env(wrapped: Arc<CmdTask>, vars: Vec<(String, String)>) -> Arc<CmdTask> {
    let name = format!("env({})", wrapped.name());
    new_cmd_task(
        name,
        Box::new(move |res: &dyn Resulter| {
            let mut spec = (wrapped.build)(res)?;
            spec.extra_env.extend(vars.clone());
            Ok(spec)
        }),
    )
}

/// `mkdir -p dir` as a command task.
pub fn make_dir(dir: impl Into<String>) -> Arc<CmdTask> {
    cmd("mkdir", vec!["mkdir".into(), "-p".into(), dir.into()])
}

/// `rm -rf dir` as a command task.
pub fn remove_dir(dir: impl Into<String>) -> Arc<CmdTask> {
    cmd("rmdir", vec!["rm".into(), "-rf".into(), dir.into()])
}

impl Joint for CmdTask {
    fn name(&self) -> String {
        self.base.name()
    }

    fn node(&self) -> Node {
        self.base.node()
    }
}

impl Resulter for CmdTask {
    fn result(&self) -> TaskResult {
        self.base.result()
    }
}

impl Attacher for CmdTask {
    fn then(&self, next: Arc<dyn Attacher>) -> Arc<dyn Attacher> {
        attach_then(&self.base.node(), next)
    }
}

impl Executor for CmdTask {
    fn exec(&self, ctx: Context) -> Result<Receiver<Piece>, Error> {
        if ctx.is_cancelled() {
            let err = Error::init("taskflow: cmd: context already cancelled");
            self.base.set_err(err.clone());
            return Err(err);
        }

        let previous = gather_resulter(&self.base);
        let previous_key = previous.result().key().to_string();
        let spec = (self.build)(previous.as_ref())?;

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.dir {
            command.current_dir(dir);
        }
        for (k, v) in &spec.extra_env {
            command.env(k, v);
        }
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        log::debug!(
            "taskflow: cmd: {}: spawning {} {:?}",
            self.base.name(),
            spec.program,
            spec.args
        );

        let mut child = command.spawn().map_err(|err| {
            let err: Error = err.into();
            log::warn!("taskflow: cmd: {}: spawn failed: {}", self.base.name(), err);
            self.base.set_err(err.clone());
            err
        })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let child: Arc<Mutex<Child>> = Arc::new(Mutex::new(child));

        let (out_tx, out_rx) = bounded(0);
        let base = self.base.clone();

        let watcher_child = child.clone();
        let watcher_ctx = ctx.clone();
        thread::spawn(move || loop {
            if watcher_ctx.is_cancelled() {
                let _ = watcher_child.lock().unwrap().kill();
                return;
            }
            // Exits promptly once the process it is watching is reaped by
            // the main exec thread below; there is no join handle here
            // since that thread owns the `Child` for `wait()`. That thread
            // holds the only other clone of this `Arc`, so once it drops
            // its clone (right after `wait()` returns) this is the last
            // one left.
            if Arc::strong_count(&watcher_child) <= 1 {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        });

        thread::spawn(move || {
            let mut stdout_lines = Vec::new();

            for line in BufReader::new(stdout).lines().flatten() {
                stdout_lines.push(line.clone());
                if out_tx.send(Piece::text(line)).is_err() {
                    break;
                }
            }
            for line in BufReader::new(stderr).lines().flatten() {
                if out_tx.send(Piece::text(line)).is_err() {
                    break;
                }
            }

            let wait_result = child.lock().unwrap().wait();
            match wait_result {
                Ok(status) if status.success() => {
                    base.set_result(TaskResult {
                        task_name: base.name(),
                        key: previous_key,
                        err: None,
                        value: Value::StrList(stdout_lines),
                    });
                }
                Ok(status) => {
                    let err = Error::init(format!("command exited with {}", status));
                    log::warn!("taskflow: cmd: {}: {}", base.name(), err);
                    let _ = out_tx.send(Piece::error(err.clone()));
                    base.set_err(err);
                }
                Err(err) => {
                    let err: Error = err.into();
                    log::warn!("taskflow: cmd: {}: wait failed: {}", base.name(), err);
                    let _ = out_tx.send(Piece::error(err.clone()));
                    base.set_err(err);
                }
            }

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

    #[test]
    fn runs_a_command_and_collects_its_stdout_lines() {
        let task = cmd("echo", vec!["echo".into(), "hello".into()]);
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);
        run(&*g).unwrap();

        let result = task.result();
        assert_eq!(result.value(), &Value::StrList(vec!["hello".to_string()]));
        assert!(result.err().is_none());
    }

    #[test]
    fn a_nonzero_exit_is_reported_as_the_tasks_error() {
        let task = cmd("false", vec!["false".into()]);
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);

        assert!(run(&*g).is_err());
        assert!(task.result().err().is_some());
    }

    #[test]
    #[should_panic]
    fn rejects_an_empty_command() {
        cmd("command", vec![]);
    }

    #[test]
    #[should_panic]
    fn rejects_a_malformed_template() {
        cmd("echo", vec!["echo".into(), "[[.Result".into()]);
    }

    #[test]
    fn dir_runs_the_process_in_the_given_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let task = dir(cmd("pwd", vec!["pwd".into()]), tmp.path());
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);
        run(&*g).unwrap();

        let lines = task.result().value().as_str_list().unwrap().to_vec();
        assert_eq!(lines.len(), 1);
        let got = std::path::Path::new(lines[0].trim()).canonicalize().unwrap();
        let want = tmp.path().canonicalize().unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn env_adds_to_the_spawned_process_environment() {
        let task = env(
            cmd(
                "printenv",
                vec!["printenv".into(), "TASKFLOW_TEST_VAR".into()],
            ),
            vec![("TASKFLOW_TEST_VAR".into(), "hello-env".into())],
        );
        let g = group("g", vec![task.clone() as Arc<dyn Attacher>]);
        run(&*g).unwrap();

        assert_eq!(
            task.result().value(),
            &Value::StrList(vec!["hello-env".to_string()])
        );
    }

    #[test]
    fn exec_fails_synchronously_against_an_already_cancelled_context() {
        let task = cmd("echo", vec!["echo".into(), "hello".into()]);
        let ctx = Context::new();
        ctx.cancel();

        assert!(task.exec(ctx).is_err());
        assert!(task.result().err().is_some());
    }
}
