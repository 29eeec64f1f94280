//! Error taxonomy for graph construction, task initialization and execution.

use std::fmt;

use failure::Fail;

/// A type mismatch between the value a task expected and the value it
/// actually received from its parent's result.
#[derive(Debug, Fail)]
#[fail(display = "wrong input type, expected {} but got {}", expected, got)]
pub struct TypeError {
    expected: &'static str,
    got: String,
}

/// Builds a [`TypeError`], mirroring the original's `reflect.Kind`-based
/// constructor without requiring runtime reflection.
pub fn type_error(expected: &'static str, got: impl fmt::Debug) -> Error {
    Error::Type(TypeError {
        expected,
        got: format!("{:?}", got),
    })
}

/// An error produced while a named task was running.
#[derive(Debug, Fail)]
#[fail(display = "{}: {}", task_name, source)]
pub struct TaskError {
    pub task_name: String,
    #[fail(cause)]
    pub source: Error,
}

/// An error raised while constructing a task or wiring it into a graph, e.g.
/// an invalid command template or an attempt to attach a graph's end node.
#[derive(Debug, Fail)]
#[fail(display = "{}", msg)]
pub struct InitError {
    msg: String,
}

impl InitError {
    pub fn new(msg: impl Into<String>) -> Self {
        InitError { msg: msg.into() }
    }

    pub fn wrap(msg: impl Into<String>, source: impl fmt::Display) -> Self {
        InitError {
            msg: format!("{}: {}", msg.into(), source),
        }
    }
}

/// A non-empty collection of errors gathered from multiple parent tasks
/// during fan-in result aggregation. Nesting is flattened: combining a
/// `MultiError` with another error (or `MultiError`) never produces a
/// `MultiError` of `MultiError`s.
#[derive(Debug, Fail, Default)]
pub struct MultiError {
    pub errors: Vec<Error>,
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "taskflow: multi-error:")?;
        if self.errors.is_empty() {
            write!(f, " no errors")?;
        }
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "\n{}:\t{}", i, err)?;
        }
        Ok(())
    }
}

/// Appends `right` onto `left`, flattening any `MultiError` operands so the
/// result never nests a `MultiError` inside another one.
pub fn append_error(left: Option<Error>, right: Option<Error>) -> Option<Error> {
    let (left, right) = match (left, right) {
        (None, right) => return right,
        (left, None) => return left,
        (Some(l), Some(r)) => (l, r),
    };

    let mut errors = Vec::new();
    match left {
        Error::Multi(m) => errors.extend(m.errors),
        other => errors.push(other),
    }
    match right {
        Error::Multi(m) => errors.extend(m.errors),
        other => errors.push(other),
    }

    Some(Error::Multi(MultiError { errors }))
}

/// The walker detected that it cannot make further progress: a join node's
/// parents will never all become done (or the graph was mutated in a way
/// that left an unreachable predecessor).
#[derive(Debug, Fail)]
#[fail(display = "taskflow: dag: broken graph")]
pub struct BrokenGraph;

/// The crate's unified error type.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Type(TypeError),
    #[fail(display = "{}", _0)]
    Task(TaskError),
    #[fail(display = "{}", _0)]
    Init(InitError),
    #[fail(display = "{}", _0)]
    Multi(MultiError),
    #[fail(display = "{}", _0)]
    BrokenGraph(BrokenGraph),
    #[fail(display = "{}", _0)]
    Io(std::io::Error),
}

impl Clone for Error {
    fn clone(&self) -> Self {
        // Errors are cloned only to be fanned out to multiple observers
        // (a result shared by several children); preserve the message
        // rather than require every variant's source to be `Clone`.
        Error::Init(InitError::new(self.to_string()))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<InitError> for Error {
    fn from(err: InitError) -> Self {
        Error::Init(err)
    }
}

impl From<BrokenGraph> for Error {
    fn from(err: BrokenGraph) -> Self {
        Error::BrokenGraph(err)
    }
}

impl Error {
    pub fn init(msg: impl Into<String>) -> Self {
        Error::Init(InitError::new(msg))
    }

    pub fn with_task_name(self, task_name: impl Into<String>) -> Self {
        Error::Task(TaskError {
            task_name: task_name.into(),
            source: self,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_error_passes_a_lone_operand_through_unchanged() {
        assert!(append_error(None, None).is_none());
        assert!(matches!(
            append_error(Some(Error::init("a")), None),
            Some(Error::Init(_))
        ));
        assert!(matches!(
            append_error(None, Some(Error::init("a"))),
            Some(Error::Init(_))
        ));
    }

    #[test]
    fn append_error_combines_two_plain_errors_into_a_multi_error() {
        let combined = append_error(Some(Error::init("a")), Some(Error::init("b"))).unwrap();
        match combined {
            Error::Multi(m) => assert_eq!(m.errors.len(), 2),
            other => panic!("expected a MultiError, got {:?}", other),
        }
    }

    #[test]
    fn append_error_flattens_rather_than_nests_multi_errors() {
        let ab = append_error(Some(Error::init("a")), Some(Error::init("b"))).unwrap();
        let abc = append_error(Some(ab), Some(Error::init("c"))).unwrap();
        match abc {
            Error::Multi(m) => assert_eq!(m.errors.len(), 3),
            other => panic!("expected a flattened MultiError, got {:?}", other),
        }
    }

    #[test]
    fn type_error_names_both_the_expected_and_actual_shape() {
        let err = type_error("string", 42);
        assert_eq!(
            err.to_string(),
            "wrong input type, expected string but got 42"
        );
    }

    #[test]
    fn with_task_name_prefixes_the_error_display() {
        let err = Error::init("boom").with_task_name("my-task");
        assert_eq!(err.to_string(), "my-task: boom");
    }

    #[test]
    fn clone_preserves_the_display_message_rather_than_the_variant() {
        let err = type_error("string", 1);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(matches!(cloned, Error::Init(_)));
    }
}
