//! A deliberately small stand-in for the original's `[[...]]`-delimited
//! `html/template` rendering.
//!
//! Only one placeholder is understood: `[[.Result]]` and `[[.Result.Value]]`,
//! both of which render the fanned-in parent result's value as a string.
//! Anything else between `[[` and `]]`, or an unterminated `[[`, is an
//! initialization-time error — this crate's external interface promises
//! the `[[...]]` syntax exists, not that it implements `text/template`.

use crate::error::{Error, InitError};
use crate::task::Value;

/// Walks `input`'s `[[...]]` placeholders, calling `on_field` with the
/// trimmed contents of each one and splicing its return value into the
/// output in place. Shared by [`validate`] (which never needs a real
/// [`Value`] to check a template's syntax) and [`render`] (which does).
fn scan(input: &str, mut on_field: impl FnMut(&str) -> Result<String, Error>) -> Result<String, Error> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("]]").ok_or_else(|| {
            InitError::new(format!(
                "taskflow: command template ({}): unterminated '[['",
                input
            ))
        })?;
        let field = after[..end].trim();
        out.push_str(&on_field(field)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Checks that `input`'s `[[...]]` placeholders, if any, are well-formed and
/// reference only the fields this crate's minimal template understands --
/// without needing a [`Value`] to substitute in. Called eagerly by
/// [`crate::task::cmd`] at construction, so a malformed command template is
/// an initialization fault rather than something discovered only once the
/// task is run.
pub fn validate(input: &str) -> Result<(), Error> {
    scan(input, |field| match field {
        ".Result" | ".Result.Value" => Ok(String::new()),
        other => Err(InitError::new(format!(
            "taskflow: command template ({}): unknown placeholder {:?}",
            input, other
        ))
        .into()),
    })
    .map(|_| ())
}

/// Renders `input`'s `[[...]]` placeholders against `value`.
pub fn render(input: &str, value: &Value) -> Result<String, Error> {
    scan(input, |field| match field {
        ".Result" | ".Result.Value" => Ok(render_value(value)),
        other => Err(InitError::new(format!(
            "taskflow: command template ({}): unknown placeholder {:?}",
            input, other
        ))
        .into()),
    })
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Drop => String::new(),
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::StrList(items) => items.join(" "),
        Value::Seq(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Map(map) => map
            .values()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_text() {
        assert_eq!(render("echo hi", &Value::Null).unwrap(), "echo hi");
    }

    #[test]
    fn renders_result_placeholder() {
        let v = Value::Str("foo.txt".into());
        assert_eq!(
            render("cat [[.Result.Value]]", &v).unwrap(),
            "cat foo.txt"
        );
        assert_eq!(render("cat [[.Result]]", &v).unwrap(), "cat foo.txt");
    }

    #[test]
    fn rejects_unknown_field() {
        assert!(render("echo [[.Bogus]]", &Value::Null).is_err());
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        assert!(render("echo [[.Result", &Value::Null).is_err());
    }

    #[test]
    fn validate_accepts_known_placeholders_without_a_value() {
        assert!(validate("cat [[.Result.Value]]").is_ok());
        assert!(validate("echo plain").is_ok());
    }

    #[test]
    fn validate_rejects_the_same_malformed_templates_as_render() {
        assert!(validate("echo [[.Bogus]]").is_err());
        assert!(validate("echo [[.Result").is_err());
    }
}
