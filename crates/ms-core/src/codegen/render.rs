//! Value-to-source rendering for field initializers.
//!
//! Only values the declaration parser can read back are rendered: `null`,
//! booleans, integers, floats, single-quoted strings, keyed lists
//! (`[0 => a, 1 => b]`) and maps (`{'k' => v}`). Constants are restricted to
//! scalars.

use crate::registry::VarKind;
use ms_common::{ClassName, Error, Result, Value};

/// Render `value` as a literal for a field of the given kind.
pub fn render_value(value: &Value, kind: VarKind, class: &ClassName, field: &str) -> Result<String> {
    let mut out = String::new();
    render_into(&mut out, value, kind, class, field)?;
    Ok(out)
}

fn render_into(
    out: &mut String,
    value: &Value,
    kind: VarKind,
    class: &ClassName,
    field: &str,
) -> Result<()> {
    let reject = |reason: String| Error::Render {
        class: class.to_string(),
        field: format!("{kind} '{field}'"),
        reason,
    };

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&render_float(*f).ok_or_else(|| {
            reject(format!("float {f} has no literal form"))
        })?),
        Value::Str(s) => out.push_str(&quote(s)),
        Value::List(_) | Value::Map(_) if kind == VarKind::Const => {
            return Err(reject(format!(
                "constants must be scalar, got {}",
                value.kind_name()
            )));
        }
        Value::List(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                out.push_str(&idx.to_string());
                out.push_str(" => ");
                render_into(out, item, kind, class, field)?;
            }
            out.push(']');
        }
        Value::Map(entries) => {
            out.push('{');
            for (idx, (key, item)) in entries.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                out.push_str(&quote(key));
                out.push_str(" => ");
                render_into(out, item, kind, class, field)?;
            }
            out.push('}');
        }
        Value::Object(obj) => {
            return Err(reject(format!("object {obj} cannot be rendered as a literal")));
        }
    }
    Ok(())
}

/// Floats always carry a `.` or an exponent so they read back as floats.
fn render_float(f: f64) -> Option<String> {
    if !f.is_finite() {
        return None;
    }
    let text = format!("{f:?}");
    if text.contains(&['.', 'e', 'E'][..]) {
        Some(text)
    } else {
        Some(format!("{text}.0"))
    }
}

/// Single-quote a string, escaping `\` and `'`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_common::ObjectRef;
    use serde_json::json;

    fn class() -> ClassName {
        ClassName::parse("MyNSpace::DB").unwrap()
    }

    fn render(value: impl Into<Value>, kind: VarKind) -> Result<String> {
        render_value(&value.into(), kind, &class(), "field")
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(Value::Null, VarKind::Const).unwrap(), "null");
        assert_eq!(render(true, VarKind::Const).unwrap(), "true");
        assert_eq!(render(-42, VarKind::Const).unwrap(), "-42");
        assert_eq!(render(2.13, VarKind::Const).unwrap(), "2.13");
        assert_eq!(render(3.0, VarKind::Const).unwrap(), "3.0");
        assert_eq!(render("it's", VarKind::Const).unwrap(), r"'it\'s'");
        assert_eq!(render(r"a\b", VarKind::Const).unwrap(), r"'a\\b'");
    }

    #[test]
    fn test_nested_structures() {
        let value = Value::from_json(&json!({"list": [1, null], "name": "x"}), "test").unwrap();
        assert_eq!(
            render(value, VarKind::Property).unwrap(),
            "{'list' => [0 => 1, 1 => null], 'name' => 'x'}"
        );
    }

    #[test]
    fn test_const_rejects_structures() {
        let err = render(vec![1], VarKind::Const).unwrap_err();
        match err {
            Error::Render { class, field, .. } => {
                assert_eq!(class, "MyNSpace::DB");
                assert!(field.contains("field"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_object_rejected_anywhere() {
        let value = Value::List(vec![Value::Object(ObjectRef(9))]);
        let err = render(value, VarKind::StaticProperty).unwrap_err();
        assert!(err.to_string().contains("object #9"));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(render(f64::NAN, VarKind::Property).is_err());
    }
}
