//! Demo host catalog used by the bundled `sandbox-child` binary and the
//! integration tests.
//!
//! It backs `tests/fixtures/test_class.cls`:
//!
//! ```text
//! class TestClass {
//!     static my_property = 'Hello world!';
//!     static fn getProperty() => native('test_class.get_property');
//!     static fn getString() => native('test_class.get_string');
//!     static fn init() => native('test_class.init');
//! }
//! ```

use crate::runtime::{CallContext, HostCatalog, NativeResult, Runtime};
use ms_common::{ClassName, Failure, FailureKind, Value};

/// Built-ins plus the `TestClass` natives and the `raise`/`panic` commands.
pub fn demo_catalog() -> HostCatalog {
    HostCatalog::with_builtins()
        .native("test_class.get_property", get_property)
        .native("test_class.get_string", get_string)
        .native("test_class.init", init)
        .command("raise", raise)
        .command("panic", panic_command)
}

/// `static::getString() . static::$my_property`
fn get_property(rt: &mut Runtime, ctx: &CallContext, _args: Vec<Value>) -> NativeResult {
    let prefix = rt.call_static(&ctx.called_class, "getString", Vec::new())?;
    let property = rt.get_static(&ctx.called_class, "my_property")?;
    Ok(Value::Str(format!("{}{}", concat_part(&prefix), concat_part(&property))))
}

fn get_string(_rt: &mut Runtime, _ctx: &CallContext, _args: Vec<Value>) -> NativeResult {
    Ok(Value::from("Case: "))
}

/// `MyNSpace::DB::query()->execute()`
fn init(rt: &mut Runtime, _ctx: &CallContext, _args: Vec<Value>) -> NativeResult {
    let db = ClassName::parse("MyNSpace::DB")?;
    let query = rt.call_static(&db, "query", Vec::new())?;
    rt.call(&query, "execute", Vec::new())
}

/// String conversion for concatenation.
fn concat_part(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        other => other.to_string(),
    }
}

/// Fail with captured `{"kind": ..., "message": ...}`.
fn raise(_rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let kind = captured
        .get("kind")
        .and_then(serde_json::Value::as_str)
        .map_or(FailureKind::Runtime, FailureKind::from_tag);
    let message = captured
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("raised by test");
    Err(Failure::new(kind, message))
}

fn panic_command(_rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let message = captured.as_str().unwrap_or("explicit panic");
    panic!("{message}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ClassOrigin;

    const TEST_CLASS: &str = include_str!("../tests/fixtures/test_class.cls");

    #[test]
    fn test_get_property_unmocked() {
        let mut rt = Runtime::new(demo_catalog());
        rt.load_source(TEST_CLASS, ClassOrigin::Source("test_class.cls".into()))
            .unwrap();
        let value = rt
            .call_static(&ClassName::parse("TestClass").unwrap(), "getProperty", vec![])
            .unwrap();
        assert_eq!(value, Value::from("Case: Hello world!"));
    }

    #[test]
    fn test_raise_uses_captured_kind() {
        let mut rt = Runtime::new(demo_catalog());
        let failure = raise(
            &mut rt,
            &serde_json::json!({"kind": "db_error", "message": "gone"}),
        )
        .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Other("db_error".into()));
        assert_eq!(failure.message, "gone");
        assert!(failure.origin.contains("fixtures.rs"));
    }

    #[test]
    fn test_init_without_db_mock_is_lookup_failure() {
        let mut rt = Runtime::new(demo_catalog());
        rt.load_source(TEST_CLASS, ClassOrigin::Source("test_class.cls".into()))
            .unwrap();
        let failure = rt
            .call_static(&ClassName::parse("TestClass").unwrap(), "init", vec![])
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Lookup);
        assert!(failure.message.contains("MyNSpace::DB"));
    }
}
