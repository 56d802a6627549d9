//! End-to-end tests: driver `Sandbox` against the demo `sandbox-child` host.
//!
//! Validates:
//! - Literal return rules round-trip for every JSON kind, nulls included
//! - Self-instance rules chain through `TestClass::init()`
//! - Deferred rules see exactly the call arguments
//! - Spies override statics and methods while inheriting real behavior
//! - Objects are rejected at registration
//! - `cleanup` isolates tests
//! - Child failures re-raise with kind, message and origin
//! - `init` merges autoload lists and mocks shadow real declarations
//! - A sandbox without a child host fails before spawning

use ms_core::command::Command;
use ms_core::registry::Callback;
use ms_core::{Error, FailureKind, ObjectRef, Sandbox, SandboxConfig, Value, SELF_INSTANCE};
use serde_json::json;
use std::path::PathBuf;

// ============================================================================
// Helpers
// ============================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn sandbox() -> Sandbox {
    let mut config = SandboxConfig::default().with_child_program(env!("CARGO_BIN_EXE_sandbox-child"));
    config.log.filter = "warn".to_string();
    let mut sandbox = Sandbox::new(config);
    sandbox.init(&[fixture("test_class.cls")]).unwrap();
    sandbox
}

/// `MyNSpace::DB` mocked the way `TestClass::init()` uses it.
fn sandbox_with_db() -> Sandbox {
    let mut sb = sandbox();
    sb.mock_class("::MyNSpace::DB")
        .unwrap()
        .mock_static_method("query", Callback::new("return_receiver"))
        .unwrap()
        .mock_method("execute", SELF_INSTANCE)
        .unwrap()
        .mock_method("return_array", vec![1, 2, 3])
        .unwrap()
        .mock_method("return_int", 1)
        .unwrap()
        .mock_method("return_float", 2.13)
        .unwrap()
        .mock_method("return_true", true)
        .unwrap()
        .mock_method("return_false", false)
        .unwrap()
        .mock_method("return_null", Value::Null)
        .unwrap()
        .mock_method("return_nulls", json!([null, 1, {"k": null}]))
        .unwrap()
        .mock_method("return_string", "value")
        .unwrap()
        .mock_method("echo_args", Callback::new("return_args"))
        .unwrap();
    sb
}

fn init_then(method: &str) -> Command {
    Command::call("TestClass", "init").then(method).into()
}

// ============================================================================
// Mocked methods
// ============================================================================

#[test]
fn test_literal_rules_round_trip() {
    let mut sb = sandbox_with_db();

    let cases = [
        ("return_array", json!([1, 2, 3])),
        ("return_int", json!(1)),
        ("return_float", json!(2.13)),
        ("return_true", json!(true)),
        ("return_false", json!(false)),
        ("return_null", json!(null)),
        ("return_nulls", json!([null, 1, {"k": null}])),
        ("return_string", json!("value")),
    ];
    for (method, expected) in cases {
        let result = sb.execute(init_then(method)).unwrap();
        assert_eq!(result, expected, "{method}");
    }

    let int: i64 = sb.execute_as(init_then("return_int")).unwrap();
    assert_eq!(int, 1);
    let float: f64 = sb.execute_as(init_then("return_float")).unwrap();
    assert!((float - 2.13).abs() < f64::EPSILON);
}

#[test]
fn test_object_result_cannot_cross_boundary() {
    let mut sb = sandbox_with_db();
    let err = sb.execute(init_then("execute")).unwrap_err();
    match err {
        Error::Sandbox { kind, .. } => assert_eq!(kind, FailureKind::UnsupportedValue),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_static_self_instance_then_instance_method() {
    let mut sb = sandbox();
    sb.mock_class("Factory")
        .unwrap()
        .mock_static_method("make", SELF_INSTANCE)
        .unwrap()
        .mock_method("run", 42)
        .unwrap();
    let command = Command::call("Factory", "make").then("run");
    assert_eq!(sb.execute(command).unwrap(), json!(42));
}

#[test]
fn test_integer_extremes_are_exact() {
    let mut sb = sandbox();
    let registry = sb.mock_class("DB").unwrap();
    registry
        .mock_static_method("max", json!(i64::MAX))
        .unwrap()
        .mock_static_method("min", i64::MIN)
        .unwrap();
    assert!(matches!(
        registry.mock_static_method("big", json!(u64::MAX)),
        Err(Error::UnsupportedValue { .. })
    ));

    assert_eq!(sb.execute(Command::call("DB", "max")).unwrap(), json!(i64::MAX));
    assert_eq!(sb.execute(Command::call("DB", "min")).unwrap(), json!(i64::MIN));
}

#[test]
fn test_deferred_rule_receives_arguments() {
    let mut sb = sandbox_with_db();
    let command = Command::call("TestClass", "init")
        .then("echo_args")
        .with_args(vec![1, 2, 3])
        .unwrap();
    assert_eq!(sb.execute(command).unwrap(), json!([1, 2, 3]));
}

// ============================================================================
// Constants and properties
// ============================================================================

#[test]
fn test_defined_fields_are_readable() {
    let mut sb = sandbox();
    sb.mock_class("DB")
        .unwrap()
        .define_property("name", "value")
        .unwrap()
        .define_const("MY_CONST", "value")
        .unwrap()
        .define_static_property("list", vec![Value::Null, Value::from("x")])
        .unwrap();

    assert_eq!(sb.execute(Command::read_property("DB", "name")).unwrap(), json!("value"));
    assert_eq!(sb.execute(Command::read_const("::DB", "MY_CONST")).unwrap(), json!("value"));
    assert_eq!(sb.execute(Command::read_static("DB", "list")).unwrap(), json!([null, "x"]));
}

#[test]
fn test_keyword_named_static_property() {
    let mut sb = sandbox();
    sb.mock_class("DB")
        .unwrap()
        .define_static_property("fn", 1)
        .unwrap();
    assert_eq!(sb.execute(Command::read_static("DB", "fn")).unwrap(), json!(1));
}

// ============================================================================
// Spies
// ============================================================================

#[test]
fn test_spy_falls_back_to_real_behavior() {
    let mut sb = sandbox();
    let real = sb.execute(Command::call("TestClass", "getProperty")).unwrap();
    assert_eq!(real, json!("Case: Hello world!"));

    sb.spy_class_default("::TestClass")
        .unwrap()
        .define_static_property("my_property", "value")
        .unwrap();
    let spied = sb.execute(Command::call("Spy::TestClass", "getProperty")).unwrap();
    assert_eq!(spied, json!("Case: value"));

    sb.spy_class_default("TestClass")
        .unwrap()
        .mock_static_method("getString", "Message: ")
        .unwrap();
    let overridden = sb.execute(Command::call("Spy::TestClass", "getProperty")).unwrap();
    assert_eq!(overridden, json!("Message: value"));

    // The real class is untouched by the spy.
    let real = sb.execute(Command::call("TestClass", "getProperty")).unwrap();
    assert_eq!(real, json!("Case: Hello world!"));
}

#[test]
fn test_spy_in_custom_namespace() {
    let mut sb = sandbox();
    sb.spy_class("TestClass", "Probe::Deep")
        .unwrap()
        .mock_static_method("getString", "> ")
        .unwrap();
    let result = sb.execute(Command::call("Probe::Deep::TestClass", "getProperty")).unwrap();
    assert_eq!(result, json!("> Hello world!"));
}

// ============================================================================
// Registration and isolation
// ============================================================================

#[test]
fn test_objects_rejected_at_registration() {
    let mut sb = sandbox();
    let registry = sb.mock_class("DB").unwrap();
    assert!(matches!(
        registry.mock_method("handle", Value::Object(ObjectRef(0))),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(matches!(
        registry.define_property("handle", vec![Value::Object(ObjectRef(0))]),
        Err(Error::UnsupportedValue { .. })
    ));
    assert!(matches!(
        registry.define_const("LIST", vec![1, 2]),
        Err(Error::UnsupportedValue { .. })
    ));
}

#[test]
fn test_cleanup_isolates_executions() {
    let mut sb = sandbox();
    sb.mock_class("DB").unwrap().define_const("MY_CONST", "value").unwrap();
    assert_eq!(sb.execute(Command::read_const("DB", "MY_CONST")).unwrap(), json!("value"));

    sb.cleanup();
    let err = sb.execute(Command::read_const("DB", "MY_CONST")).unwrap_err();
    assert!(matches!(err, Error::Lookup(_)), "{err}");

    // Autoload files survive cleanup.
    let real = sb.execute(Command::call("TestClass", "getProperty")).unwrap();
    assert_eq!(real, json!("Case: Hello world!"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failure_propagates_kind_message_and_origin() {
    let mut sb = sandbox();
    let command =
        Command::capturing("raise", &json!({"kind": "runtime", "message": "Test exception"}))
            .unwrap();
    match sb.execute(command).unwrap_err() {
        Error::Sandbox {
            kind,
            message,
            origin,
        } => {
            assert_eq!(kind, FailureKind::Runtime);
            assert_eq!(message, "Test exception");
            assert!(origin.contains("fixtures.rs"), "{origin}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_host_defined_failure_kind() {
    let mut sb = sandbox();
    let command =
        Command::capturing("raise", &json!({"kind": "db_error", "message": "gone"})).unwrap();
    let err = sb.execute(command).unwrap_err();
    assert!(matches!(
        err,
        Error::Sandbox { kind: FailureKind::Other(ref tag), .. } if tag == "db_error"
    ));
    assert_eq!(err.code(), 40);
}

#[test]
fn test_missing_mock_is_lookup_error() {
    let mut sb = sandbox();
    let err = sb.execute(Command::call("TestClass", "init")).unwrap_err();
    match err {
        Error::Lookup(message) => {
            assert!(message.contains("MyNSpace::DB"), "{message}");
            assert!(message.contains("thrown at"), "{message}");
            assert!(!message.starts_with("lookup failed"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_panic_is_reported() {
    let mut sb = sandbox();
    let err = sb
        .execute(Command::capturing("panic", &json!("boom")).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Sandbox { kind: FailureKind::Panic, .. }), "{err}");
}

// ============================================================================
// Autoloading
// ============================================================================

#[test]
fn test_init_merges_and_dedupes() {
    let mut sb = sandbox();
    sb.init(&[fixture("db.cls"), fixture("test_class.cls")]).unwrap();
    assert_eq!(sb.autoload_files(), &[fixture("test_class.cls"), fixture("db.cls")]);

    let driver = sb.execute(Command::read_const("MyNSpace::DB", "DRIVER")).unwrap();
    assert_eq!(driver, json!("sqlite"));
}

#[test]
fn test_mock_shadows_real_declaration() {
    let mut sb = sandbox();
    sb.init(&[fixture("db.cls")]).unwrap();
    sb.mock_class("MyNSpace::DB")
        .unwrap()
        .define_property("name", "mocked")
        .unwrap();

    assert_eq!(
        sb.execute(Command::read_property("MyNSpace::DB", "name")).unwrap(),
        json!("mocked")
    );
    let err = sb.execute(Command::read_const("MyNSpace::DB", "DRIVER")).unwrap_err();
    assert!(matches!(err, Error::Lookup(_)), "{err}");
}

#[test]
fn test_default_config_requires_child_host() {
    let mut sb = Sandbox::new(SandboxConfig::default());
    sb.mock_class("DB").unwrap().define_const("X", 1).unwrap();
    let err = sb.execute(Command::read_const("DB", "X")).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    assert_eq!(err.code(), 10);
}

#[test]
fn test_invalid_autoload_rejected_before_spawn() {
    let mut sb = sandbox();
    let err = sb.init(&[fixture("missing.cls")]).unwrap_err();
    assert!(matches!(err, Error::InvalidAutoload { .. }));
    assert_eq!(err.code(), 11);
}
