//! Mock and spy registry.
//!
//! A [`MockRegistry`] accumulates the overrides for one target class:
//! mocked methods with their return rules, constant and property values, and
//! the spy flag. Registration validates eagerly so bad input fails in the
//! driver, before any child process is spawned.
//!
//! ```text
//! sandbox.mock_class("MyNSpace::DB")?
//!     .mock_static_method("query", SELF_INSTANCE)?
//!     .mock_method("execute", SELF_INSTANCE)?
//!     .mock_method("return_int", 1)?;
//! ```

use ms_common::id::{is_identifier, validate_identifier, SCOPE_SEPARATOR};
use ms_common::{ClassName, Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Whether a generated method is a type-level or instance-level entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Static,
    Instance,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Static => write!(f, "static"),
            CallKind::Instance => write!(f, "instance"),
        }
    }
}

/// A named callback evaluated inside the child, with captured JSON input.
///
/// The child resolves `name` in its host catalog and calls the function with
/// `(receiver, call arguments, captured)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    pub name: String,
    #[serde(default)]
    pub captured: serde_json::Value,
}

impl Callback {
    pub fn new(name: impl Into<String>) -> Self {
        Callback {
            name: name.into(),
            captured: serde_json::Value::Null,
        }
    }

    /// Attach captured input. Fails if `captured` does not serialize to JSON.
    pub fn capturing<T: Serialize>(name: impl Into<String>, captured: &T) -> Result<Self> {
        Ok(Callback {
            name: name.into(),
            captured: serde_json::to_value(captured)?,
        })
    }
}

/// Validated return rule, as stored and transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnRule {
    Literal(serde_json::Value),
    /// Return the receiver.
    SelfInstance,
    Deferred(Callback),
}

/// Literal value as supplied by test code, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Value(Value),
    /// Raw JSON, converted on validation so out-of-range numbers are caught.
    Json(serde_json::Value),
}

impl Literal {
    fn into_value(self, target: &str) -> Result<Value> {
        match self {
            Literal::Value(value) => Ok(value),
            Literal::Json(json) => Value::from_json(&json, target),
        }
    }
}

/// Return rule as supplied by test code, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Returns {
    Value(Literal),
    SelfInstance,
    Deferred(Callback),
}

/// Sentinel rule: the mocked method returns its receiver, enabling fluent
/// chains through generated stubs.
pub const SELF_INSTANCE: Returns = Returns::SelfInstance;

macro_rules! literal_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Literal {
                fn from(v: $ty) -> Self {
                    Literal::Value(Value::from(v))
                }
            }

            impl From<$ty> for Returns {
                fn from(v: $ty) -> Self {
                    Returns::Value(Literal::from(v))
                }
            }
        )*
    };
}

literal_from_value!(Value, bool, i32, i64, f64, &str, String);

impl From<serde_json::Value> for Literal {
    fn from(json: serde_json::Value) -> Self {
        Literal::Json(json)
    }
}

impl From<serde_json::Value> for Returns {
    fn from(json: serde_json::Value) -> Self {
        Returns::Value(Literal::Json(json))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Literal {
    fn from(items: Vec<T>) -> Self {
        Literal::Value(Value::from(items))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Returns {
    fn from(items: Vec<T>) -> Self {
        Returns::Value(Literal::from(items))
    }
}

impl From<Callback> for Returns {
    fn from(callback: Callback) -> Self {
        Returns::Deferred(callback)
    }
}

impl Returns {
    fn validate(self, target: &str) -> Result<ReturnRule> {
        match self {
            Returns::Value(literal) => Ok(ReturnRule::Literal(
                literal.into_value(target)?.to_json(target)?,
            )),
            Returns::SelfInstance => Ok(ReturnRule::SelfInstance),
            Returns::Deferred(callback) => {
                validate_identifier_path("callback name", &callback.name)?;
                Ok(ReturnRule::Deferred(callback))
            }
        }
    }
}

/// One mocked method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMock {
    pub call_kind: CallKind,
    pub rule: ReturnRule,
}

/// Kind of a defined field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Const,
    StaticProperty,
    Property,
}

impl std::fmt::Display for VarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarKind::Const => write!(f, "constant"),
            VarKind::StaticProperty => write!(f, "static property"),
            VarKind::Property => write!(f, "property"),
        }
    }
}

/// Constant and property overrides of one class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vars {
    #[serde(default)]
    pub consts: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub static_properties: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Vars {
    fn slot_mut(&mut self, kind: VarKind) -> &mut BTreeMap<String, serde_json::Value> {
        match kind {
            VarKind::Const => &mut self.consts,
            VarKind::StaticProperty => &mut self.static_properties,
            VarKind::Property => &mut self.properties,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consts.is_empty() && self.static_properties.is_empty() && self.properties.is_empty()
    }
}

/// Snapshot of one class's mock data, as carried in the sandbox state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockSpec {
    #[serde(default)]
    pub methods: BTreeMap<String, MethodMock>,
    #[serde(default)]
    pub vars: Vars,
    #[serde(default)]
    pub is_spy: bool,
    #[serde(default)]
    pub spy_namespace: String,
}

/// Accumulator of overrides for one target class.
#[derive(Debug, Clone)]
pub struct MockRegistry {
    class: ClassName,
    spec: MockSpec,
}

impl MockRegistry {
    pub fn new(class: ClassName) -> Self {
        MockRegistry {
            class,
            spec: MockSpec::default(),
        }
    }

    pub fn class(&self) -> &ClassName {
        &self.class
    }

    /// Mock a method with an explicit call kind. Overwrites any previous
    /// entry for `name`.
    pub fn mock(
        &mut self,
        name: &str,
        call_kind: CallKind,
        returns: impl Into<Returns>,
    ) -> Result<&mut Self> {
        validate_identifier("method name", name)?;
        let rule = returns
            .into()
            .validate(&format!("{}::{}()", self.class, name))?;
        debug!(class = %self.class, method = name, %call_kind, "mocked method");
        self.spec
            .methods
            .insert(name.to_string(), MethodMock { call_kind, rule });
        Ok(self)
    }

    /// Mock an instance method.
    pub fn mock_method(&mut self, name: &str, returns: impl Into<Returns>) -> Result<&mut Self> {
        self.mock(name, CallKind::Instance, returns)
    }

    /// Mock a static method.
    pub fn mock_static_method(
        &mut self,
        name: &str,
        returns: impl Into<Returns>,
    ) -> Result<&mut Self> {
        self.mock(name, CallKind::Static, returns)
    }

    /// Define a constant or property value. Constants must be scalar.
    pub fn define(&mut self, kind: VarKind, name: &str, value: impl Into<Literal>) -> Result<&mut Self> {
        validate_identifier(&format!("{kind} name"), name)?;
        let target = format!("{} {}::{}", kind, self.class, name);
        let value = value.into().into_value(&target)?;
        if kind == VarKind::Const && !value.is_scalar() {
            return Err(Error::UnsupportedValue {
                target,
                kind: value.kind_name(),
            });
        }
        let json = value.to_json(&target)?;
        debug!(class = %self.class, field = name, %kind, "defined field");
        self.spec.vars.slot_mut(kind).insert(name.to_string(), json);
        Ok(self)
    }

    pub fn define_const(&mut self, name: &str, value: impl Into<Literal>) -> Result<&mut Self> {
        self.define(VarKind::Const, name, value)
    }

    pub fn define_static_property(
        &mut self,
        name: &str,
        value: impl Into<Literal>,
    ) -> Result<&mut Self> {
        self.define(VarKind::StaticProperty, name, value)
    }

    pub fn define_property(&mut self, name: &str, value: impl Into<Literal>) -> Result<&mut Self> {
        self.define(VarKind::Property, name, value)
    }

    /// Toggle spy mode. Enabling requires a spy namespace to be set first.
    pub fn set_spy(&mut self, is_spy: bool) -> Result<&mut Self> {
        if is_spy && self.spec.spy_namespace.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "spy namespace must be set before enabling spy mode for '{}'",
                self.class
            )));
        }
        self.spec.is_spy = is_spy;
        Ok(self)
    }

    pub fn set_spy_namespace(&mut self, namespace: &str) -> Result<&mut Self> {
        let namespace = namespace.strip_prefix(SCOPE_SEPARATOR).unwrap_or(namespace);
        validate_identifier_path("spy namespace", namespace)?;
        self.spec.spy_namespace = namespace.to_string();
        Ok(self)
    }

    pub fn methods(&self) -> &BTreeMap<String, MethodMock> {
        &self.spec.methods
    }

    pub fn vars(&self) -> &Vars {
        &self.spec.vars
    }

    pub fn is_spy(&self) -> bool {
        self.spec.is_spy
    }

    pub fn spy_namespace(&self) -> &str {
        &self.spec.spy_namespace
    }

    /// Copy of the accumulated data.
    pub fn snapshot(&self) -> MockSpec {
        self.spec.clone()
    }
}

/// Validate a `::`-separated path of identifiers.
fn validate_identifier_path(what: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} must not be empty")));
    }
    if !path.split(SCOPE_SEPARATOR).all(is_identifier) {
        return Err(Error::InvalidArgument(format!(
            "{what} '{path}' is not a '::'-separated path of identifiers"
        )));
    }
    Ok(())
}
