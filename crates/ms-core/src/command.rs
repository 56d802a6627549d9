//! Pending computations shipped to the child.
//!
//! A [`Command`] names an entry in the child's command table and carries its
//! input as captured JSON. The built-in commands cover the common shapes of a
//! sandboxed test body: a static call followed by chained instance calls, and
//! reads of constants, static properties and instance properties.

use ms_common::{Result, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Name of the built-in call command.
pub const CALL: &str = "call";
/// Name of the built-in constant read.
pub const READ_CONST: &str = "const";
/// Name of the built-in static property read.
pub const READ_STATIC: &str = "static";
/// Name of the built-in instance property read.
pub const READ_PROPERTY: &str = "property";

/// A named computation with captured input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default)]
    pub captured: serde_json::Value,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            captured: serde_json::Value::Null,
        }
    }

    /// Command with captured input. Fails if `captured` does not serialize.
    pub fn capturing<T: Serialize>(name: impl Into<String>, captured: &T) -> Result<Self> {
        Ok(Command {
            name: name.into(),
            captured: serde_json::to_value(captured)?,
        })
    }

    /// Start a call plan: `Class::method()`.
    pub fn call(class: &str, method: &str) -> CallPlan {
        CallPlan {
            class: class.to_string(),
            method: method.to_string(),
            args: Vec::new(),
            chain: Vec::new(),
        }
    }

    /// Read `Class::NAME`.
    pub fn read_const(class: &str, name: &str) -> Self {
        Command::member(READ_CONST, class, name)
    }

    /// Read `Class::$name`.
    pub fn read_static(class: &str, name: &str) -> Self {
        Command::member(READ_STATIC, class, name)
    }

    /// Read `(new Class)->name`.
    pub fn read_property(class: &str, name: &str) -> Self {
        Command::member(READ_PROPERTY, class, name)
    }

    fn member(command: &str, class: &str, name: &str) -> Self {
        Command {
            name: command.to_string(),
            captured: json!({ "class": class, "name": name }),
        }
    }
}

/// Captured input of the member-read commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
}

/// Captured input of the `call` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPlan {
    pub class: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Instance calls applied in order to the previous result.
    #[serde(default)]
    pub chain: Vec<ChainedCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedCall {
    pub method: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl CallPlan {
    /// Arguments of the most recently added call.
    ///
    /// Objects cannot be transmitted; they fail here, in the driver.
    pub fn with_args<T: Into<Value>>(mut self, args: Vec<T>) -> Result<Self> {
        let target = match self.chain.last() {
            Some(step) => format!("arguments of {}()", step.method),
            None => format!("arguments of {}::{}()", self.class, self.method),
        };
        let args = args
            .into_iter()
            .map(|arg| arg.into().to_json(&target))
            .collect::<Result<Vec<_>>>()?;
        match self.chain.last_mut() {
            Some(step) => step.args = args,
            None => self.args = args,
        }
        Ok(self)
    }

    /// Append `->method()` to the chain.
    pub fn then(mut self, method: &str) -> Self {
        self.chain.push(ChainedCall {
            method: method.to_string(),
            args: Vec::new(),
        });
        self
    }

    pub fn into_command(self) -> Command {
        Command {
            name: CALL.to_string(),
            captured: json!(self),
        }
    }
}

impl From<CallPlan> for Command {
    fn from(plan: CallPlan) -> Self {
        plan.into_command()
    }
}
