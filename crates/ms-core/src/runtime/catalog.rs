//! Host catalog: the dispatch tables a child host registers.
//!
//! Three tables, all keyed by name:
//! - natives, bound to `native('symbol')` method bodies
//! - callbacks, evaluated by deferred return rules
//! - commands, the pending computations a driver can request

use super::{builtins, CallContext, Runtime};
use ms_common::{Failure, Value};
use std::collections::HashMap;
use std::fmt;

pub type NativeResult = std::result::Result<Value, Failure>;

/// Body of a real method: `(runtime, call context, arguments)`.
pub type NativeFn = fn(&mut Runtime, &CallContext, Vec<Value>) -> NativeResult;

/// Deferred return rule: `(runtime, receiver, arguments, captured)`.
pub type CallbackFn = fn(&mut Runtime, Value, Vec<Value>, &serde_json::Value) -> NativeResult;

/// Pending computation: `(runtime, captured)`.
pub type CommandFn = fn(&mut Runtime, &serde_json::Value) -> NativeResult;

#[derive(Clone, Default)]
pub struct HostCatalog {
    natives: HashMap<String, NativeFn>,
    callbacks: HashMap<String, CallbackFn>,
    commands: HashMap<String, CommandFn>,
}

impl HostCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        HostCatalog::default()
    }

    /// A catalog holding the built-in callbacks and commands.
    pub fn with_builtins() -> Self {
        builtins::register(HostCatalog::new())
    }

    pub fn native(mut self, symbol: &str, f: NativeFn) -> Self {
        self.natives.insert(symbol.to_string(), f);
        self
    }

    pub fn callback(mut self, name: &str, f: CallbackFn) -> Self {
        self.callbacks.insert(name.to_string(), f);
        self
    }

    pub fn command(mut self, name: &str, f: CommandFn) -> Self {
        self.commands.insert(name.to_string(), f);
        self
    }

    pub(crate) fn lookup_native(&self, symbol: &str) -> Result<NativeFn, Failure> {
        self.natives
            .get(symbol)
            .copied()
            .ok_or_else(|| Failure::lookup(format!("no native function registered as '{symbol}'")))
    }

    pub(crate) fn lookup_callback(&self, name: &str) -> Result<CallbackFn, Failure> {
        self.callbacks
            .get(name)
            .copied()
            .ok_or_else(|| Failure::lookup(format!("no callback registered as '{name}'")))
    }

    pub(crate) fn lookup_command(&self, name: &str) -> Result<CommandFn, Failure> {
        self.commands
            .get(name)
            .copied()
            .ok_or_else(|| Failure::lookup(format!("no command registered as '{name}'")))
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

impl fmt::Debug for HostCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCatalog")
            .field("natives", &sorted_keys(&self.natives))
            .field("callbacks", &sorted_keys(&self.callbacks))
            .field("commands", &sorted_keys(&self.commands))
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
