//! The child's type space.
//!
//! Classes enter only through declaration source. Each class keeps its own
//! static property storage; instances live in a heap addressed by
//! [`ObjectRef`]. Dispatch is late-bound: every call carries a
//! [`CallContext`] whose `called_class` natives use to re-dispatch, so a
//! subclass override takes effect inside methods it inherits.

pub mod builtins;
pub mod catalog;

pub use catalog::{CallbackFn, CommandFn, HostCatalog, NativeFn, NativeResult};

use crate::command::Command;
use crate::decl::{parse_source, ClassDecl, MethodBody, MethodDecl};
use crate::registry::{CallKind, ReturnRule};
use crate::state::MockTable;
use ms_common::{ClassName, Error, Failure, ObjectRef, Result, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Where a declared class came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOrigin {
    Mock,
    Spy,
    Source(String),
}

impl fmt::Display for ClassOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassOrigin::Mock => write!(f, "mock"),
            ClassOrigin::Spy => write!(f, "spy"),
            ClassOrigin::Source(path) => write!(f, "{path}"),
        }
    }
}

/// Outcome of declaring one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    Added(ClassName),
    /// A mock already holds this name; the real declaration was skipped.
    Shadowed(ClassName),
}

/// Receiver and binding information of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    /// Class the call was made on (late static binding target).
    pub called_class: ClassName,
    /// Class whose declaration supplied the method body.
    pub defining_class: ClassName,
    /// The instance, for instance calls.
    pub this: Option<ObjectRef>,
}

#[derive(Debug)]
struct ClassEntry {
    decl: ClassDecl,
    origin: ClassOrigin,
    statics: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct Instance {
    class: ClassName,
    properties: BTreeMap<String, Value>,
}

pub struct Runtime {
    catalog: HostCatalog,
    mocks: MockTable,
    classes: BTreeMap<ClassName, ClassEntry>,
    heap: Vec<Instance>,
}

impl Runtime {
    pub fn new(catalog: HostCatalog) -> Self {
        Runtime {
            catalog,
            mocks: MockTable::new(),
            classes: BTreeMap::new(),
            heap: Vec::new(),
        }
    }

    /// Install the mock table consulted by forwarding method bodies.
    pub fn with_mocks(mut self, mocks: MockTable) -> Self {
        self.mocks = mocks;
        self
    }

    pub fn mocks(&self) -> &MockTable {
        &self.mocks
    }

    pub fn is_declared(&self, class: &ClassName) -> bool {
        self.classes.contains_key(class)
    }

    /// Origin of a declared class.
    pub fn origin_of(&self, class: &ClassName) -> Option<&ClassOrigin> {
        self.classes.get(class).map(|entry| &entry.origin)
    }

    /// Declare one class.
    ///
    /// A real declaration whose name a mock already holds is skipped. Any
    /// other redeclaration is a load error, as is a missing parent.
    pub fn declare(&mut self, decl: ClassDecl, origin: ClassOrigin) -> Result<Declared> {
        if let Some(existing) = self.classes.get(&decl.name) {
            if existing.origin == ClassOrigin::Mock && matches!(origin, ClassOrigin::Source(_)) {
                debug!(class = %decl.name, %origin, "class held by mock, skipping real declaration");
                return Ok(Declared::Shadowed(decl.name));
            }
            return Err(Error::Load(format!(
                "class '{}' from {origin} (line {}) is already declared by {}",
                decl.name, decl.line, existing.origin
            )));
        }
        if let Some(parent) = &decl.parent {
            if !self.is_declared(parent) {
                return Err(Error::Load(format!(
                    "parent class '{parent}' of '{}' is not declared",
                    decl.name
                )));
            }
        }

        debug!(class = %decl.name, %origin, "declared class");
        let name = decl.name.clone();
        let statics = decl.static_properties.clone();
        self.classes.insert(
            name.clone(),
            ClassEntry {
                decl,
                origin,
                statics,
            },
        );
        Ok(Declared::Added(name))
    }

    /// Parse `src` and declare every class in it, in order.
    pub fn load_source(&mut self, src: &str, origin: ClassOrigin) -> Result<Vec<Declared>> {
        parse_source(src)?
            .into_iter()
            .map(|decl| self.declare(decl, origin.clone()))
            .collect()
    }

    fn entry(&self, class: &ClassName) -> std::result::Result<&ClassEntry, Failure> {
        self.classes
            .get(class)
            .ok_or_else(|| Failure::lookup(format!("class '{class}' not found")))
    }

    /// `class` followed by its ancestors.
    fn lineage(&self, class: &ClassName) -> std::result::Result<Vec<&ClassEntry>, Failure> {
        let mut chain = vec![self.entry(class)?];
        while let Some(parent) = chain.last().copied().and_then(|e| e.decl.parent.as_ref()) {
            chain.push(self.entry(parent)?);
        }
        Ok(chain)
    }

    fn find_method(
        &self,
        class: &ClassName,
        method: &str,
    ) -> std::result::Result<(ClassName, MethodDecl), Failure> {
        self.lineage(class)?
            .into_iter()
            .find_map(|entry| {
                entry
                    .decl
                    .methods
                    .get(method)
                    .map(|m| (entry.decl.name.clone(), m.clone()))
            })
            .ok_or_else(|| Failure::lookup(format!("call to undefined method {class}::{method}()")))
    }

    /// `Class::method(args)`.
    pub fn call_static(&mut self, class: &ClassName, method: &str, args: Vec<Value>) -> NativeResult {
        let (defining_class, decl) = self.find_method(class, method)?;
        if decl.call_kind == CallKind::Instance {
            return Err(Failure::type_error(format!(
                "non-static method {defining_class}::{method}() cannot be called statically"
            )));
        }
        let ctx = CallContext {
            called_class: class.clone(),
            defining_class,
            this: None,
        };
        self.invoke(&ctx, method, &decl.body, args)
    }

    /// `$obj->method(args)`. Static methods are reachable through instances.
    pub fn call_method(&mut self, obj: ObjectRef, method: &str, args: Vec<Value>) -> NativeResult {
        let class = self.class_of(obj)?.clone();
        let (defining_class, decl) = self.find_method(&class, method)?;
        let this = match decl.call_kind {
            CallKind::Instance => Some(obj),
            CallKind::Static => None,
        };
        let ctx = CallContext {
            called_class: class,
            defining_class,
            this,
        };
        self.invoke(&ctx, method, &decl.body, args)
    }

    /// Call `method` on `target`, which must be an object.
    pub fn call(&mut self, target: &Value, method: &str, args: Vec<Value>) -> NativeResult {
        match target {
            Value::Object(obj) => self.call_method(*obj, method, args),
            other => Err(Failure::type_error(format!(
                "call to member function {method}() on {}",
                other.kind_name()
            ))),
        }
    }

    fn invoke(
        &mut self,
        ctx: &CallContext,
        method: &str,
        body: &MethodBody,
        args: Vec<Value>,
    ) -> NativeResult {
        trace!(class = %ctx.called_class, method, "invoke");
        match body {
            MethodBody::Native(symbol) => {
                let native = self.catalog.lookup_native(symbol)?;
                native(self, ctx, args)
            }
            MethodBody::Forward { target, method } => self.forward(ctx, target, method, args),
        }
    }

    /// Resolve a forwarded call against the mock table.
    fn forward(
        &mut self,
        ctx: &CallContext,
        target: &ClassName,
        method: &str,
        args: Vec<Value>,
    ) -> NativeResult {
        let rule = self.mocks.call_method(target, method)?.clone();
        match rule {
            ReturnRule::Literal(json) => Ok(Value::from_json(&json, method)?),
            ReturnRule::SelfInstance => self.receiver(ctx).map(Value::Object),
            ReturnRule::Deferred(callback) => {
                let receiver = self.receiver(ctx)?;
                let function = self.catalog.lookup_callback(&callback.name)?;
                function(self, Value::Object(receiver), args, &callback.captured)
            }
        }
    }

    /// The current instance, or a fresh instance of the defining class for a
    /// static call.
    fn receiver(&mut self, ctx: &CallContext) -> std::result::Result<ObjectRef, Failure> {
        match ctx.this {
            Some(obj) => Ok(obj),
            None => self.instantiate(&ctx.defining_class),
        }
    }

    /// `new Class()`. Property defaults come from the whole parent chain,
    /// subclasses overriding ancestors.
    pub fn instantiate(&mut self, class: &ClassName) -> std::result::Result<ObjectRef, Failure> {
        let mut properties = BTreeMap::new();
        for entry in self.lineage(class)?.into_iter().rev() {
            for (name, value) in &entry.decl.properties {
                properties.insert(name.clone(), value.clone());
            }
        }
        self.heap.push(Instance {
            class: class.clone(),
            properties,
        });
        Ok(ObjectRef(self.heap.len() - 1))
    }

    fn instance(&self, obj: ObjectRef) -> std::result::Result<&Instance, Failure> {
        self.heap
            .get(obj.0)
            .ok_or_else(|| Failure::lookup(format!("dangling object handle {obj}")))
    }

    pub fn class_of(&self, obj: ObjectRef) -> std::result::Result<&ClassName, Failure> {
        self.instance(obj).map(|i| &i.class)
    }

    /// `Class::NAME`, searching ancestors.
    pub fn get_const(&self, class: &ClassName, name: &str) -> NativeResult {
        self.lineage(class)?
            .into_iter()
            .find_map(|entry| entry.decl.consts.get(name).cloned())
            .ok_or_else(|| Failure::lookup(format!("undefined constant {class}::{name}")))
    }

    /// Class in `class`'s lineage that declares static `name`.
    fn static_owner(&self, class: &ClassName, name: &str) -> std::result::Result<ClassName, Failure> {
        self.lineage(class)?
            .into_iter()
            .find(|entry| entry.statics.contains_key(name))
            .map(|entry| entry.decl.name.clone())
            .ok_or_else(|| Failure::lookup(format!("access to undeclared static property {class}::${name}")))
    }

    /// `Class::$name`.
    pub fn get_static(&self, class: &ClassName, name: &str) -> NativeResult {
        let owner = self.static_owner(class, name)?;
        Ok(self
            .classes
            .get(&owner)
            .and_then(|entry| entry.statics.get(name))
            .cloned()
            .unwrap_or_default())
    }

    /// `Class::$name = value`, writing to the declaring class's storage.
    pub fn set_static(
        &mut self,
        class: &ClassName,
        name: &str,
        value: Value,
    ) -> std::result::Result<(), Failure> {
        let owner = self.static_owner(class, name)?;
        if let Some(entry) = self.classes.get_mut(&owner) {
            entry.statics.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// `$obj->name`.
    pub fn get_property(&self, obj: ObjectRef, name: &str) -> NativeResult {
        let instance = self.instance(obj)?;
        instance
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| Failure::lookup(format!("undefined property {}::${name}", instance.class)))
    }

    /// `$obj->name = value`. Undeclared properties are created.
    pub fn set_property(
        &mut self,
        obj: ObjectRef,
        name: &str,
        value: Value,
    ) -> std::result::Result<(), Failure> {
        let instance = self
            .heap
            .get_mut(obj.0)
            .ok_or_else(|| Failure::lookup(format!("dangling object handle {obj}")))?;
        instance.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Dispatch a command through the command table.
    pub fn run_command(&mut self, command: &Command) -> NativeResult {
        debug!(command = %command.name, "running command");
        let function = self.catalog.lookup_command(&command.name)?;
        function(self, &command.captured)
    }
}
