//! Declaration source: the loadable form of classes.
//!
//! Both generated mock/spy classes and real classes from autoload files are
//! written in this small language and enter the runtime through
//! [`parse_source`]. Method bodies either forward to the mock table or bind
//! to a native function registered by the host.
//!
//! ```text
//! scope MyNSpace;
//!
//! class DB extends Base::Connection {
//!     const DRIVER = 'sqlite';
//!     static pool = [0 => 'a', 1 => 'b'];
//!     var name = null;
//!     static fn query() => forward('MyNSpace::DB', 'query');
//!     fn close() => native('db.close');
//! }
//! ```

mod lexer;
mod parser;

pub use parser::parse_source;

use crate::registry::CallKind;
use ms_common::{ClassName, Value};
use std::collections::BTreeMap;

/// One declared class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: ClassName,
    pub parent: Option<ClassName>,
    pub consts: BTreeMap<String, Value>,
    pub static_properties: BTreeMap<String, Value>,
    pub properties: BTreeMap<String, Value>,
    pub methods: BTreeMap<String, MethodDecl>,
    /// Line of the `class` keyword.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub call_kind: CallKind,
    pub body: MethodBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodBody {
    /// Resolve the return rule from the mock table at call time.
    Forward { target: ClassName, method: String },
    /// Call a native function registered under this symbol.
    Native(String),
}
