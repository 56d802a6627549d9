//! Mock Sandbox core library.
//!
//! Replaces classes that cannot be substituted by ordinary mocking with
//! generated stand-ins, inside a disposable child process:
//!
//! - [`registry`]: per-class mock and spy registration
//! - [`codegen`]: stand-in class generation as declaration source
//! - [`decl`]: the declaration language
//! - [`runtime`]: the child's type space and host catalog
//! - [`state`] and [`protocol`]: what crosses the process boundary
//! - [`orchestrator`]: the driver-side [`Sandbox`]
//! - [`child`]: the child-side lifecycle

pub mod autoload;
pub mod child;
pub mod codegen;
pub mod command;
pub mod decl;
pub mod exit_codes;
pub mod fixtures;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod state;

pub use command::{CallPlan, Command};
pub use orchestrator::Sandbox;
pub use registry::{CallKind, Callback, Literal, MockRegistry, Returns, SELF_INSTANCE};
pub use runtime::{CallContext, HostCatalog, NativeResult, Runtime};

pub use ms_common::{ClassName, Error, Failure, FailureKind, ObjectRef, Result, Value};
pub use ms_config::SandboxConfig;
