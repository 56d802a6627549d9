//! Mock Sandbox common types, identifiers, values, and errors.
//!
//! This crate provides foundational types shared by the driver and the
//! sandbox child:
//! - Normalized class names and run identifiers
//! - The dynamic [`Value`] used by mocks and the runtime
//! - The failure taxonomy that crosses the process boundary
//! - The unified error type and protocol versioning

pub mod error;
pub mod failure;
pub mod id;
pub mod schema;
pub mod value;

pub use error::{Error, Result};
pub use failure::{Failure, FailureKind};
pub use id::{ClassName, RunId};
pub use schema::PROTOCOL_VERSION;
pub use value::{ObjectRef, Value};
