//! Sandbox state: everything the child needs to reproduce the driver's setup.
//!
//! The state travels as a wire bundle: the state JSON as a string plus its
//! SHA-256 digest and the protocol version it was written with. Keeping the
//! state as an opaque string means the digest covers exactly the bytes the
//! driver produced.

use crate::command::Command;
use crate::registry::{MockSpec, ReturnRule};
use ms_common::schema::is_compatible;
use ms_common::{ClassName, Error, Result, RunId, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Mock specifications keyed by normalized class name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MockTable(BTreeMap<ClassName, MockSpec>);

impl MockTable {
    pub fn new() -> Self {
        MockTable::default()
    }

    /// Insert or replace the spec for `class`.
    pub fn insert(&mut self, class: ClassName, spec: MockSpec) {
        self.0.insert(class, spec);
    }

    pub fn get(&self, class: &ClassName) -> Option<&MockSpec> {
        self.0.get(class)
    }

    pub fn contains(&self, class: &ClassName) -> bool {
        self.0.contains_key(class)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassName, &MockSpec)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Return rule for `class::method`. Missing class or method is a lookup
    /// error naming it.
    pub fn call_method(&self, class: &ClassName, method: &str) -> Result<&ReturnRule> {
        let spec = self
            .0
            .get(class)
            .ok_or_else(|| Error::Lookup(format!("no mock registered for class '{class}'")))?;
        spec.methods
            .get(method)
            .map(|m| &m.rule)
            .ok_or_else(|| Error::Lookup(format!("no mock registered for method {class}::{method}()")))
    }
}

/// Snapshot sent from the driver to the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxState {
    /// Protocol version the state was written with.
    pub version: String,
    pub run_id: RunId,
    #[serde(default)]
    pub pending: Option<Command>,
    /// Declaration files loaded after the mocks, in order.
    #[serde(default)]
    pub autoload_files: Vec<PathBuf>,
    #[serde(default)]
    pub mocks: MockTable,
}

impl Default for SandboxState {
    fn default() -> Self {
        SandboxState {
            version: PROTOCOL_VERSION.to_string(),
            run_id: RunId::new(),
            pending: None,
            autoload_files: Vec::new(),
            mocks: MockTable::new(),
        }
    }
}

impl SandboxState {
    pub fn new() -> Self {
        SandboxState::default()
    }

    /// Append autoload files, skipping ones already present. Returns how many
    /// were added.
    pub fn merge_autoload_files(&mut self, files: impl IntoIterator<Item = PathBuf>) -> usize {
        let before = self.autoload_files.len();
        for file in files {
            if !self.autoload_files.contains(&file) {
                self.autoload_files.push(file);
            }
        }
        self.autoload_files.len() - before
    }

    /// See [`MockTable::call_method`].
    pub fn call_method(&self, class: &ClassName, method: &str) -> Result<&ReturnRule> {
        self.mocks.call_method(class, method)
    }

    /// Serialize into a wire bundle.
    pub fn to_wire(&self) -> Result<String> {
        let state = serde_json::to_string(self)?;
        let bundle = WireBundle {
            protocol: PROTOCOL_VERSION.to_string(),
            digest: digest_hex(&state),
            state,
        };
        Ok(serde_json::to_string(&bundle)?)
    }

    /// Parse and verify a wire bundle.
    pub fn from_wire(wire: &str) -> Result<Self> {
        let bundle: WireBundle = serde_json::from_str(wire)
            .map_err(|e| Error::Protocol(format!("malformed wire bundle: {e}")))?;
        if !is_compatible(&bundle.protocol) {
            return Err(Error::Protocol(format!(
                "incompatible protocol version {} (expected {PROTOCOL_VERSION})",
                bundle.protocol
            )));
        }
        let actual = digest_hex(&bundle.state);
        if actual != bundle.digest {
            return Err(Error::Protocol(format!(
                "state digest mismatch: expected {}, computed {actual}",
                bundle.digest
            )));
        }
        serde_json::from_str(&bundle.state)
            .map_err(|e| Error::Protocol(format!("malformed sandbox state: {e}")))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireBundle {
    protocol: String,
    digest: String,
    state: String,
}

fn digest_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MockRegistry, SELF_INSTANCE};

    fn state_with_db() -> SandboxState {
        let mut reg = MockRegistry::new(ClassName::parse("MyNSpace::DB").unwrap());
        reg.mock_static_method("query", SELF_INSTANCE)
            .unwrap()
            .mock_method("return_int", 1)
            .unwrap();
        let mut state = SandboxState::new();
        state.mocks.insert(reg.class().clone(), reg.snapshot());
        state.pending = Some(Command::call("MyNSpace::DB", "query").into());
        state
    }

    #[test]
    fn test_wire_round_trip() {
        let state = state_with_db();
        let decoded = SandboxState::from_wire(&state.to_wire().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_tampered_state_rejected() {
        let wire = state_with_db().to_wire().unwrap();
        let mut bundle: serde_json::Value = serde_json::from_str(&wire).unwrap();
        let tampered = bundle["state"].as_str().unwrap().replace("return_int", "return_str");
        bundle["state"] = serde_json::Value::String(tampered);

        let err = SandboxState::from_wire(&bundle.to_string()).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"), "{err}");
    }

    #[test]
    fn test_incompatible_protocol_rejected() {
        let wire = state_with_db().to_wire().unwrap();
        let mut bundle: serde_json::Value = serde_json::from_str(&wire).unwrap();
        bundle["protocol"] = serde_json::Value::String("2.0.0".into());
        assert!(matches!(
            SandboxState::from_wire(&bundle.to_string()),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_call_method_lookup() {
        let state = state_with_db();
        let db = ClassName::parse("MyNSpace::DB").unwrap();
        assert_eq!(state.call_method(&db, "query").unwrap(), &ReturnRule::SelfInstance);

        let missing_method = state.call_method(&db, "nope").unwrap_err();
        assert!(missing_method.to_string().contains("MyNSpace::DB::nope()"));

        let other = ClassName::parse("Other").unwrap();
        assert!(matches!(state.call_method(&other, "query"), Err(Error::Lookup(_))));
    }

    #[test]
    fn test_autoload_merge_dedupes() {
        let mut state = SandboxState::new();
        let paths = |names: &[&str]| names.iter().map(PathBuf::from).collect::<Vec<_>>();
        assert_eq!(state.merge_autoload_files(paths(&["a.cls", "b.cls"])), 2);
        assert_eq!(state.merge_autoload_files(paths(&["b.cls", "c.cls"])), 1);
        assert_eq!(
            state.autoload_files,
            vec![PathBuf::from("a.cls"), PathBuf::from("b.cls"), PathBuf::from("c.cls")]
        );
    }
}
