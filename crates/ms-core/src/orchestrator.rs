//! Driver side: the [`Sandbox`] a test owns.
//!
//! Registration happens in the driver process. `execute` snapshots the
//! registries into a [`SandboxState`], runs one child with the state as its
//! startup argument, and turns the child's envelope back into a value or an
//! [`Error`].

use crate::autoload::validate_autoload_path;
use crate::codegen::generate_class;
use crate::command::Command;
use crate::exit_codes::ExitCode;
use crate::protocol::{parse_response, startup_arg, truncate};
use crate::registry::MockRegistry;
use crate::state::SandboxState;
use ms_common::{ClassName, Error, Result, RunId};
use ms_config::resolve::ENV_CHILD;
use ms_config::{resolve_config, SandboxConfig};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command as Process, Output, Stdio};
use tracing::{debug, info, info_span, warn};

const STDERR_TAIL_CHARS: usize = 2000;

/// Mock registration and sandboxed execution for one test.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    registries: BTreeMap<ClassName, MockRegistry>,
    state: SandboxState,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Sandbox {
            config,
            registries: BTreeMap::new(),
            state: SandboxState::new(),
        }
    }

    /// Sandbox configured from `MOCK_SANDBOX_CONFIG`, the XDG config file
    /// and the environment overrides.
    pub fn from_env() -> Result<Self> {
        let (config, source) =
            resolve_config(None).map_err(|e| Error::InvalidArgument(e.to_string()))?;
        debug!(?source, "resolved sandbox config");
        Ok(Sandbox::new(config))
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Autoload files, in load order.
    pub fn autoload_files(&self) -> &[PathBuf] {
        &self.state.autoload_files
    }

    /// Add declaration files the child loads after the mocks. Every call
    /// merges into the existing list; already-present paths are ignored.
    pub fn init<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<&mut Self> {
        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            let path = file.as_ref();
            validate_autoload_path(path, &self.config.source_extension)?;
            accepted.push(path.to_path_buf());
        }
        let added = self.state.merge_autoload_files(accepted);
        debug!(added, total = self.state.autoload_files.len(), "autoload files merged");
        Ok(self)
    }

    fn registry(&mut self, name: &str) -> Result<&mut MockRegistry> {
        let class = ClassName::parse(name)?;
        Ok(self
            .registries
            .entry(class.clone())
            .or_insert_with(|| MockRegistry::new(class)))
    }

    /// Registry for a full replacement of `name`.
    pub fn mock_class(&mut self, name: &str) -> Result<&mut MockRegistry> {
        let registry = self.registry(name)?;
        registry.set_spy(false)?;
        Ok(registry)
    }

    /// Registry for a spy of `name` generated under `namespace`.
    pub fn spy_class(&mut self, name: &str, namespace: &str) -> Result<&mut MockRegistry> {
        let registry = self.registry(name)?;
        registry.set_spy_namespace(namespace)?.set_spy(true)?;
        Ok(registry)
    }

    /// [`Sandbox::spy_class`] with the configured spy namespace.
    pub fn spy_class_default(&mut self, name: &str) -> Result<&mut MockRegistry> {
        let namespace = self.config.spy_namespace.clone();
        self.spy_class(name, &namespace)
    }

    /// Declaration source the child will load for `name`.
    pub fn preview(&self, name: &str) -> Result<String> {
        let class = ClassName::parse(name)?;
        let registry = self
            .registries
            .get(&class)
            .ok_or_else(|| Error::Lookup(format!("no mock registered for class '{class}'")))?;
        generate_class(registry.class(), &registry.snapshot())
    }

    /// Run `command` in a fresh child and return its JSON result.
    pub fn execute(&mut self, command: impl Into<Command>) -> Result<serde_json::Value> {
        let command = command.into();
        let program = self.child_program()?;
        let run_id = RunId::new();
        let span = info_span!("sandbox_execute", run_id = %run_id, command = %command.name);
        let _enter = span.enter();

        for (class, registry) in &self.registries {
            self.state.mocks.insert(class.clone(), registry.snapshot());
        }
        self.state.run_id = run_id;
        self.state.pending = Some(command);
        let outgoing = self.state.clone();
        self.state.pending = None;

        let arg = startup_arg(&self.config.startup_flag, &outgoing)?;
        let output = self.spawn(program, &arg)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "ms_core::child", "{line}");
        }

        let response = parse_response(&stdout).map_err(|e| {
            let status = match output.status.code() {
                Some(code) => format!("exit code {code} ({})", ExitCode::describe(code)),
                None => "terminated by signal".to_string(),
            };
            warn!(%status, "child produced no usable response");
            Error::Protocol(format!(
                "{e}; child {status}; stderr: {}",
                tail(&stderr, STDERR_TAIL_CHARS)
            ))
        })?;
        let result = response.into_result();
        match &result {
            Ok(_) => info!("sandbox execution succeeded"),
            Err(e) => info!(code = e.code(), error = %e, "sandbox execution failed"),
        }
        result
    }

    /// [`Sandbox::execute`] deserialized into `T`.
    pub fn execute_as<T: DeserializeOwned>(&mut self, command: impl Into<Command>) -> Result<T> {
        Ok(serde_json::from_value(self.execute(command)?)?)
    }

    /// Drop every registry and the pending command. Autoload files and
    /// config are kept.
    pub fn cleanup(&mut self) {
        debug!(registries = self.registries.len(), "sandbox cleanup");
        self.registries.clear();
        self.state.mocks.clear();
        self.state.pending = None;
    }

    /// The configured child host. There is no fallback: the current
    /// executable is usually a test harness that rejects the startup flag.
    fn child_program(&self) -> Result<PathBuf> {
        self.config.child_program.clone().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "no sandbox child host configured; set `child_program` in the config or {}",
                ENV_CHILD
            ))
        })
    }

    fn spawn(&self, program: PathBuf, arg: &str) -> Result<Output> {
        debug!(program = %program.display(), arg_len = arg.len(), "spawning sandbox child");
        Process::new(&program)
            .arg(arg)
            .envs(self.config.child_environment())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn { program, source })
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim_end().to_string();
    }
    let skipped: String = text.chars().skip(count - max_chars).collect();
    format!("...{}", truncate(skipped.trim_end(), max_chars))
}
