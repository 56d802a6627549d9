//! Child side of a sandboxed execution.
//!
//! The child decodes the state from its startup argument, then in order:
//! loads every non-spy mock, loads the autoload files, loads every spy,
//! runs the pending command. Whatever happens it prints exactly one
//! response envelope on stdout.

use crate::autoload::{Autoloader, SourceAutoloader};
use crate::codegen::generate_class;
use crate::exit_codes::ExitCode;
use crate::logging::init_logging;
use crate::protocol::{find_startup_arg, Response};
use crate::runtime::{ClassOrigin, HostCatalog, Runtime};
use crate::state::{MockTable, SandboxState};
use ms_common::{Failure, FailureKind};
use ms_config::resolve_config;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::{debug, error, info, info_span};

/// Executes one sandbox state against a host catalog.
pub struct ChildRuntime<A: Autoloader = SourceAutoloader> {
    catalog: HostCatalog,
    autoloader: A,
}

impl ChildRuntime<SourceAutoloader> {
    pub fn new(catalog: HostCatalog) -> Self {
        ChildRuntime {
            catalog,
            autoloader: SourceAutoloader,
        }
    }
}

impl<A: Autoloader> ChildRuntime<A> {
    pub fn with_autoloader(catalog: HostCatalog, autoloader: A) -> Self {
        ChildRuntime {
            catalog,
            autoloader,
        }
    }

    /// Find the state among `args`, execute it, and build the envelope.
    pub fn respond<I, S>(self, flag: &str, args: I) -> (Response, ExitCode)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = match find_startup_arg(flag, args) {
            Ok(Some(state)) => state,
            Ok(None) => {
                let failure = Failure::new(
                    FailureKind::Protocol,
                    format!("missing startup argument {flag}=<state>"),
                );
                error!(%failure, "cannot start sandbox child");
                return (Response::failure(failure), ExitCode::ProtocolError);
            }
            Err(e) => {
                let failure = Failure::from(e);
                error!(%failure, "cannot decode sandbox state");
                return (Response::failure(failure), ExitCode::ProtocolError);
            }
        };

        match self.execute(state) {
            Ok(result) => (Response::success(result), ExitCode::Ok),
            Err(failure) => (Response::failure(failure), ExitCode::FailureEmitted),
        }
    }

    /// Run a decoded state. Panics are caught and reported as failures of
    /// kind `panic`.
    pub fn execute(self, state: SandboxState) -> Result<serde_json::Value, Failure> {
        let span = info_span!("sandbox_child", run_id = %state.run_id);
        let _enter = span.enter();
        let result = catch_panics(move || self.run(state));
        if let Err(failure) = &result {
            info!(kind = %failure.kind, origin = %failure.origin, "computation failed");
        }
        result
    }

    fn run(self, state: SandboxState) -> Result<serde_json::Value, Failure> {
        let SandboxState {
            pending,
            autoload_files,
            mocks,
            ..
        } = state;
        let mut runtime = Runtime::new(self.catalog).with_mocks(mocks.clone());

        load_mocks(&mut runtime, &mocks, false)?;
        for file in &autoload_files {
            self.autoloader.load(&mut runtime, file)?;
        }
        load_mocks(&mut runtime, &mocks, true)?;

        let command = pending.ok_or_else(|| {
            Failure::new(FailureKind::Protocol, "sandbox state carries no pending command")
        })?;
        let value = runtime.run_command(&command)?;
        Ok(value.to_json("sandbox result")?)
    }
}

fn load_mocks(runtime: &mut Runtime, mocks: &MockTable, spies: bool) -> Result<(), Failure> {
    let origin = if spies { ClassOrigin::Spy } else { ClassOrigin::Mock };
    for (class, spec) in mocks.iter().filter(|(_, spec)| spec.is_spy == spies) {
        let src = generate_class(class, spec)?;
        debug!(%class, %origin, "loading generated class");
        runtime.load_source(&src, origin.clone())?;
    }
    Ok(())
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static PANIC_ORIGIN: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Panics on a thread inside [`catch_panics`] record their location instead
/// of printing; everything else goes to the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let origin = info
                    .location()
                    .map(|loc| format!("{}:{}", loc.file(), loc.line()));
                PANIC_ORIGIN.with(|slot| *slot.borrow_mut() = origin);
            } else {
                previous(info);
            }
        }));
    });
}

fn catch_panics<T>(f: impl FnOnce() -> Result<T, Failure>) -> Result<T, Failure> {
    install_panic_hook();
    CAPTURING.with(|c| c.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|c| c.set(false));

    outcome.unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_string());
        let origin = PANIC_ORIGIN
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| "unknown".to_string());
        error!(%message, %origin, "panic inside sandbox");
        Err(Failure {
            kind: FailureKind::Panic,
            message,
            origin,
        })
    })
}

/// Entry point of a child host binary.
///
/// Resolves config from the environment the driver prepared, runs the
/// state from the process arguments, and prints the envelope.
pub fn host_main(catalog: HostCatalog) -> std::process::ExitCode {
    let (config, config_error) = match resolve_config(None) {
        Ok((config, _)) => (config, None),
        Err(e) => (Default::default(), Some(e)),
    };
    init_logging(&config.log);

    let (response, code) = match config_error {
        Some(e) => {
            let failure = Failure::new(FailureKind::Protocol, format!("child configuration: {e}"));
            (Response::failure(failure), ExitCode::ProtocolError)
        }
        None => {
            let args = std::env::args_os().map(|a| a.to_string_lossy().into_owned());
            ChildRuntime::new(catalog).respond(&config.startup_flag, args)
        }
    };

    let emitted = response.to_json_line().and_then(|line| {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    });
    match emitted {
        Ok(()) => code.into(),
        Err(e) => {
            error!(error = %e, "failed to emit response envelope");
            ExitCode::InternalError.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::protocol::startup_arg;
    use crate::registry::{MockRegistry, SELF_INSTANCE};
    use crate::runtime::{CallContext, NativeResult};
    use ms_common::{ClassName, Value};
    use serde_json::json;

    fn boom(_rt: &mut Runtime, _captured: &serde_json::Value) -> NativeResult {
        panic!("kaboom");
    }

    fn shout(rt: &mut Runtime, ctx: &CallContext, _args: Vec<Value>) -> NativeResult {
        let word = rt.get_const(&ctx.called_class, "WORD")?;
        Ok(Value::Str(format!("{}!", word.as_str().unwrap_or_default())))
    }

    fn catalog() -> HostCatalog {
        HostCatalog::with_builtins()
            .command("boom", boom)
            .native("t.shout", shout)
    }

    fn state(command: Command) -> SandboxState {
        let mut reg = MockRegistry::new(ClassName::parse("DB").unwrap());
        reg.mock_static_method("query", SELF_INSTANCE)
            .unwrap()
            .mock_method("rows", vec![1, 2])
            .unwrap();
        let mut state = SandboxState::new();
        state.mocks.insert(reg.class().clone(), reg.snapshot());
        state.pending = Some(command);
        state
    }

    #[test]
    fn test_runs_chain_against_mock() {
        let command = Command::call("DB", "query").then("rows").into();
        let result = ChildRuntime::new(catalog()).execute(state(command)).unwrap();
        assert_eq!(result, json!([1, 2]));
    }

    #[test]
    fn test_object_result_is_unsupported_value() {
        let command = Command::call("DB", "query").into();
        let failure = ChildRuntime::new(catalog()).execute(state(command)).unwrap_err();
        assert_eq!(failure.kind, FailureKind::UnsupportedValue);
    }

    #[test]
    fn test_panic_becomes_failure_with_origin() {
        let failure = ChildRuntime::new(catalog())
            .execute(state(Command::new("boom")))
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "kaboom");
        assert!(failure.origin.contains("child.rs"), "{}", failure.origin);
    }

    #[test]
    fn test_spy_loads_after_autoload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeter.cls");
        std::fs::write(
            &path,
            "class Greeter {\n    const WORD = 'hello';\n    static fn shout() => native('t.shout');\n}\n",
        )
        .unwrap();

        let mut reg = MockRegistry::new(ClassName::parse("Greeter").unwrap());
        reg.set_spy_namespace("Spy")
            .unwrap()
            .set_spy(true)
            .unwrap()
            .define_const("WORD", "bye")
            .unwrap();
        let mut state = SandboxState::new();
        state.mocks.insert(reg.class().clone(), reg.snapshot());
        state.merge_autoload_files([path]);
        state.pending = Some(Command::call("Spy::Greeter", "shout").into());

        let result = ChildRuntime::new(catalog()).execute(state).unwrap();
        assert_eq!(result, json!("bye!"));
    }

    #[test]
    fn test_missing_flag_is_protocol_error() {
        let (response, code) = ChildRuntime::new(catalog()).respond("--instance", ["child"]);
        assert_eq!(code, ExitCode::ProtocolError);
        assert!(matches!(
            response,
            Response::Throwed { throwed: FailureKind::Protocol, .. }
        ));
    }

    #[test]
    fn test_respond_round_trip() {
        let arg = startup_arg("--instance", &state(Command::read_const("DB", "NOPE"))).unwrap();
        let (response, code) = ChildRuntime::new(catalog()).respond("--instance", ["child".to_string(), arg]);
        assert_eq!(code, ExitCode::FailureEmitted);
        match response {
            Response::Throwed { throwed, message, .. } => {
                assert_eq!(throwed, FailureKind::Lookup);
                assert!(message.contains("DB::NOPE"), "{message}");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
