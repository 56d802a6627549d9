//! Built-in commands and callbacks every host gets from
//! [`HostCatalog::with_builtins`].

use super::{HostCatalog, NativeResult, Runtime};
use crate::command::{self, CallPlan, MemberRef};
use ms_common::{ClassName, Failure, FailureKind, Value};
use ms_common::failure::origin_of;
use serde::de::DeserializeOwned;
use std::panic::Location;

pub(super) fn register(catalog: HostCatalog) -> HostCatalog {
    catalog
        .command(command::CALL, call)
        .command(command::READ_CONST, read_const)
        .command(command::READ_STATIC, read_static)
        .command(command::READ_PROPERTY, read_property)
        .callback("return_receiver", return_receiver)
        .callback("return_args", return_args)
        .callback("return_captured", return_captured)
}

/// Decode captured command input. A failure points at the caller.
#[track_caller]
pub fn decode_captured<T: DeserializeOwned>(what: &str, captured: &serde_json::Value) -> Result<T, Failure> {
    let caller = Location::caller();
    serde_json::from_value(captured.clone()).map_err(|e| {
        Failure::new(
            FailureKind::InvalidArgument,
            format!("malformed input for {what}: {e}"),
        )
        .with_origin(origin_of(caller))
    })
}

fn values(args: &[serde_json::Value]) -> ms_common::Result<Vec<Value>> {
    args.iter().map(|arg| Value::from_json(arg, "call argument")).collect()
}

fn call(rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let plan: CallPlan = decode_captured("call", captured)?;
    let class = ClassName::parse(&plan.class)?;
    let mut value = rt.call_static(&class, &plan.method, values(&plan.args)?)?;
    for step in plan.chain {
        value = rt.call(&value, &step.method, values(&step.args)?)?;
    }
    Ok(value)
}

fn member(captured: &serde_json::Value, what: &str) -> Result<(ClassName, String), Failure> {
    let member: MemberRef = decode_captured(what, captured)?;
    Ok((ClassName::parse(&member.class)?, member.name))
}

fn read_const(rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let (class, name) = member(captured, "const")?;
    rt.get_const(&class, &name)
}

fn read_static(rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let (class, name) = member(captured, "static")?;
    rt.get_static(&class, &name)
}

fn read_property(rt: &mut Runtime, captured: &serde_json::Value) -> NativeResult {
    let (class, name) = member(captured, "property")?;
    let obj = rt.instantiate(&class)?;
    rt.get_property(obj, &name)
}

fn return_receiver(
    _rt: &mut Runtime,
    receiver: Value,
    _args: Vec<Value>,
    _captured: &serde_json::Value,
) -> NativeResult {
    Ok(receiver)
}

fn return_args(
    _rt: &mut Runtime,
    _receiver: Value,
    args: Vec<Value>,
    _captured: &serde_json::Value,
) -> NativeResult {
    Ok(Value::List(args))
}

fn return_captured(
    _rt: &mut Runtime,
    _receiver: Value,
    _args: Vec<Value>,
    captured: &serde_json::Value,
) -> NativeResult {
    Ok(Value::from_json(captured, "captured value")?)
}
