//! Turns script text into a value inside a leased interpreter.
//!
//! The chunk runs in a fresh environment table, so top-level assignments
//! and `require` results stay with this script. Both syntax errors and
//! failures while evaluating the chunk (a missing module, an error at top
//! level) are resolution failures tagged with the script text.

use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::pool::VmLease;
use crate::vm;

/// What a script's chunk evaluated to, plus the environment it ran in.
#[derive(Debug, Clone)]
pub struct ResolvedScript {
    pub value: Value,
    pub env: Table,
}

pub fn resolve(script: &str, lease: &VmLease) -> Result<ResolvedScript, ScriptError> {
    let lua = lease.lua();
    let env = vm::new_env(lua).map_err(|e| ScriptError::resolution(script, e))?;

    let chunk = lua
        .load(script)
        .set_name("=script")
        .set_environment(env.clone())
        .into_function()
        .map_err(|e| ScriptError::resolution(script, e))?;

    let value = chunk
        .call::<Value>(())
        .map_err(|e| ScriptError::resolution(script, e))?;

    Ok(ResolvedScript { value, env })
}
