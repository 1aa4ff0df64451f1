//! Construction of one sandboxed interpreter.
//!
//! Every interpreter gets the same treatment:
//! - host-escaping globals removed (`os`, `io`, `debug`, loaders)
//! - a host `require` that reads modules from the shared [`ModuleSource`]
//! - a per-VM module cache kept in the registry, cleared between leases
//! - the globals and shared library tables snapshotted once built, and
//!   restored from that snapshot between leases
//!
//! Scripts and modules each run in their own environment table whose
//! `__index` falls through to the VM globals, so nothing a script defines
//! at top level is visible to the next script on the same VM. Writes that
//! reach a shared table (`function string.split ...`) are undone by the
//! restore. The env, globals, library and string metatables are all
//! protected, so scripts can neither reach the real globals through
//! `getmetatable` nor swap a metatable the snapshot cannot see.

use std::sync::Arc;

use mlua::{Function, Lua, Table, Value};

use crate::error::ScriptError;
use crate::modules::{module_asset_name, ModuleSource};
use crate::time_api;

const LOADED_KEY: &str = "graphscript.loaded";
const NEW_ENV_KEY: &str = "graphscript.new_env";
const RESTORE_KEY: &str = "graphscript.restore";

/// Globals removed before any script runs.
const BLOCKED_GLOBALS: &[&str] = &[
    "os", "io", "debug", "package", "require", "loadfile", "dofile", "load",
];

/// Library tables shared by every script on a VM.
const SHARED_LIBRARIES: &[&str] = &["string", "math", "table", "coroutine", "utf8"];

const NEW_ENV_SOURCE: &str = r#"
local setmetatable = setmetatable
return function(globals)
    local env = setmetatable({}, { __index = globals, __metatable = false })
    env._G = env
    return env
end
"#;

// Locks metatables, then snapshots every shared table and returns the
// function that puts them back.
const ISOLATE_SOURCE: &str = r#"
local next, ipairs, type = next, ipairs, type
local rawget, rawset = rawget, rawset
local getmetatable, setmetatable = getmetatable, setmetatable
return function(globals, names)
    local shared = { globals }
    for _, name in ipairs(names) do
        local lib = rawget(globals, name)
        if type(lib) == "table" then
            shared[#shared + 1] = lib
        end
    end
    for _, t in ipairs(shared) do
        setmetatable(t, { __metatable = false })
    end
    local string_meta = getmetatable("")
    string_meta.__metatable = false
    shared[#shared + 1] = string_meta

    local saved = {}
    for _, t in ipairs(shared) do
        local copy = {}
        for k, v in next, t do
            copy[k] = v
        end
        saved[t] = copy
    end

    return function()
        for t, copy in next, saved do
            for k in next, t do
                if copy[k] == nil then
                    rawset(t, k, nil)
                end
            end
            for k, v in next, copy do
                if rawget(t, k) ~= v then
                    rawset(t, k, v)
                end
            end
        end
    end
end
"#;

/// Build a sandboxed interpreter. With `verify_assets`, every module asset
/// is compiled once so a broken install fails here instead of mid-script.
pub(crate) fn build_vm(
    modules: &Arc<dyn ModuleSource>,
    verify_assets: bool,
) -> Result<Lua, ScriptError> {
    let lua = Lua::new();
    sandbox(&lua, Arc::clone(modules)).map_err(|e| ScriptError::Bootstrap(e.to_string()))?;

    if verify_assets {
        for asset in modules.asset_names() {
            let source = modules
                .read_asset(&asset)
                .map_err(|e| ScriptError::Bootstrap(format!("{asset}: {e}")))?
                .ok_or_else(|| ScriptError::Bootstrap(format!("{asset}: listed but unreadable")))?;
            lua.load(source)
                .set_name(format!("@{asset}"))
                .into_function()
                .map_err(|e| ScriptError::Bootstrap(format!("{asset}: {e}")))?;
        }
    }

    Ok(lua)
}

fn sandbox(lua: &Lua, modules: Arc<dyn ModuleSource>) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals.set(*name, Value::Nil)?;
    }

    let new_env: Function = lua.load(NEW_ENV_SOURCE).set_name("=env").call(())?;
    lua.set_named_registry_value(NEW_ENV_KEY, new_env)?;
    reset_module_cache(lua)?;

    let require = lua.create_function(move |lua, name: String| require_module(lua, &*modules, &name))?;
    globals.set("require", require)?;

    // Last, so the snapshot sees the finished sandbox
    let isolate: Function = lua.load(ISOLATE_SOURCE).set_name("=isolate").call(())?;
    let restore: Function = isolate.call((globals, SHARED_LIBRARIES.to_vec()))?;
    lua.set_named_registry_value(RESTORE_KEY, restore)
}

fn require_module(lua: &Lua, modules: &dyn ModuleSource, name: &str) -> mlua::Result<Value> {
    let loaded: Table = lua.named_registry_value(LOADED_KEY)?;
    let cached: Value = loaded.get(name)?;
    if !cached.is_nil() {
        return Ok(cached);
    }

    let value = match time_api::native_module(lua, name)? {
        Some(native) => Value::Table(native),
        None => {
            let asset = module_asset_name(name);
            let source = modules
                .read_asset(&asset)
                .map_err(|e| mlua::Error::RuntimeError(format!("module '{name}': {e}")))?
                .ok_or_else(|| mlua::Error::RuntimeError(format!("module '{name}' not found")))?;
            log::debug!("loading module {name}");
            let value: Value = lua
                .load(source)
                .set_name(format!("@{asset}"))
                .set_environment(new_env(lua)?)
                .call(())?;
            if value.is_nil() {
                Value::Boolean(true)
            } else {
                value
            }
        }
    };

    loaded.set(name, value.clone())?;
    Ok(value)
}

/// Fresh environment table reading through to the VM globals.
pub(crate) fn new_env(lua: &Lua) -> mlua::Result<Table> {
    let factory: Function = lua.named_registry_value(NEW_ENV_KEY)?;
    factory.call(lua.globals())
}

/// Forget every required module, so the next lease re-runs them.
pub(crate) fn reset_module_cache(lua: &Lua) -> mlua::Result<()> {
    lua.set_named_registry_value(LOADED_KEY, lua.create_table()?)
}

/// Return the VM to its freshly built state: module cache cleared, globals
/// and library tables back to their snapshot.
pub(crate) fn reset_lease_state(lua: &Lua) -> mlua::Result<()> {
    reset_module_cache(lua)?;
    let restore: Function = lua.named_registry_value(RESTORE_KEY)?;
    restore.call(())
}
