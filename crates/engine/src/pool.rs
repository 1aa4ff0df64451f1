//! Bounded pool of interpreters.
//!
//! The pool is the only place interpreters are created or destroyed, and
//! the only synchronization point for script execution. A caller gets
//! exclusive use of one interpreter through a [`VmLease`]; the interpreter
//! goes back to the pool when the lease is released or dropped, so it is
//! returned exactly once on every exit path.
//!
//! # Fairness
//!
//! Waiters are served in arrival order using a ticket counter: a caller may
//! only take an interpreter when its ticket is the one being served.
//!
//! # Growth
//!
//! The first interpreter is built when the pool is created, with every
//! module asset compiled as a bootstrap check. Further interpreters are
//! built lazily, only when no idle one exists and the pool is below its
//! bound.

use std::fmt;
use std::sync::Arc;

use mlua::Lua;
use parking_lot::{Condvar, Mutex};

use crate::error::ScriptError;
use crate::modules::ModuleSource;
use crate::vm;

struct IdleVm {
    name: String,
    lua: Lua,
}

struct PoolState {
    idle: Vec<IdleVm>,
    /// Interpreters alive, idle or leased, including ones being built.
    created: usize,
    next_ticket: u64,
    serving: u64,
}

struct PoolShared {
    modules: Arc<dyn ModuleSource>,
    max_size: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Cloneable handle to a shared interpreter pool.
#[derive(Clone)]
pub struct VmPool {
    shared: Arc<PoolShared>,
}

impl VmPool {
    /// Build the pool and its first interpreter. Fails when the module
    /// assets cannot be compiled; the runtime is unusable in that case.
    pub fn new(modules: Arc<dyn ModuleSource>, max_size: usize) -> Result<Self, ScriptError> {
        let max_size = max_size.max(1);
        let first = vm::build_vm(&modules, true)?;
        log::debug!("vm pool ready (max {max_size})");

        Ok(Self {
            shared: Arc::new(PoolShared {
                modules,
                max_size,
                state: Mutex::new(PoolState {
                    idle: vec![IdleVm { name: vm_name(0), lua: first }],
                    created: 1,
                    next_ticket: 0,
                    serving: 0,
                }),
                available: Condvar::new(),
            }),
        })
    }

    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    /// Interpreters built so far.
    pub fn created(&self) -> usize {
        self.shared.state.lock().created
    }

    pub fn idle(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    pub fn modules(&self) -> &Arc<dyn ModuleSource> {
        &self.shared.modules
    }

    /// Block until an interpreter is free, then lease it.
    pub fn acquire(&self) -> Result<VmLease, ScriptError> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while ticket != state.serving
            || (state.idle.is_empty() && state.created >= shared.max_size)
        {
            shared.available.wait(&mut state);
        }
        state.serving += 1;

        if let Some(IdleVm { name, lua }) = state.idle.pop() {
            drop(state);
            shared.available.notify_all();
            log::debug!("lease {name} (reused)");
            return Ok(VmLease::new(Arc::clone(shared), name, lua));
        }

        // Reserve a slot and build outside the lock
        let index = state.created;
        state.created += 1;
        drop(state);
        shared.available.notify_all();

        match vm::build_vm(&shared.modules, false) {
            Ok(lua) => {
                let name = vm_name(index);
                log::debug!("lease {name} (new)");
                Ok(VmLease::new(Arc::clone(shared), name, lua))
            }
            Err(err) => {
                log::error!("interpreter construction failed: {err}");
                shared.state.lock().created -= 1;
                shared.available.notify_all();
                Err(err)
            }
        }
    }

    /// Give a lease back. Equivalent to dropping it.
    pub fn release(&self, lease: VmLease) {
        drop(lease);
    }
}

impl fmt::Debug for VmPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("VmPool")
            .field("max_size", &self.shared.max_size)
            .field("created", &state.created)
            .field("idle", &state.idle.len())
            .finish()
    }
}

fn vm_name(index: usize) -> String {
    format!("VM-{index}")
}

/// Exclusive use of one pooled interpreter.
///
/// The lease owns the interpreter while held. Releasing consumes the lease,
/// so a double release does not compile.
pub struct VmLease {
    shared: Arc<PoolShared>,
    name: String,
    lua: Option<Lua>,
}

impl VmLease {
    fn new(shared: Arc<PoolShared>, name: String, lua: Lua) -> Self {
        Self { shared, name, lua: Some(lua) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lua(&self) -> &Lua {
        match &self.lua {
            Some(lua) => lua,
            // Only taken in Drop
            None => unreachable!("lease used after release"),
        }
    }

    pub fn modules(&self) -> &Arc<dyn ModuleSource> {
        &self.shared.modules
    }
}

impl Drop for VmLease {
    fn drop(&mut self) {
        let Some(lua) = self.lua.take() else { return };

        // Scrub per-lease state before anyone else sees this interpreter
        let scrubbed = vm::reset_lease_state(&lua).and_then(|_| lua.gc_collect());
        let mut state = self.shared.state.lock();
        match scrubbed {
            Ok(()) => {
                log::debug!("release {}", self.name);
                state.idle.push(IdleVm { name: std::mem::take(&mut self.name), lua });
            }
            Err(err) => {
                log::warn!("discarding {} after failed reset: {err}", self.name);
                state.created -= 1;
            }
        }
        drop(state);
        self.shared.available.notify_all();
    }
}

impl fmt::Debug for VmLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmLease").field("name", &self.name).finish()
    }
}
