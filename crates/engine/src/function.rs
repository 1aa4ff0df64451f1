//! Lazy output of a function script.
//!
//! The generator runs as a Lua coroutine inside the lease. Each host
//! `next()` resumes it exactly once; a yielded table is one output point,
//! a yielded nil or the coroutine finishing ends the sequence. A generator
//! that returns a function instead of yielding is treated as an iterator:
//! that function is called once per `next()` until it returns nil.
//!
//! Dropping the output part-way is cancellation: the coroutine is simply
//! never resumed again, the data sources are disposed and the lease goes
//! back to the pool.

use std::fmt;

use graphscript_core::DataPoint;
use mlua::{Function, Table, Thread, ThreadStatus, Value};

use crate::bridge::SharedCursor;
use crate::error::ScriptError;
use crate::pool::VmLease;
use crate::values::data_point_from_value;

enum Generator {
    Coroutine {
        thread: Thread,
        /// `(sources, config)` for the first resume.
        start: Option<(Table, Table)>,
    },
    Iterator(Function),
    Done,
}

enum Step {
    Yielded(Value),
    Returned(Value),
}

// Field order is drop order: interpreter handles, then sources, then the
// lease itself.
pub struct FunctionOutput {
    generator: Generator,
    cursors: Vec<SharedCursor>,
    lease: VmLease,
}

impl FunctionOutput {
    pub(crate) fn new(thread: Thread, sources: Table, config: Table, cursors: Vec<SharedCursor>, lease: VmLease) -> Self {
        Self {
            generator: Generator::Coroutine { thread, start: Some((sources, config)) },
            cursors,
            lease,
        }
    }

    /// Name of the interpreter this output runs on.
    pub fn vm_name(&self) -> &str {
        self.lease.name()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.generator, Generator::Done)
    }

    fn step(&mut self) -> Result<Option<Step>, ScriptError> {
        match &mut self.generator {
            Generator::Done => Ok(None),
            Generator::Coroutine { thread, start } => {
                let value: Value = match start.take() {
                    Some(args) => thread.resume(args)?,
                    None => thread.resume(())?,
                };
                if matches!(thread.status(), ThreadStatus::Resumable) {
                    Ok(Some(Step::Yielded(value)))
                } else {
                    Ok(Some(Step::Returned(value)))
                }
            }
            Generator::Iterator(f) => Ok(Some(Step::Yielded(f.call::<Value>(())?))),
        }
    }

    fn finish(&mut self) {
        self.generator = Generator::Done;
        for cursor in &self.cursors {
            cursor.lock().dispose();
        }
    }
}

impl Iterator for FunctionOutput {
    type Item = Result<DataPoint, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step() {
                Ok(None) => return None,
                Ok(Some(Step::Yielded(Value::Nil))) | Ok(Some(Step::Returned(Value::Nil))) => {
                    self.finish();
                    return None;
                }
                Ok(Some(Step::Yielded(value))) => {
                    return match data_point_from_value(&value) {
                        Ok(point) => Some(Ok(point)),
                        Err(err) => {
                            self.finish();
                            Some(Err(err))
                        }
                    };
                }
                Ok(Some(Step::Returned(Value::Function(iterator)))) => {
                    self.generator = Generator::Iterator(iterator);
                }
                Ok(Some(Step::Returned(_))) => {
                    self.finish();
                    return None;
                }
                Err(err) => {
                    log::error!("function script failed on {}: {err}", self.lease.name());
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
    }
}

impl Drop for FunctionOutput {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for FunctionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionOutput")
            .field("vm", &self.lease.name())
            .field("finished", &self.is_finished())
            .finish()
    }
}
