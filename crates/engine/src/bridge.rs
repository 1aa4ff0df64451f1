//! Data source bridge.
//!
//! Exposes a host [`RawDataSample`] to scripts as a table of four plain
//! functions:
//!
//! | Lua               | Returns                                         |
//! |-------------------|-------------------------------------------------|
//! | `source.dp()`     | next point or nil                               |
//! | `source.dpbatch(n)` | up to n next points                           |
//! | `source.dpall()`  | every remaining point                           |
//! | `source.dpafter(t)` | remaining points newer than `t`               |
//!
//! Feeds arrive newest first. `dpafter` is a take-while: it has to pull the
//! first point that fails the predicate to know it is done. That point is
//! parked in a one-slot look-ahead so the next call still sees it. No call
//! pulls more from the host iterator than it needs.

use std::sync::Arc;

use graphscript_core::{DataPoint, RawDataSample};
use mlua::{Lua, Table, Value};
use parking_lot::Mutex;

use crate::values::{as_number, data_point_to_table, time_from_value};

/// Forward-only reader over one sample, with a single look-ahead slot.
#[derive(Debug)]
pub struct SourceCursor {
    sample: RawDataSample,
    peeked: Option<DataPoint>,
}

impl SourceCursor {
    pub fn new(sample: RawDataSample) -> Self {
        Self { sample, peeked: None }
    }

    pub fn next_point(&mut self) -> Option<DataPoint> {
        self.peeked.take().or_else(|| self.sample.next())
    }

    pub fn batch(&mut self, n: usize) -> Vec<DataPoint> {
        let mut out = Vec::with_capacity(n.min(1024));
        while out.len() < n {
            match self.next_point() {
                Some(point) => out.push(point),
                None => break,
            }
        }
        out
    }

    pub fn all(&mut self) -> Vec<DataPoint> {
        std::iter::from_fn(|| self.next_point()).collect()
    }

    /// Points strictly newer than `cutoff_millis`, stopping at the first
    /// one that is not.
    pub fn after(&mut self, cutoff_millis: i64) -> Vec<DataPoint> {
        let mut out = Vec::new();
        while let Some(point) = self.next_point() {
            if point.epoch_millis() > cutoff_millis {
                out.push(point);
            } else {
                self.peeked = Some(point);
                break;
            }
        }
        out
    }

    pub fn visited(&self) -> usize {
        self.sample.visited()
    }

    pub fn dispose(&mut self) {
        self.peeked = None;
        self.sample.dispose();
    }
}

/// Cursor shared between the Lua closures and the execution that owns it.
pub type SharedCursor = Arc<Mutex<SourceCursor>>;

pub fn shared_cursor(sample: RawDataSample) -> SharedCursor {
    Arc::new(Mutex::new(SourceCursor::new(sample)))
}

/// Build the script-facing table for one data source.
pub fn source_table(lua: &Lua, name: &str, cursor: &SharedCursor) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("name", name)?;

    let c = Arc::clone(cursor);
    table.set(
        "dp",
        lua.create_function(move |lua, ()| match c.lock().next_point() {
            Some(point) => Ok(Value::Table(data_point_to_table(lua, &point)?)),
            None => Ok(Value::Nil),
        })?,
    )?;

    let c = Arc::clone(cursor);
    table.set(
        "dpbatch",
        lua.create_function(move |lua, n: Value| {
            let n = as_number(&n)
                .ok_or_else(|| mlua::Error::RuntimeError("dpbatch expects a count".into()))?;
            let n = if n <= 0.0 { 0 } else { n as usize };
            let points = c.lock().batch(n);
            point_list(lua, &points)
        })?,
    )?;

    let c = Arc::clone(cursor);
    table.set(
        "dpall",
        lua.create_function(move |lua, ()| {
            let points = c.lock().all();
            point_list(lua, &points)
        })?,
    )?;

    let c = Arc::clone(cursor);
    table.set(
        "dpafter",
        lua.create_function(move |lua, cutoff: Value| {
            let cutoff = time_from_value(&cutoff).map_err(mlua::Error::external)?;
            let points = c.lock().after(cutoff.timestamp_millis());
            point_list(lua, &points)
        })?,
    )?;

    Ok(table)
}

fn point_list(lua: &Lua, points: &[DataPoint]) -> mlua::Result<Table> {
    let list = lua.create_table()?;
    for (i, point) in points.iter().enumerate() {
        list.raw_set(i + 1, data_point_to_table(lua, point)?)?;
    }
    Ok(list)
}
