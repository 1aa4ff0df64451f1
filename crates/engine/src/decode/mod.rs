//! Graph result decoding.
//!
//! A graph script returns a loosely-typed table; this module turns it into
//! a [`GraphResult`] or a decode error. The `type` field picks exactly one
//! decoder. Unknown tags and missing required fields are errors, never
//! guessed defaults.

mod data_point;
mod line_graph;
mod pie_chart;
mod text;
mod time_barchart;

use graphscript_core::GraphResult;
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::values::{type_name, Fields};

/// Discriminator key in every graph result table.
pub const TYPE_KEY: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphType {
    LineGraph,
    PieChart,
    TimeBarChart,
    Text,
    DataPoint,
}

impl GraphType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LINE_GRAPH" => Some(Self::LineGraph),
            "PIE_CHART" => Some(Self::PieChart),
            "TIME_BARCHART" => Some(Self::TimeBarChart),
            "TEXT" => Some(Self::Text),
            "DATA_POINT" => Some(Self::DataPoint),
            _ => None,
        }
    }
}

pub fn decode(value: &Value) -> Result<GraphResult, ScriptError> {
    let table = match value {
        Value::Table(table) => table,
        other => {
            return Err(ScriptError::decode(format!(
                "graph script must return a table, got {}",
                type_name(other)
            )))
        }
    };

    let tag = Fields::new(table, "graph")
        .opt_string(TYPE_KEY)?
        .ok_or_else(|| ScriptError::decode("graph table has no 'type'"))?;
    let graph_type = GraphType::from_tag(&tag)
        .ok_or_else(|| ScriptError::decode(format!("unknown graph type '{tag}'")))?;

    decode_as(graph_type, table)
}

fn decode_as(graph_type: GraphType, table: &Table) -> Result<GraphResult, ScriptError> {
    match graph_type {
        GraphType::LineGraph => line_graph::decode(table).map(GraphResult::LineGraph),
        GraphType::PieChart => pie_chart::decode(table).map(GraphResult::PieChart),
        GraphType::TimeBarChart => time_barchart::decode(table).map(GraphResult::TimeBarChart),
        GraphType::Text => text::decode(table).map(GraphResult::Text),
        GraphType::DataPoint => data_point::decode(table).map(GraphResult::DataPoint),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use mlua::{Lua, Value};

    /// Evaluate a Lua expression in a plain interpreter with the graph
    /// module's constants available as `graph`.
    pub fn eval(lua: &Lua, source: &str) -> Value {
        let graph: Value = lua
            .load(include_str!("../../lua/tng/graph.lua"))
            .eval()
            .unwrap();
        lua.globals().set("graph", graph).unwrap();
        lua.load(source).eval().unwrap()
    }
}
