use graphscript_core::graph::{PieChartData, PieSegment};
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::values::{sequence, type_name, Fields};

pub(super) fn decode(table: &Table) -> Result<PieChartData, ScriptError> {
    let fields = Fields::new(table, "pie chart");
    let segments = sequence(&fields.table("segments")?)?
        .iter()
        .enumerate()
        .map(|(i, value)| decode_segment(i + 1, value))
        .collect::<Result<Vec<_>, _>>()?;
    if segments.is_empty() {
        return Err(ScriptError::decode("pie chart has no segments"));
    }
    Ok(PieChartData { segments })
}

fn decode_segment(index: usize, value: &Value) -> Result<PieSegment, ScriptError> {
    let Value::Table(table) = value else {
        return Err(ScriptError::decode(format!(
            "segment {index} must be a table, got {}",
            type_name(value)
        )));
    };
    let context = format!("segment {index}");
    let fields = Fields::new(table, &context);
    let value = fields.number("value")?;
    if value < 0.0 {
        return Err(ScriptError::decode(format!("{context}: value must not be negative")));
    }
    Ok(PieSegment {
        value,
        label: fields.string("label")?,
        color: fields.opt_color("color")?,
    })
}
