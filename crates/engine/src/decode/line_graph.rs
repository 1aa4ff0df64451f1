use graphscript_core::graph::{Line, LineGraphData, LinePoint, LinePointStyle, RangeBounds};
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::values::{sequence, time_from_value, type_name, Fields};

pub(super) fn decode(table: &Table) -> Result<LineGraphData, ScriptError> {
    let fields = Fields::new(table, "line graph");

    let lines = sequence(&fields.table("lines")?)?
        .iter()
        .enumerate()
        .map(|(i, value)| decode_line(i + 1, value))
        .collect::<Result<Vec<_>, _>>()?;
    if lines.is_empty() {
        return Err(ScriptError::decode("line graph has no lines"));
    }

    let range_bounds = match fields.get("range_bounds")? {
        Value::Nil => None,
        Value::Table(bounds) => {
            let bounds = Fields::new(&bounds, "range_bounds");
            Some(RangeBounds {
                min: bounds.opt_number("min")?,
                max: bounds.opt_number("max")?,
            })
        }
        other => {
            return Err(ScriptError::decode(format!(
                "range_bounds must be a table with min/max, got {}",
                type_name(&other)
            )))
        }
    };

    Ok(LineGraphData {
        lines,
        range_bounds,
        duration_based_range: fields.opt_bool("duration_based_range")?.unwrap_or(false),
    })
}

fn decode_line(index: usize, value: &Value) -> Result<Line, ScriptError> {
    let Value::Table(table) = value else {
        return Err(ScriptError::decode(format!(
            "line {index} must be a table, got {}",
            type_name(value)
        )));
    };
    let context = format!("line {index}");
    let fields = Fields::new(table, &context);

    let points = sequence(&fields.table("line_points")?)?
        .iter()
        .map(|point| decode_point(&context, point))
        .collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err(ScriptError::decode(format!("{context} has no points")));
    }

    let point_style = match fields.opt_string("point_style")? {
        None => None,
        Some(name) => Some(LinePointStyle::from_name(&name).ok_or_else(|| {
            ScriptError::decode(format!("{context}: unknown point style '{name}'"))
        })?),
    };

    Ok(Line {
        points,
        color: fields.opt_color("line_color")?,
        point_style,
        label: fields.opt_string("label")?,
    })
}

fn decode_point(context: &str, value: &Value) -> Result<LinePoint, ScriptError> {
    let Value::Table(table) = value else {
        return Err(ScriptError::decode(format!(
            "{context}: point must be a table, got {}",
            type_name(value)
        )));
    };
    let fields = Fields::new(table, context);
    if fields.get("timestamp")?.is_nil() {
        return Err(ScriptError::decode(format!("{context}: point has no timestamp")));
    }
    Ok(LinePoint {
        timestamp: time_from_value(value)?,
        value: fields.number("value")?,
    })
}
