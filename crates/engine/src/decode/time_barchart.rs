use graphscript_core::graph::{BarSegment, BarWidth, Period, TimeBarChartData};
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::values::{as_number, sequence, type_name, Fields};

pub(super) fn decode(table: &Table) -> Result<TimeBarChartData, ScriptError> {
    let fields = Fields::new(table, "time bar chart");

    let bars = sequence(&fields.table("bars")?)?
        .iter()
        .enumerate()
        .map(|(i, value)| decode_bar(i + 1, value))
        .collect::<Result<Vec<_>, _>>()?;
    if bars.is_empty() {
        return Err(ScriptError::decode("time bar chart has no bars"));
    }

    Ok(TimeBarChartData {
        bars,
        end_time: fields.time("end_time")?,
        bar_width: decode_width(&fields)?,
        y_max: fields.opt_number("y_max")?,
        duration_based_range: fields.opt_bool("duration_based_range")?.unwrap_or(false),
    })
}

/// `bar_duration` (millis) wins over `bar_period` and its multiple.
fn decode_width(fields: &Fields<'_>) -> Result<BarWidth, ScriptError> {
    if let Some(millis) = fields.opt_integer("bar_duration")? {
        if millis <= 0 {
            return Err(ScriptError::decode("bar_duration must be positive"));
        }
        return Ok(BarWidth::Millis(millis));
    }

    let name = fields
        .opt_string("bar_period")?
        .ok_or_else(|| ScriptError::decode("time bar chart needs bar_duration or bar_period"))?;
    let period = Period::from_name(&name)
        .ok_or_else(|| ScriptError::decode(format!("unknown bar_period '{name}'")))?;
    let multiple = match fields.opt_integer("bar_period_multiple")? {
        None => 1,
        Some(m) if m >= 1 && m <= u32::MAX as i64 => m as u32,
        Some(m) => return Err(ScriptError::decode(format!("bar_period_multiple {m} must be at least 1"))),
    };
    Ok(BarWidth::Period { period, multiple })
}

/// A bar is a number, one segment table, or a list of segment tables.
fn decode_bar(index: usize, value: &Value) -> Result<Vec<BarSegment>, ScriptError> {
    let context = format!("bar {index}");
    if let Some(number) = as_number(value) {
        return Ok(vec![BarSegment { value: number, label: None, color: None }]);
    }
    let Value::Table(table) = value else {
        return Err(ScriptError::decode(format!(
            "{context} must be a number or a table, got {}",
            type_name(value)
        )));
    };

    if !table.get::<Value>("value")?.is_nil() {
        return Ok(vec![decode_segment(&context, table)?]);
    }

    let segments = sequence(table)?;
    if segments.is_empty() {
        return Err(ScriptError::decode(format!("{context} has no segments")));
    }
    segments
        .iter()
        .map(|segment| match segment {
            Value::Table(t) => decode_segment(&context, t),
            other => Err(ScriptError::decode(format!(
                "{context}: segment must be a table, got {}",
                type_name(other)
            ))),
        })
        .collect()
}

fn decode_segment(context: &str, table: &Table) -> Result<BarSegment, ScriptError> {
    let fields = Fields::new(table, context);
    Ok(BarSegment {
        value: fields.number("value")?,
        label: fields.opt_string("label")?,
        color: fields.opt_color("color")?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{decode as decode_graph, test_support::eval};
    use graphscript_core::graph::{BarWidth, Period, TimeBarChartData};
    use graphscript_core::GraphResult;
    use mlua::Lua;

    fn chart(src: &str) -> Result<TimeBarChartData, String> {
        let lua = Lua::new();
        match decode_graph(&eval(&lua, src)) {
            Ok(GraphResult::TimeBarChart(data)) => Ok(data),
            Ok(other) => Err(format!("wrong variant {other:?}")),
            Err(err) => Err(err.to_string()),
        }
    }

    #[test]
    fn mixed_bar_shapes() {
        let data = chart(
            r#"return {
                type = "TIME_BARCHART",
                end_time = { timestamp = 86400000, offset = 0 },
                bar_period = "WEEK",
                bar_period_multiple = 2,
                bars = {
                    4,
                    { value = 2, label = "a", color = 3 },
                    { { value = 1, label = "x" }, { value = 2, label = "y" } },
                },
            }"#,
        )
        .unwrap();
        assert_eq!(data.bars.len(), 3);
        assert_eq!(data.bars[0][0].value, 4.0);
        assert_eq!(data.bars[1][0].label.as_deref(), Some("a"));
        assert_eq!(data.bars[2].len(), 2);
        assert_eq!(data.bar_width, BarWidth::Period { period: Period::Week, multiple: 2 });
        assert_eq!(data.end_time.timestamp_millis(), 86_400_000);
    }

    #[test]
    fn duration_wins_over_period() {
        let data = chart(
            r#"return graph.time_barchart({
                end_time = 0, bar_duration = 3600000, bar_period = "DAY", bars = { 1 },
            })"#,
        )
        .unwrap();
        assert_eq!(data.bar_width, BarWidth::Millis(3_600_000));
        assert!(!data.duration_based_range);
    }

    #[test]
    fn width_and_end_time_are_required() {
        assert!(chart(r#"return { type = "TIME_BARCHART", end_time = 0, bars = { 1 } }"#).is_err());
        assert!(chart(r#"return { type = "TIME_BARCHART", bar_duration = 10, bars = { 1 } }"#).is_err());
        assert!(chart(r#"return { type = "TIME_BARCHART", end_time = 0, bar_duration = 10, bars = {} }"#).is_err());
        assert!(chart(r#"return { type = "TIME_BARCHART", end_time = 0, bar_period = "DECADE", bars = { 1 } }"#).is_err());
    }
}
