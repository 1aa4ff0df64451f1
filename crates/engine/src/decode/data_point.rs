use graphscript_core::graph::DataPointData;
use mlua::Table;

use crate::error::ScriptError;
use crate::values::{data_point_from_value, Fields};

pub(super) fn decode(table: &Table) -> Result<DataPointData, ScriptError> {
    let fields = Fields::new(table, "data point graph");
    let point = match fields.get("datapoint")? {
        mlua::Value::Nil => return Err(ScriptError::decode("data point graph has no 'datapoint'")),
        value => data_point_from_value(&value)?,
    };
    Ok(DataPointData {
        point,
        is_duration: fields.opt_bool("isduration")?.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::super::{decode as decode_graph, test_support::eval};
    use graphscript_core::GraphResult;
    use mlua::Lua;

    #[test]
    fn decodes_point_and_flag() {
        let lua = Lua::new();
        let result = decode_graph(&eval(
            &lua,
            r#"return graph.data_point({
                datapoint = { timestamp = 60000, value = 90, label = "nap", note = "sofa" },
                isduration = true,
            })"#,
        ))
        .unwrap();
        let GraphResult::DataPoint(data) = result else { panic!("expected data point") };
        assert!(data.is_duration);
        assert_eq!(data.point.value, 90.0);
        assert_eq!(data.point.label, "nap");
        assert_eq!(data.point.note, "sofa");
    }

    #[test]
    fn datapoint_is_required() {
        let lua = Lua::new();
        assert!(decode_graph(&eval(&lua, "return { type = 'DATA_POINT' }")).is_err());
        assert!(decode_graph(&eval(&lua, "return { type = 'DATA_POINT', datapoint = { value = 1 } }")).is_err());
    }
}
