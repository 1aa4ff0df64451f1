use graphscript_core::graph::{TextAlignment, TextData, TextSize};
use mlua::Table;

use crate::error::ScriptError;
use crate::values::Fields;

pub(super) fn decode(table: &Table) -> Result<TextData, ScriptError> {
    let fields = Fields::new(table, "text");

    let size = match fields.opt_integer("size")? {
        None => TextSize::default(),
        Some(1) => TextSize::Small,
        Some(2) => TextSize::Medium,
        Some(3) => TextSize::Large,
        Some(other) => return Err(ScriptError::decode(format!("text size {other} must be 1, 2 or 3"))),
    };

    let alignment = match fields.opt_string("align")?.as_deref() {
        None => TextAlignment::default(),
        Some("start") => TextAlignment::Start,
        Some("center") | Some("centre") => TextAlignment::Center,
        Some("end") => TextAlignment::End,
        Some(other) => return Err(ScriptError::decode(format!("unknown text alignment '{other}'"))),
    };

    Ok(TextData {
        text: fields.opt_string("text")?,
        size,
        alignment,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{decode as decode_graph, test_support::eval};
    use graphscript_core::graph::{TextAlignment, TextData, TextSize};
    use graphscript_core::GraphResult;
    use mlua::Lua;

    fn text(src: &str) -> Result<TextData, String> {
        let lua = Lua::new();
        match decode_graph(&eval(&lua, src)) {
            Ok(GraphResult::Text(data)) => Ok(data),
            Ok(other) => Err(format!("wrong variant {other:?}")),
            Err(err) => Err(err.to_string()),
        }
    }

    #[test]
    fn defaults_are_medium_center() {
        let data = text("return graph.text('hello')").unwrap();
        assert_eq!(data.text.as_deref(), Some("hello"));
        assert_eq!(data.size, TextSize::Medium);
        assert_eq!(data.alignment, TextAlignment::Center);
    }

    #[test]
    fn numbers_and_nil_are_accepted() {
        assert_eq!(text("return graph.text(12)").unwrap().text.as_deref(), Some("12"));
        assert_eq!(text("return graph.text(nil)").unwrap().text, None);
    }

    #[test]
    fn table_form_and_british_spelling() {
        let data = text("return graph.text({ text = 'hi', size = graph.TEXT_SIZE.LARGE, align = 'centre' })").unwrap();
        assert_eq!(data.size, TextSize::Large);
        assert_eq!(data.alignment, TextAlignment::Center);
        let data = text("return { type = 'TEXT', text = 'x', size = 1, align = 'end' }").unwrap();
        assert_eq!((data.size, data.alignment), (TextSize::Small, TextAlignment::End));
    }

    #[test]
    fn out_of_range_values_fail() {
        assert!(text("return { type = 'TEXT', text = 'x', size = 4 }").is_err());
        assert!(text("return { type = 'TEXT', text = 'x', align = 'middle' }").is_err());
    }
}
