//! Native `tng.time` module: clock and calendar helpers.
//!
//! Scripts have no `os` library, so this is their only clock. Times are
//! `{ timestamp = epoch millis, offset = utc offset seconds }` tables.

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, LocalResult, Months, NaiveDate, Offset, TimeZone,
    Timelike,
};
use graphscript_core::graph::Period;
use mlua::{Lua, Table, Value, Variadic};

use crate::values::{as_integer, as_number, lua_string, time_from_value, time_to_table, Fields};

pub const MODULE_NAME: &str = "tng.time";

/// Native modules by name; `None` for anything that must come from assets.
pub(crate) fn native_module(lua: &Lua, name: &str) -> mlua::Result<Option<Table>> {
    if name != MODULE_NAME {
        return Ok(None);
    }

    let module = lua.create_table()?;

    module.set(
        "now",
        lua.create_function(|lua, ()| time_to_table(lua, &now()))?,
    )?;

    module.set(
        "time",
        lua.create_function(|lua, date: Option<Table>| {
            let time = match date {
                None => now(),
                Some(date) => time_from_date(&date).map_err(mlua::Error::RuntimeError)?,
            };
            time_to_table(lua, &time)
        })?,
    )?;

    module.set(
        "date",
        lua.create_function(|lua, time: Option<Value>| {
            let time = match time {
                None | Some(Value::Nil) => now(),
                Some(value) => time_from_value(&value).map_err(mlua::Error::external)?,
            };
            date_table(lua, &time)
        })?,
    )?;

    module.set(
        "shift",
        lua.create_function(|lua, (time, unit, amount): (Value, Value, Option<i64>)| {
            let time = time_from_value(&time).map_err(mlua::Error::external)?;
            let shifted = shift(&time, &unit, amount.unwrap_or(1)).map_err(mlua::Error::RuntimeError)?;
            time_to_table(lua, &shifted)
        })?,
    )?;

    module.set(
        "format",
        lua.create_function(|_, (time, pattern): (Value, String)| {
            let time = time_from_value(&time).map_err(mlua::Error::external)?;
            format(&time, &pattern).map_err(mlua::Error::RuntimeError)
        })?,
    )?;

    module.set(
        "offset",
        lua.create_function(|_, args: Variadic<Value>| {
            let time = match args.first() {
                None | Some(Value::Nil) => now(),
                Some(value) => time_from_value(value).map_err(mlua::Error::external)?,
            };
            Ok(time.offset().local_minus_utc())
        })?,
    )?;

    Ok(Some(module))
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// `{ year, month, day, hour?, min?, sec?, offset? }` to a time. Without an
/// offset the host's local zone at that date is used.
fn time_from_date(date: &Table) -> Result<DateTime<FixedOffset>, String> {
    let fields = Fields::new(date, "date");
    let int = |key: &str, default: Option<i64>| -> Result<i64, String> {
        match fields.opt_integer(key).map_err(|e| e.diagnostic().to_string())? {
            Some(v) => Ok(v),
            None => default.ok_or_else(|| format!("date: missing required field '{key}'")),
        }
    };
    let (year, month, day) = (int("year", None)?, int("month", None)?, int("day", None)?);
    let (hour, min, sec) = (int("hour", Some(0))?, int("min", Some(0))?, int("sec", Some(0))?);

    let naive = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .zip(u32::try_from(hour).ok())
        .zip(u32::try_from(min).ok())
        .zip(u32::try_from(sec).ok())
        .and_then(|(((date, h), mi), s)| date.and_hms_opt(h, mi, s))
        .ok_or_else(|| format!("date: {year}-{month}-{day} {hour}:{min}:{sec} is not a valid date"))?;

    let offset = match fields.opt_integer("offset").map_err(|e| e.diagnostic().to_string())? {
        Some(secs) => i32::try_from(secs)
            .ok()
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| format!("date: offset {secs} out of range"))?,
        None => match Local.offset_from_local_datetime(&naive) {
            LocalResult::Single(offset) | LocalResult::Ambiguous(offset, _) => offset.fix(),
            LocalResult::None => Local.offset_from_utc_datetime(&naive).fix(),
        },
    };

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| "date: ambiguous local time".to_string())
}

fn date_table(lua: &Lua, time: &DateTime<FixedOffset>) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("year", time.year())?;
    table.set("month", time.month())?;
    table.set("day", time.day())?;
    table.set("hour", time.hour())?;
    table.set("min", time.minute())?;
    table.set("sec", time.second())?;
    table.set("yday", time.ordinal())?;
    table.set("wday", time.weekday().number_from_monday())?;
    table.set("offset", time.offset().local_minus_utc())?;
    Ok(table)
}

/// Shift by `amount` periods (calendar aware) or `amount` times a duration
/// in millis.
fn shift(time: &DateTime<FixedOffset>, unit: &Value, amount: i64) -> Result<DateTime<FixedOffset>, String> {
    if let Value::String(name) = unit {
        let name = lua_string(name);
        let period = Period::from_name(&name).ok_or_else(|| format!("unknown period '{name}'"))?;
        return shift_period(time, period, amount).ok_or_else(|| "shifted time out of range".to_string());
    }

    let millis = as_integer(unit)
        .or_else(|| as_number(unit).map(|n| n as i64))
        .ok_or_else(|| "shift unit must be a period name or a duration".to_string())?;
    millis
        .checked_mul(amount)
        .and_then(chrono::Duration::try_milliseconds)
        .and_then(|delta| time.checked_add_signed(delta))
        .ok_or_else(|| "shifted time out of range".to_string())
}

fn shift_period(time: &DateTime<FixedOffset>, period: Period, amount: i64) -> Option<DateTime<FixedOffset>> {
    let magnitude = amount.unsigned_abs();
    match period {
        Period::Day | Period::Week => {
            let days = if period == Period::Week { magnitude.checked_mul(7)? } else { magnitude };
            if amount >= 0 {
                time.checked_add_days(Days::new(days))
            } else {
                time.checked_sub_days(Days::new(days))
            }
        }
        Period::Month | Period::Year => {
            let months = if period == Period::Year { magnitude.checked_mul(12)? } else { magnitude };
            let months = Months::new(u32::try_from(months).ok()?);
            if amount >= 0 {
                time.checked_add_months(months)
            } else {
                time.checked_sub_months(months)
            }
        }
    }
}

fn format(time: &DateTime<FixedOffset>, pattern: &str) -> Result<String, String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid format pattern '{pattern}'"));
    }
    Ok(time.format_with_items(items.into_iter()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphscript_core::data_point::timestamp_from_parts;

    #[test]
    fn month_shift_clamps_to_month_end() {
        let jan31 = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 31, 12, 0, 0)
            .unwrap();
        let feb = shift_period(&jan31, Period::Month, 1).unwrap();
        assert_eq!((feb.month(), feb.day()), (2, 29));
        let back = shift_period(&jan31, Period::Year, -1).unwrap();
        assert_eq!(back.year(), 2023);
    }

    #[test]
    fn bad_patterns_are_errors() {
        let t = timestamp_from_parts(0, 0).unwrap();
        assert_eq!(format(&t, "%Y-%m-%d").unwrap(), "1970-01-01");
        assert!(format(&t, "%Q").is_err());
    }

    #[test]
    fn module_round_trips_dates() {
        let lua = Lua::new();
        let module = native_module(&lua, MODULE_NAME).unwrap().unwrap();
        lua.globals().set("t", module).unwrap();
        let (ms, day, wday): (i64, u32, u32) = lua
            .load(
                r#"
                local time = t.time({ year = 2024, month = 3, day = 4, hour = 6, offset = 3600 })
                local shifted = t.shift(time, "WEEK", 1)
                local date = t.date(shifted)
                return time.timestamp, date.day, date.wday
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(ms, 1_709_528_400_000);
        assert_eq!(day, 11);
        assert_eq!(wday, 1);
    }

    #[test]
    fn out_of_range_date_fields_are_rejected() {
        let lua = Lua::new();
        let bad = [
            "{ year = 4294969320, month = 1, day = 1 }",
            "{ year = 2024, month = 4294967297, day = 1 }",
            "{ year = 2024, month = 1, day = -1 }",
            "{ year = 2024, month = 1, day = 1, hour = 4294967296 }",
        ];
        for date in bad {
            let table: Table = lua.load(format!("return {date}")).eval().unwrap();
            let err = time_from_date(&table).unwrap_err();
            assert!(err.contains("not a valid date"), "{date}: {err}");
        }
        let ok: Table = lua.load("return { year = 2024, month = 2, day = 29, offset = 0 }").eval().unwrap();
        assert_eq!(time_from_date(&ok).unwrap().day(), 29);
    }

    #[test]
    fn other_names_are_not_native() {
        let lua = Lua::new();
        assert!(native_module(&lua, "tng.core").unwrap().is_none());
    }
}
