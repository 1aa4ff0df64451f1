// Integration tests for function scripts: generators, laziness, cancellation.
// Run with: cargo test -p graphscript-engine --test function_scripts

use graphscript_config::EngineSettings;
use graphscript_core::data_point::timestamp_from_parts;
use graphscript_core::{ConfigurationValue, DataPoint, RawDataSample};
use graphscript_engine::{ScriptEngine, ScriptError};

const MINUTE: i64 = 60_000;

fn engine(pool_size: usize) -> ScriptEngine {
    ScriptEngine::new(EngineSettings { pool_size, ..EngineSettings::default() }).unwrap()
}

/// Newest first, one point per minute, values n..1.
fn minutes(n: i64) -> Vec<DataPoint> {
    (1..=n)
        .rev()
        .map(|m| DataPoint::new(timestamp_from_parts(m * MINUTE, 0).unwrap(), m as f64))
        .collect()
}

const DOUBLER: &str = r#"
return {
    inputCount = 1,
    config = { { id = "factor", type = "number", default = 2 } },
    generator = function(sources, config)
        local source = sources[1]
        local dp = source.dp()
        while dp do
            dp.value = dp.value * config.factor
            coroutine.yield(dp)
            dp = source.dp()
        end
    end,
}
"#;

fn factor(value: f64) -> Vec<ConfigurationValue> {
    vec![ConfigurationValue::Number { id: "factor".into(), value }]
}

#[test]
fn coroutine_generator_transforms_points() {
    let engine = engine(2);
    let output = engine
        .run_function_script(DOUBLER, vec![RawDataSample::new(minutes(4))], &factor(3.0))
        .unwrap();
    let values: Vec<f64> = output.map(|p| p.unwrap().value).collect();
    assert_eq!(values, vec![12.0, 9.0, 6.0, 3.0]);
}

#[test]
fn bare_generator_keeps_point_fields() {
    let engine = engine(1);
    let points = vec![DataPoint::new(timestamp_from_parts(5 * MINUTE, 3600).unwrap(), 1.0)
        .with_label("tea")
        .with_note("green")
        .with_feature(9)];
    let out: Vec<DataPoint> = engine
        .run_function_script(
            "return function(sources) for _, dp in ipairs(sources[1].dpall()) do coroutine.yield(dp) end end",
            vec![RawDataSample::new(points.clone())],
            &[],
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out, points);
}

#[test]
fn iterator_style_generator() {
    let engine = engine(1);
    let script = r#"
        return function(sources)
            local source = sources[1]
            return function()
                local dp = source.dp()
                if dp then dp.value = -dp.value end
                return dp
            end
        end
    "#;
    let values: Vec<f64> = engine
        .run_function_script(script, vec![RawDataSample::new(minutes(3))], &[])
        .unwrap()
        .map(|p| p.unwrap().value)
        .collect();
    assert_eq!(values, vec![-3.0, -2.0, -1.0]);
}

#[test]
fn multiple_inputs_are_a_list() {
    let engine = engine(1);
    let script = r#"
        return {
            inputCount = 2,
            generator = function(sources)
                coroutine.yield({ timestamp = 0, value = #sources, label = sources[2].name })
            end,
        }
    "#;
    let out: Vec<DataPoint> = engine
        .run_function_script(
            script,
            vec![RawDataSample::new(minutes(1)), RawDataSample::new(minutes(1))],
            &[],
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].value, 2.0);
    assert_eq!(out[0].label, "input2");
}

#[test]
fn config_units_reach_the_script() {
    let engine = engine(1);
    let script = r#"
        return function(sources, config)
            coroutine.yield({ timestamp = config.since, value = config.window, note = config.mode })
        end
    "#;
    let out: Vec<DataPoint> = engine
        .run_function_script(
            script,
            vec![],
            &[
                ConfigurationValue::Duration { id: "window".into(), seconds: 1.5 },
                ConfigurationValue::Instant { id: "since".into(), epoch_millis: 42_000 },
                ConfigurationValue::Enum { id: "mode".into(), value: "sum".into() },
            ],
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out[0].value, 1500.0);
    assert_eq!(out[0].epoch_millis(), 42_000);
    assert_eq!(out[0].note, "sum");
}

// ---------------------------------------------------------------------------
// Laziness and cancellation
// ---------------------------------------------------------------------------

#[test]
fn reading_three_of_a_thousand_visits_at_most_four() {
    let engine = engine(1);
    let sample = RawDataSample::new(minutes(1000));
    let counter = sample.visit_counter();
    let taken: Vec<DataPoint> = engine
        .run_function_script(DOUBLER, vec![sample], &factor(1.0))
        .unwrap()
        .take(3)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(taken.len(), 3);
    assert!(counter.visited() <= 4, "visited {}", counter.visited());
}

#[test]
fn dropping_output_releases_lease_and_disposes() {
    let engine = engine(1);
    let sample = RawDataSample::new(minutes(50));
    let counter = sample.visit_counter();
    let mut output = engine
        .run_function_script(DOUBLER, vec![sample], &factor(1.0))
        .unwrap();
    assert!(output.next().is_some());
    assert_eq!(engine.pool().idle(), 0);
    drop(output);

    assert!(counter.is_disposed());
    assert_eq!(engine.pool().idle(), 1);

    // the single interpreter is usable again
    let again = engine.run_function_script(DOUBLER, vec![RawDataSample::new(minutes(1))], &factor(1.0));
    assert_eq!(again.unwrap().count(), 1);
}

#[test]
fn infinite_generator_is_safe_to_abandon() {
    let engine = engine(1);
    let script = r#"
        return function()
            local t = 0
            while true do
                t = t + 1
                coroutine.yield({ timestamp = t, value = t })
            end
        end
    "#;
    let values: Vec<f64> = engine
        .run_function_script(script, vec![], &[])
        .unwrap()
        .take(5)
        .map(|p| p.unwrap().value)
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(engine.pool().idle(), 1);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn runtime_error_is_yielded_then_ends() {
    let engine = engine(1);
    let sample = RawDataSample::new(minutes(3));
    let counter = sample.visit_counter();
    let mut output = engine
        .run_function_script(
            "return function(s) coroutine.yield(s[1].dp()); error('bad row') end",
            vec![sample],
            &[],
        )
        .unwrap();
    assert!(output.next().unwrap().is_ok());
    let err = output.next().unwrap().unwrap_err();
    assert!(err.diagnostic().contains("bad row"), "{err}");
    assert!(output.next().is_none());
    assert!(counter.is_disposed());
}

#[test]
fn yielding_a_non_point_is_a_decode_error() {
    let engine = engine(1);
    let mut output = engine
        .run_function_script("return function() coroutine.yield({ value = 1 }) end", vec![], &[])
        .unwrap();
    assert!(matches!(output.next(), Some(Err(ScriptError::Decode(_)))));
    assert!(output.next().is_none());
}

#[test]
fn bad_scripts_fail_to_start_and_dispose_inputs() {
    let engine = engine(1);
    for script in ["return {", "return 7", "return { generator = 'no' }"] {
        let sample = RawDataSample::new(minutes(2));
        let counter = sample.visit_counter();
        assert!(engine.run_function_script(script, vec![sample], &[]).is_err(), "{script}");
        assert!(counter.is_disposed(), "{script}");
    }
    assert_eq!(engine.pool().idle(), 1);
}
