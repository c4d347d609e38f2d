//! `np` and `plt` modules exposed to drawing scripts.

use rhai::{Array, Dynamic, EvalAltResult, FLOAT, INT, Module};

use super::color::Color;

pub(super) type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Upper bound on generated array lengths.
const MAX_ELEMENTS: usize = 1_000_000;

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("sin", f64::sin),
    ("cos", f64::cos),
    ("tan", f64::tan),
    ("exp", f64::exp),
    ("log", f64::ln),
    ("sqrt", f64::sqrt),
    ("abs", f64::abs),
];

/// Accept either a Rhai `INT` or `FLOAT` as a float.
pub(super) fn as_number(value: &Dynamic) -> ScriptResult<f64> {
    if let Ok(number) = value.as_float() {
        return Ok(number);
    }
    if let Ok(number) = value.as_int() {
        return Ok(number as f64);
    }
    Err(format!("expected a number, found {}", value.type_name()).into())
}

pub(super) fn as_numbers(values: &Array) -> ScriptResult<Vec<f64>> {
    values.iter().map(as_number).collect()
}

fn to_array(values: impl IntoIterator<Item = f64>) -> Array {
    values.into_iter().map(Dynamic::from_float).collect()
}

fn element_count(count: f64, call: &str) -> ScriptResult<usize> {
    if !count.is_finite() || count < 0.0 {
        return Err(format!("{call}(): element count must be a non-negative number").into());
    }
    let count = count as usize;
    if count > MAX_ELEMENTS {
        return Err(format!("{call}(): at most {MAX_ELEMENTS} elements are supported").into());
    }
    Ok(count)
}

fn linspace(start: f64, stop: f64, count: INT) -> ScriptResult<Array> {
    let count = element_count(count as f64, "linspace")?;
    if count == 1 {
        return Ok(to_array([start]));
    }
    let step = (stop - start) / (count.max(2) - 1) as f64;
    Ok(to_array((0..count).map(|i| start + step * i as f64)))
}

fn arange(start: f64, stop: f64, step: f64) -> ScriptResult<Array> {
    if step == 0.0 || !step.is_finite() {
        return Err("arange(): step must be a non-zero number".into());
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    let count = element_count(count, "arange")?;
    Ok(to_array((0..count).map(|i| start + step * i as f64)))
}

fn filled(count: INT, value: f64, call: &str) -> ScriptResult<Array> {
    let count = element_count(count as f64, call)?;
    Ok(to_array(std::iter::repeat_n(value, count)))
}

fn map_unary(value: Dynamic, op: fn(f64) -> f64) -> ScriptResult<Dynamic> {
    if value.is_array() {
        let values = value.into_array()?;
        return Ok(Dynamic::from_array(to_array(
            as_numbers(&values)?.into_iter().map(op),
        )));
    }
    Ok(Dynamic::from_float(op(as_number(&value)?)))
}

fn reduce(values: &Array, call: &str) -> ScriptResult<Vec<f64>> {
    let numbers = as_numbers(values)?;
    if numbers.is_empty() {
        return Err(format!("{call}(): array must not be empty").into());
    }
    Ok(numbers)
}

/// Numeric helpers bound as `np`.
pub(super) fn numeric_module() -> Module {
    let mut module = Module::new();
    module.set_var("pi", std::f64::consts::PI as FLOAT);
    module.set_var("e", std::f64::consts::E as FLOAT);

    module.set_native_fn(
        "linspace",
        |start: Dynamic, stop: Dynamic, count: INT| -> ScriptResult<Array> {
            linspace(as_number(&start)?, as_number(&stop)?, count)
        },
    );
    module.set_native_fn("arange", |stop: Dynamic| -> ScriptResult<Array> {
        arange(0.0, as_number(&stop)?, 1.0)
    });
    module.set_native_fn(
        "arange",
        |start: Dynamic, stop: Dynamic, step: Dynamic| -> ScriptResult<Array> {
            arange(as_number(&start)?, as_number(&stop)?, as_number(&step)?)
        },
    );
    module.set_native_fn("zeros", |count: INT| -> ScriptResult<Array> {
        filled(count, 0.0, "zeros")
    });
    module.set_native_fn("ones", |count: INT| -> ScriptResult<Array> {
        filled(count, 1.0, "ones")
    });

    for (name, op) in UNARY {
        let op = *op;
        module.set_native_fn(*name, move |value: Dynamic| -> ScriptResult<Dynamic> {
            map_unary(value, op)
        });
    }

    module.set_native_fn("sum", |values: Array| -> ScriptResult<FLOAT> {
        Ok(as_numbers(&values)?.into_iter().sum())
    });
    module.set_native_fn("min", |values: Array| -> ScriptResult<FLOAT> {
        Ok(reduce(&values, "min")?.into_iter().fold(f64::INFINITY, f64::min))
    });
    module.set_native_fn("max", |values: Array| -> ScriptResult<FLOAT> {
        Ok(reduce(&values, "max")?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    });
    module.set_native_fn("mean", |values: Array| -> ScriptResult<FLOAT> {
        let numbers = reduce(&values, "mean")?;
        Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
    });

    module
}

/// Colour helpers bound as `plt`.
pub(super) fn plotting_module() -> Module {
    let mut module = Module::new();

    module.set_native_fn(
        "rgb",
        |r: Dynamic, g: Dynamic, b: Dynamic| -> ScriptResult<String> {
            let channel = |value: &Dynamic| -> ScriptResult<u8> {
                let value = as_number(value)?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(format!("rgb(): channel {value} is outside 0..1").into());
                }
                Ok((value * 255.0).round() as u8)
            };
            Ok(Color::rgb(channel(&r)?, channel(&g)?, channel(&b)?).to_string())
        },
    );
    module.set_native_fn("cycle", |index: INT| -> ScriptResult<String> {
        if index < 0 {
            return Err("cycle(): index must be non-negative".into());
        }
        Ok(Color::cycle(index as usize).to_string())
    });

    module
}
