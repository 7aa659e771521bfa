//! Coerce the `resolution` option to an integer LIST constraint.
//!
//! Drivers express resolution constraints as ranges or lists, of
//! integers or doubles. Applications get one shape: a list of integers.

use tracing::{debug, info, warn};

use scan_core::{
    Backend, Constraint, ScanError, ScanOption, ScanResult, SetFlags, Value, ValueRange,
    ValueType, opt,
};

use crate::base::{BwItem, BwOption, OptionOps, WrapperHooks, wrap_backend};

/// Step used when a range declares an interval of 1 dpi or less; such
/// intervals would expand to absurdly long lists.
const MIN_RESOLUTION_INTERVAL: i32 = 25;

/// Fallback constraint when the driver does not declare one at all.
/// Same span as a plain Brother DS-620.
fn default_constraint() -> Vec<Value> {
    (75..=600).step_by(25).map(Value::Int).collect()
}

/// get/set forwarder converting between the integer face shown to the
/// application and the double-typed option underneath.
struct DoubleToIntOps;

impl OptionOps for DoubleToIntOps {
    fn get_value(&self, opt: &BwOption) -> ScanResult<Value> {
        let value = opt.original().borrow().get_value()?;
        match value {
            Value::Double(d) => {
                debug!(value = d, "converting resolution to integer");
                Ok(Value::Int(d as i32))
            }
            other => Ok(other),
        }
    }

    fn set_value(&self, opt: &BwOption, value: Value) -> ScanResult<SetFlags> {
        let value = match value {
            Value::Int(i) => {
                debug!(value = i, "converting resolution to double");
                Value::Double(f64::from(i))
            }
            other => other,
        };
        opt.original().borrow().set_value(value)
    }
}

fn range_to_int(range: &ValueRange) -> ScanResult<(i32, i32, i32)> {
    let as_int = |v: &Value| -> ScanResult<i32> {
        match v {
            Value::Int(i) => Ok(*i),
            Value::Double(d) => Ok(*d as i32),
            _ => Err(ScanError::Unsupported),
        }
    };
    Ok((
        as_int(&range.min)?,
        as_int(&range.max)?,
        as_int(&range.interval)?,
    ))
}

/// Expand a range constraint into the equivalent list. The declared
/// interval is honored unless it is degenerate (≤ 1), in which case a
/// 25 dpi step is used, the exact minimum is prefixed when it is not
/// step-aligned, and the exact maximum is appended.
fn range_to_list(min: i32, max: i32, declared_interval: i32) -> Vec<Value> {
    let interval = if declared_interval <= 1 {
        MIN_RESOLUTION_INTERVAL
    } else {
        declared_interval
    };

    let mut values = Vec::new();
    let mut val = min;
    if declared_interval <= 1 && val % interval != 0 {
        values.push(Value::Int(val));
        val += interval;
        val -= val % interval;
    }
    while val <= max {
        values.push(Value::Int(val));
        val += interval;
    }
    if declared_interval <= 1 && val != max + interval {
        values.push(Value::Int(max));
    }
    values
}

struct ResolutionHooks;

impl WrapperHooks for ResolutionHooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_resolution"
    }

    fn filter_option(&self, _item: &mut BwItem, option: &mut BwOption) -> ScanResult<()> {
        if !option.desc().name.eq_ignore_ascii_case(opt::RESOLUTION) {
            return Ok(());
        }

        let value_type = option.desc().value_type;
        let constraint = option.desc().constraint.clone();
        if value_type == ValueType::Int && matches!(constraint, Constraint::List(_)) {
            debug!("resolution option already canonical");
            return Ok(());
        }

        match constraint {
            Constraint::None => {
                if value_type != ValueType::Int {
                    warn!(
                        ty = ?value_type,
                        "resolution has no constraint and an unexpected value type"
                    );
                    return Err(ScanError::Unsupported);
                }
                warn!("resolution has no constraint; using the built-in default list");
                option.desc_mut().constraint = Constraint::List(default_constraint());
            }
            Constraint::Range(range) => {
                info!("converting resolution range constraint into a list");
                let (min, max, interval) = range_to_int(&range)?;
                if value_type == ValueType::Double {
                    option.set_ops(DoubleToIntOps);
                }
                option.desc_mut().value_type = ValueType::Int;
                option.desc_mut().constraint = Constraint::List(range_to_list(min, max, interval));
            }
            Constraint::List(values) => {
                info!("converting resolution double list constraint into integers");
                if value_type != ValueType::Double {
                    return Err(ScanError::Unsupported);
                }
                let ints = values
                    .iter()
                    .map(|v| match v {
                        Value::Int(i) => Ok(Value::Int(*i)),
                        Value::Double(d) => Ok(Value::Int(*d as i32)),
                        _ => Err(ScanError::Unsupported),
                    })
                    .collect::<ScanResult<Vec<_>>>()?;
                option.set_ops(DoubleToIntOps);
                option.desc_mut().value_type = ValueType::Int;
                option.desc_mut().constraint = Constraint::List(ints);
            }
        }
        Ok(())
    }
}

pub fn normalizer_resolution(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, ResolutionHooks))
}
