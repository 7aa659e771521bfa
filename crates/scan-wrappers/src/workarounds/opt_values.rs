//! Rewrite vendor-specific option values to their canonical spelling.
//!
//! A small closed table: Brother's mode names (`24bit Color`, ...) and
//! the French translations some Sane drivers ship for mode and source.
//! The constraint list shown to the application carries the canonical
//! spellings; get and set translate in both directions.

use tracing::debug;

use scan_core::{
    Backend, Constraint, ScanOption, ScanResult, SetFlags, Value, ValueType, opt,
};

use crate::base::{BwItem, BwOption, OptionOps, WrapperHooks, wrap_backend};

struct ValueMapping {
    original: &'static str,
    replacement: &'static str,
}

struct OptionMapping {
    opt_name: &'static str,
    values: &'static [ValueMapping],
}

const MODE_MAPPINGS: &[ValueMapping] = &[
    // Sane + Brother MFC-7360N: 'Black & White', 'Gray[Error Diffusion]',
    // 'True Gray', '24bit Color', '24bit Color[Fast]'
    ValueMapping {
        original: "Black & White",
        replacement: opt::MODE_BW,
    },
    ValueMapping {
        original: "True Gray",
        replacement: opt::MODE_GRAYSCALE,
    },
    ValueMapping {
        original: "24bit Color",
        replacement: opt::MODE_COLOR,
    },
    // Sane + OKI MC363: translations ...
    ValueMapping {
        original: "Couleur",
        replacement: opt::MODE_COLOR,
    },
    ValueMapping {
        original: "Gris",
        replacement: opt::MODE_GRAYSCALE,
    },
    ValueMapping {
        original: "Noir et blanc",
        replacement: opt::MODE_BW,
    },
];

const SOURCE_MAPPINGS: &[ValueMapping] = &[
    // Sane + OKI MC363 again
    ValueMapping {
        original: "Scanneur à plat",
        replacement: opt::SOURCE_FLATBED,
    },
    ValueMapping {
        original: "Chargeur automatique de documents (ADF)",
        replacement: opt::SOURCE_ADF,
    },
];

const OPTION_MAPPINGS: [OptionMapping; 2] = [
    OptionMapping {
        opt_name: opt::MODE,
        values: MODE_MAPPINGS,
    },
    OptionMapping {
        opt_name: opt::SOURCE,
        values: SOURCE_MAPPINGS,
    },
];

fn mapping_for(opt_name: &str) -> Option<&'static [ValueMapping]> {
    OPTION_MAPPINGS
        .iter()
        .find(|m| m.opt_name.eq_ignore_ascii_case(opt_name))
        .map(|m| m.values)
}

/// original spelling -> canonical spelling
fn to_canonical(values: &[ValueMapping], raw: &str) -> Option<&'static str> {
    values
        .iter()
        .find(|m| m.original.eq_ignore_ascii_case(raw))
        .map(|m| m.replacement)
}

/// canonical spelling -> original spelling, restricted to spellings the
/// wrapped option actually offers
fn to_original(
    values: &[ValueMapping],
    canonical: &str,
    constraint: &Constraint,
) -> Option<&'static str> {
    let Constraint::List(list) = constraint else {
        return None;
    };
    values
        .iter()
        .find(|m| {
            m.replacement.eq_ignore_ascii_case(canonical)
                && list
                    .iter()
                    .any(|v| matches!(v, Value::Str(s) if s.eq_ignore_ascii_case(m.original)))
        })
        .map(|m| m.original)
}

struct TranslateOps {
    values: &'static [ValueMapping],
}

impl OptionOps for TranslateOps {
    fn get_value(&self, option: &BwOption) -> ScanResult<Value> {
        let value = option.original().borrow().get_value()?;
        match value {
            Value::Str(raw) => match to_canonical(self.values, &raw) {
                Some(canonical) => Ok(Value::Str(canonical.to_string())),
                None => Ok(Value::Str(raw)),
            },
            other => Ok(other),
        }
    }

    fn set_value(&self, option: &BwOption, value: Value) -> ScanResult<SetFlags> {
        let value = match &value {
            Value::Str(requested) => {
                let original_constraint = option.original().borrow().descriptor().constraint;
                match to_original(self.values, requested, &original_constraint) {
                    Some(original) => Value::Str(original.to_string()),
                    None => value,
                }
            }
            _ => value,
        };
        option.original().borrow().set_value(value)
    }
}

struct OptValuesHooks;

impl WrapperHooks for OptValuesHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_opt_values"
    }

    fn filter_option(&self, _item: &mut BwItem, option: &mut BwOption) -> ScanResult<()> {
        if option.desc().value_type != ValueType::Str {
            return Ok(());
        }
        let Some(values) = mapping_for(&option.desc().name) else {
            return Ok(());
        };
        let Constraint::List(list) = &mut option.desc_mut().constraint else {
            return Ok(());
        };
        let mut touched = false;
        for entry in list.iter_mut() {
            let Value::Str(raw) = entry else {
                continue;
            };
            if let Some(canonical) = to_canonical(values, raw) {
                debug!(from = %raw, to = canonical, "replacing constraint value");
                *entry = Value::Str(canonical.to_string());
                touched = true;
            }
        }
        if touched {
            option.set_ops(TranslateOps { values });
        }
        Ok(())
    }
}

pub fn workaround_opt_values(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, OptValuesHooks))
}
