//! Canonicalize source names across driver stacks.
//!
//! All ADFs become `feeder…`, all flatbeds `flatbed…`, WIA path
//! prefixes (`0000\Root\…`) are stripped. First matching rule wins;
//! the table is compiled once per process.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use scan_core::{Backend, ScanError, ScanResult, opt};

use crate::base::{BwItem, WrapperHooks, wrap_backend};

struct NameRule {
    re: Regex,
    /// Replacement prefix; the first capture group is appended.
    replacement: &'static str,
    /// Lowercase the captured tail (WIA path components keep vendor
    /// casing we do not want).
    lowercase_tail: bool,
}

static NAME_RULES: LazyLock<Result<Arc<Vec<NameRule>>, regex::Error>> = LazyLock::new(|| {
    let table: [(&str, &str, bool); 6] = [
        // already canonical, normalize the prefix case only
        (r"^flatbed(.*)$", opt::SOURCE_FLATBED, false),
        (r"^feeder(.*)$", opt::SOURCE_ADF, false),
        // Sane
        (r"^adf(.*)$", opt::SOURCE_ADF, false),
        (r"^automatic document feeder(.*)$", opt::SOURCE_ADF, false),
        // Sane + Epson Perfection v19
        (r"^document table(.*)$", opt::SOURCE_FLATBED, false),
        // WIA
        (r"^[0-9]+\\Root\\(.*)$", "", true),
    ];
    let mut rules = Vec::with_capacity(table.len());
    for (pattern, replacement, lowercase_tail) in table {
        rules.push(NameRule {
            re: Regex::new(&format!("(?i){pattern}"))?,
            replacement,
            lowercase_tail,
        });
    }
    Ok(Arc::new(rules))
});

struct SourceNamesHooks {
    rules: Arc<Vec<NameRule>>,
}

impl WrapperHooks for SourceNamesHooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_source_names"
    }

    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        if item.is_root() {
            debug!(item = %item.name(), "root item, name left alone");
            return Ok(());
        }
        let name = item.name();
        for rule in self.rules.iter() {
            let Some(captures) = rule.re.captures(&name) else {
                continue;
            };
            let tail = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let tail = if rule.lowercase_tail {
                tail.to_lowercase()
            } else {
                tail.to_string()
            };
            let normalized = format!("{}{}", rule.replacement, tail);
            info!(from = %name, to = %normalized, "source name normalized");
            item.set_name(normalized);
            return Ok(());
        }
        warn!(item = %name, "failed to normalize source name");
        Ok(())
    }
}

pub fn normalizer_source_names(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    let rules = NAME_RULES
        .as_ref()
        .map_err(|e| ScanError::Unknown(format!("source name table: {e}")))?
        .clone();
    Ok(wrap_backend(to_wrap, SourceNamesHooks { rules }))
}
