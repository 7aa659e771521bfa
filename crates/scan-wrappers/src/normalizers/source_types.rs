//! Assign an [`ItemType`] to sources whose type the driver left
//! unidentified, based on their name.
//!
//! Sane reports sources by name only; the exact names are up to each
//! driver. The match table is compiled once per process and shared by
//! every instance of this wrapper.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use scan_core::{Backend, ItemType, ScanError, ScanResult};

use crate::base::{BwItem, WrapperHooks, wrap_backend};

struct TypeRule {
    re: Regex,
    item_type: ItemType,
}

static TYPE_RULES: LazyLock<Result<Arc<Vec<TypeRule>>, regex::Error>> = LazyLock::new(|| {
    let table = [
        ("flatbed", ItemType::Flatbed),
        ("automatic document feeder", ItemType::Adf),
        ("adf", ItemType::Adf),
        // canonical name produced by the source_names normalizer
        ("feeder", ItemType::Adf),
    ];
    let mut rules = Vec::with_capacity(table.len());
    for (pattern, item_type) in table {
        rules.push(TypeRule {
            re: Regex::new(&format!("(?i){pattern}"))?,
            item_type,
        });
    }
    Ok(Arc::new(rules))
});

struct SourceTypesHooks {
    rules: Arc<Vec<TypeRule>>,
}

impl WrapperHooks for SourceTypesHooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_source_types"
    }

    fn filter_item(&self, item: &mut BwItem) -> ScanResult<()> {
        if item.item_type() != ItemType::Unidentified {
            debug!(item = %item.name(), ty = ?item.item_type(), "item already typed");
            return Ok(());
        }
        if item.is_root() {
            item.set_item_type(ItemType::Device);
            return Ok(());
        }
        let name = item.name();
        for rule in self.rules.iter() {
            if rule.re.is_match(&name) {
                info!(item = %name, ty = ?rule.item_type, "source type identified");
                item.set_item_type(rule.item_type);
                return Ok(());
            }
        }
        warn!(item = %name, "failed to identify source type");
        Ok(())
    }
}

pub fn normalizer_source_types(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    let rules = TYPE_RULES
        .as_ref()
        .map_err(|e| ScanError::Unknown(format!("source type table: {e}")))?
        .clone();
    Ok(wrap_backend(to_wrap, SourceTypesHooks { rules }))
}
