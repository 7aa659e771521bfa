//! Clean up vendor and model strings from `list_devices`.
//!
//! HP devices report `hewlett_packard` style names, most vendors repeat
//! themselves in the model string. Filters run in order: underscores to
//! spaces, long manufacturer names collapsed, vendor prefix stripped
//! from the model.

use scan_core::{Backend, DeviceDescriptor, DeviceLocations, ItemRef, ScanResult};

const VENDOR_REPLACEMENTS: [(&str, &str); 2] = [
    ("hewlett-packard", "HP"),
    ("hewlett packard", "HP"),
];

fn filter_underscores(desc: &mut DeviceDescriptor) {
    desc.vendor = desc.vendor.replace('_', " ");
    desc.model = desc.model.replace('_', " ");
}

fn shorten_manufacturer(desc: &mut DeviceDescriptor) {
    for (original, replacement) in VENDOR_REPLACEMENTS {
        if desc.vendor.eq_ignore_ascii_case(original) {
            desc.vendor = replacement.to_string();
        }
    }
}

fn strip_manufacturer_prefix(desc: &mut DeviceDescriptor) {
    let vendor_len = desc.vendor.len();
    if desc.model.len() < vendor_len
        || !desc.model.is_char_boundary(vendor_len)
        || !desc.model[..vendor_len].eq_ignore_ascii_case(&desc.vendor)
    {
        return;
    }
    let mut offset = vendor_len;
    if desc.model[offset..].starts_with(' ') {
        offset += 1;
    }
    desc.model = desc.model[offset..].to_string();
}

struct CleanDevDescs {
    wrapped: Box<dyn Backend>,
}

impl Backend for CleanDevDescs {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        let mut descs = self.wrapped.list_devices(locations)?;
        for desc in &mut descs {
            filter_underscores(desc);
            shorten_manufacturer(desc);
            strip_manufacturer_prefix(desc);
        }
        Ok(descs)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        self.wrapped.get_device(dev_id)
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

pub fn normalizer_clean_dev_descs(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(CleanDevDescs { wrapped: to_wrap }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(vendor: &str, model: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            dev_id: "x".into(),
            vendor: vendor.into(),
            model: model.into(),
            dev_type: String::new(),
        }
    }

    #[test]
    fn underscores_become_spaces() {
        let mut d = desc("hewlett_packard", "hp_psc_2200");
        filter_underscores(&mut d);
        assert_eq!(d.vendor, "hewlett packard");
        assert_eq!(d.model, "hp psc 2200");
    }

    #[test]
    fn hp_is_shortened() {
        let mut d = desc("hewlett packard", "whatever");
        shorten_manufacturer(&mut d);
        assert_eq!(d.vendor, "HP");
    }

    #[test]
    fn model_loses_vendor_prefix() {
        let mut d = desc("Brother", "Brother MFC-7360N");
        strip_manufacturer_prefix(&mut d);
        assert_eq!(d.model, "MFC-7360N");
    }

    #[test]
    fn unrelated_model_is_untouched() {
        let mut d = desc("Brother", "MFC-7360N");
        strip_manufacturer_prefix(&mut d);
        assert_eq!(d.model, "MFC-7360N");
    }

    #[test]
    fn full_hp_chain() {
        let mut d = desc("hewlett_packard", "hp_psc_2200");
        filter_underscores(&mut d);
        shorten_manufacturer(&mut d);
        strip_manufacturer_prefix(&mut d);
        assert_eq!(d.vendor, "HP");
        assert_eq!(d.model, "psc 2200");
    }
}
