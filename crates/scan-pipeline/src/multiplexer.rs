//! Join several base backends behind one surface.
//!
//! Device ids are prefixed with the originating base's name
//! (`sane:...`, `dumb:...`); `get_device` routes on that prefix.

use tracing::{error, warn};

use scan_core::{
    Backend, DeviceDescriptor, DeviceLocations, ItemRef, ScanError, ScanResult,
};

struct Multiplexer {
    bases: Vec<Box<dyn Backend>>,
}

impl Backend for Multiplexer {
    fn base_name(&self) -> &str {
        "multiplexer"
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        let mut out = Vec::new();
        for base in &mut self.bases {
            let base_name = base.base_name().to_string();
            match base.list_devices(locations) {
                Ok(descs) => {
                    out.extend(descs.into_iter().map(|mut desc| {
                        desc.dev_id = format!("{base_name}:{}", desc.dev_id);
                        desc
                    }));
                }
                Err(err) => {
                    // one dead driver stack must not hide the others
                    warn!(base = %base_name, %err, "list_devices failed on one base");
                }
            }
        }
        Ok(out)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let Some((base_name, inner_id)) = dev_id.split_once(':') else {
            error!(dev_id, "device id carries no base prefix");
            return Err(ScanError::InvalidValue);
        };
        for base in &mut self.bases {
            if base.base_name() == base_name {
                return base.get_device(inner_id);
            }
        }
        error!(dev_id, base = base_name, "no such base backend");
        Err(ScanError::InvalidValue)
    }

    fn cleanup(&mut self) {
        for base in &mut self.bases {
            base.cleanup();
        }
    }
}

/// Wrap a set of base backends into a single one. The set may hold a
/// single element; ids are prefixed either way, so applications see
/// stable ids whatever the platform offers.
pub fn multiplexer(bases: Vec<Box<dyn Backend>>) -> ScanResult<Box<dyn Backend>> {
    if bases.is_empty() {
        error!("no base backend enabled");
        return Err(ScanError::Unsupported);
    }
    Ok(Box::new(Multiplexer { bases }))
}
