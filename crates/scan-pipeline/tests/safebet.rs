use std::sync::{Mutex, MutexGuard, OnceLock};

use scan_core::{
    Backend, Capabilities, Constraint, DeviceLocations, ImageFormat, Item, ItemType,
    OptionDescriptor, ScanOption, ScanParameters, ScanSession, Unit, Value, ValueRange,
    ValueType,
};
use scan_dumb::{DumbBackend, DumbPage};
use scan_pipeline::{safebet, safebet_with_bases};

/// The whole file reads and writes `LIBINSANE_*` variables, which are
/// process-global; serialize the tests.
fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn gray_scanner() -> scan_core::ScanResult<Vec<Box<dyn Backend>>> {
    let backend = DumbBackend::new("dumb");
    let ctl = backend.controller();
    ctl.set_nb_devices(1);
    ctl.add_option(
        OptionDescriptor {
            name: "source".to_string(),
            title: String::new(),
            desc: String::new(),
            capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
            value_type: ValueType::Str,
            unit: Unit::None,
            constraint: Constraint::List(vec![
                Value::Str("Flatbed".to_string()),
                Value::Str("ADF".to_string()),
            ]),
        },
        Value::Str("Flatbed".to_string()),
    );
    ctl.add_option(
        OptionDescriptor {
            name: "mode".to_string(),
            title: String::new(),
            desc: String::new(),
            capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
            value_type: ValueType::Str,
            unit: Unit::None,
            constraint: Constraint::List(vec![
                Value::Str("LineArt".to_string()),
                Value::Str("Gray".to_string()),
                Value::Str("Color".to_string()),
            ]),
        },
        Value::Str("LineArt".to_string()),
    );
    ctl.add_option(
        OptionDescriptor {
            name: "resolution".to_string(),
            title: String::new(),
            desc: String::new(),
            capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
            value_type: ValueType::Int,
            unit: Unit::Dpi,
            constraint: Constraint::Range(ValueRange {
                min: Value::Int(75),
                max: Value::Int(300),
                interval: Value::Int(75),
            }),
        },
        Value::Int(75),
    );
    // 16x16 grayscale page
    ctl.set_scan_parameters(ScanParameters {
        format: ImageFormat::Grayscale8,
        width: 16,
        height: 16,
        image_size: 256,
    });
    ctl.set_scan_result(vec![DumbPage::single(vec![0x80; 256])]);
    Ok(vec![Box::new(backend) as Box<dyn Backend>])
}

#[test]
fn default_pipeline_produces_the_canonical_form() {
    let _guard = env_lock();
    let mut backend = safebet_with_bases(gray_scanner).unwrap();

    let devices = backend.list_devices(DeviceLocations::Any).unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].dev_id, "dumb:dumb dev0");

    let dev = backend.get_device(&devices[0].dev_id).unwrap();
    assert_eq!(dev.borrow().item_type(), ItemType::Device);

    // sources synthesized from the 'source' option, canonically named
    // and typed
    let children = dev.borrow_mut().get_children().unwrap();
    let names: Vec<String> = children.iter().map(|c| c.borrow().name()).collect();
    assert_eq!(names, ["flatbed", "feeder"]);
    let types: Vec<ItemType> = children.iter().map(|c| c.borrow().item_type()).collect();
    assert_eq!(types, [ItemType::Flatbed, ItemType::Adf]);

    // all the root options are reachable from the source, with the
    // canonical shapes
    let opts = children[0].borrow_mut().get_options().unwrap();
    let names: Vec<String> = opts
        .iter()
        .map(|option| option.borrow().descriptor().name)
        .collect();
    for expected in ["source", "mode", "resolution"] {
        assert!(names.contains(&expected.to_string()), "missing {expected}");
    }
    let resolution = opts
        .iter()
        .find(|option| option.borrow().descriptor().name == "resolution")
        .unwrap();
    let desc = resolution.borrow().descriptor();
    assert_eq!(desc.value_type, ValueType::Int);
    assert_eq!(
        desc.constraint,
        Constraint::List(vec![
            Value::Int(75),
            Value::Int(150),
            Value::Int(225),
            Value::Int(300),
        ])
    );

    // safe defaults bumped the mode to Color
    let mode = opts
        .iter()
        .find(|option| option.borrow().descriptor().name == "mode")
        .unwrap();
    assert_eq!(
        mode.borrow().get_value().unwrap(),
        Value::Str("Color".to_string())
    );

    // the scan comes out as raw RGB24 whatever the driver produced
    let session = children[0].borrow_mut().scan_start().unwrap();
    let params = session.borrow_mut().get_scan_parameters().unwrap();
    assert_eq!(params.format, ImageFormat::RawRgb24);
    assert_eq!(
        params.image_size,
        params.width as usize * params.height as usize * 3
    );

    let mut image = Vec::new();
    loop {
        if session.borrow_mut().end_of_page() {
            break;
        }
        let mut buf = [0u8; 4096];
        let nb = session.borrow_mut().scan_read(&mut buf).unwrap();
        image.extend_from_slice(&buf[..nb]);
    }
    assert_eq!(image.len(), 16 * 16 * 3);
    assert!(image.iter().all(|&b| b == 0x80));
    assert!(session.borrow_mut().end_of_feed());

    dev.borrow_mut().close();
    backend.cleanup();
}

#[test]
fn dumb_base_is_used_when_nothing_else_is() {
    let _guard = env_lock();
    let mut backend = safebet().unwrap();
    // no device configured on the fallback dumb backend, but the whole
    // pipeline is up and answering
    let devices = backend.list_devices(DeviceLocations::Any).unwrap();
    assert!(devices.is_empty());
    backend.cleanup();
}

#[test]
fn env_disables_a_wrapper() {
    let _guard = env_lock();
    unsafe {
        std::env::set_var("LIBINSANE_NORMALIZER_SOURCE_NAMES", "0");
        std::env::set_var("LIBINSANE_NORMALIZER_SOURCE_TYPES", "0");
    }
    let mut backend = safebet_with_bases(gray_scanner).unwrap();
    let dev = backend.get_device("dumb:dumb dev0").unwrap();
    let children = dev.borrow_mut().get_children().unwrap();
    let names: Vec<String> = children.iter().map(|c| c.borrow().name()).collect();
    // vendor spellings survive without the normalizers
    assert_eq!(names, ["Flatbed", "ADF"]);
    unsafe {
        std::env::remove_var("LIBINSANE_NORMALIZER_SOURCE_NAMES");
        std::env::remove_var("LIBINSANE_NORMALIZER_SOURCE_TYPES");
    }
    backend.cleanup();
}

#[test]
fn env_disables_the_dedicated_thread() {
    let _guard = env_lock();
    unsafe {
        std::env::set_var("LIBINSANE_WORKAROUND_DEDICATED_THREAD", "0");
    }
    let mut backend = safebet_with_bases(gray_scanner).unwrap();
    let devices = backend.list_devices(DeviceLocations::Any).unwrap();
    assert_eq!(devices.len(), 1);
    unsafe {
        std::env::remove_var("LIBINSANE_WORKAROUND_DEDICATED_THREAD");
    }
    backend.cleanup();
}
