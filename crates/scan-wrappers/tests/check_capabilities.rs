mod common;

use common::*;
use scan_core::{Capabilities, ScanError, ScanOption, Value};
use scan_wrappers::workarounds::workaround_check_capabilities;

#[test]
fn single_value_list_never_reaches_the_driver() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option("source", &["flatbed"]),
        Value::Str("flatbed".into()),
    );
    let mut backend = workaround_check_capabilities(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let source = get_option(&opts, "source");

    assert!(source.borrow().set_value(Value::Str("flatbed".into())).is_ok());
    assert_eq!(
        source
            .borrow()
            .set_value(Value::Str("feeder".into()))
            .unwrap_err(),
        ScanError::InvalidValue
    );
}

#[test]
fn single_value_match_is_case_insensitive() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option("source", &["Flatbed"]),
        Value::Str("Flatbed".into()),
    );
    let mut backend = workaround_check_capabilities(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let source = get_option(&opts, "source");
    assert!(source.borrow().set_value(Value::Str("flatbed".into())).is_ok());
}

#[test]
fn inactive_option_refuses_get_and_set() {
    let (backend, ctl) = dumb_with_one_device();
    let mut desc = int_range_option("brightness", 0, 100, 1);
    desc.capabilities |= Capabilities::INACTIVE;
    ctl.add_option(desc, Value::Int(50));
    let mut backend = workaround_check_capabilities(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let brightness = get_option(&opts, "brightness");

    assert_eq!(
        brightness.borrow().get_value().unwrap_err(),
        ScanError::AccessDenied
    );
    assert_eq!(
        brightness.borrow().set_value(Value::Int(80)).unwrap_err(),
        ScanError::AccessDenied
    );
}

#[test]
fn read_only_option_refuses_set() {
    let (backend, ctl) = dumb_with_one_device();
    let mut desc = int_range_option("counter", 0, 1_000_000, 1);
    desc.capabilities = Capabilities::READABLE;
    ctl.add_option(desc, Value::Int(42));
    let mut backend = workaround_check_capabilities(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let counter = get_option(&opts, "counter");

    assert_eq!(counter.borrow().get_value().unwrap(), Value::Int(42));
    assert_eq!(
        counter.borrow().set_value(Value::Int(0)).unwrap_err(),
        ScanError::AccessDenied
    );
}

#[test]
fn mislabelled_source_disables_the_inactive_check() {
    // Sane + Canon LiDE 220: 'source' flagged inactive while offering
    // two values; the INACTIVE flags of the whole item are garbage.
    let (backend, ctl) = dumb_with_one_device();
    let mut source = str_list_option("source", &["flatbed", "feeder"]);
    source.capabilities |= Capabilities::INACTIVE;
    ctl.add_option(source, Value::Str("flatbed".into()));
    let mut brightness = int_range_option("brightness", 0, 100, 1);
    brightness.capabilities |= Capabilities::INACTIVE;
    ctl.add_option(brightness, Value::Int(50));

    let mut backend = workaround_check_capabilities(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);

    // the inactive flag is ignored on this item
    let brightness = get_option(&opts, "brightness");
    assert_eq!(brightness.borrow().get_value().unwrap(), Value::Int(50));
    assert!(brightness.borrow().set_value(Value::Int(80)).is_ok());
}
