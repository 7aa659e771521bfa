mod common;

use common::*;
use scan_core::{ScanOption, Value};
use scan_wrappers::workarounds::workaround_opt_names;

#[test]
fn vendor_names_are_canonicalized() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        int_range_option("scan-resolution", 75, 600, 25),
        Value::Int(300),
    );
    ctl.add_option(
        str_list_option("doc-source", &["Flatbed", "ADF"]),
        Value::Str("Flatbed".into()),
    );
    let mut backend = workaround_opt_names(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    assert_eq!(option_names(&opts), ["resolution", "source"]);
}

#[test]
fn renamed_option_still_reaches_the_driver() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        int_range_option("scan-resolution", 75, 600, 25),
        Value::Int(300),
    );
    let mut backend = workaround_opt_names(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let resolution = get_option(&opts, "resolution");
    resolution.borrow().set_value(Value::Int(150)).unwrap();
    assert_eq!(resolution.borrow().get_value().unwrap(), Value::Int(150));
}

#[test]
fn existing_canonical_name_blocks_the_rename() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("resolution", 75, 600, 25), Value::Int(300));
    ctl.add_option(
        int_range_option("scan-resolution", 75, 600, 25),
        Value::Int(300),
    );
    let mut backend = workaround_opt_names(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    assert_eq!(option_names(&opts), ["resolution", "scan-resolution"]);
}

#[test]
fn canonical_backend_is_untouched() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("resolution", 75, 600, 25), Value::Int(300));
    ctl.add_option(
        str_list_option("source", &["flatbed"]),
        Value::Str("flatbed".into()),
    );
    let mut backend = workaround_opt_names(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    assert_eq!(option_names(&opts), ["resolution", "source"]);
}
