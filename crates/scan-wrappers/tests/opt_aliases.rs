mod common;

use common::*;
use scan_core::{Capabilities, Constraint, ScanOption, Value};
use scan_wrappers::normalizers::normalizer_opt_aliases;

fn wia_shaped_backend() -> Box<dyn scan_core::Backend> {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("xres", 50, 250, 50), Value::Int(120));
    ctl.add_option(int_range_option("yres", 50, 250, 50), Value::Int(120));
    normalizer_opt_aliases(Box::new(backend)).unwrap()
}

#[test]
fn resolution_alias_is_synthesized() {
    let mut backend = wia_shaped_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    assert_eq!(option_names(&opts), ["xres", "yres", "resolution"]);
}

#[test]
fn resolution_alias_reads_first_and_writes_all() {
    let mut backend = wia_shaped_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);

    let resolution = get_option(&opts, "resolution");
    assert_eq!(resolution.borrow().get_value().unwrap(), Value::Int(120));

    resolution.borrow().set_value(Value::Int(200)).unwrap();
    assert_eq!(
        get_option(&opts, "xres").borrow().get_value().unwrap(),
        Value::Int(200)
    );
    assert_eq!(
        get_option(&opts, "yres").borrow().get_value().unwrap(),
        Value::Int(200)
    );
    assert_eq!(resolution.borrow().get_value().unwrap(), Value::Int(200));
}

#[test]
fn resolution_alias_is_marked_emulated() {
    let mut backend = wia_shaped_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let desc = get_option(&opts, "resolution").borrow().descriptor();
    assert!(desc.capabilities.contains(Capabilities::EMULATED));
    assert!(desc.capabilities.contains(Capabilities::SW_SELECT));
}

#[test]
fn resolution_alias_range_is_the_intersection() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("xres", 50, 250, 50), Value::Int(100));
    ctl.add_option(int_range_option("yres", 75, 300, 50), Value::Int(100));
    let mut backend = normalizer_opt_aliases(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let desc = get_option(&opts, "resolution").borrow().descriptor();
    let Constraint::Range(range) = desc.constraint else {
        panic!("expected a range constraint");
    };
    // [50, 250] ∩ [75, 300]: values both underlying options accept
    assert_eq!(range.min, Value::Int(75));
    assert_eq!(range.max, Value::Int(250));
}

#[test]
fn alias_survives_partial_underlying_set() {
    // TWAIN shape: only x_resolution / y_resolution
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("x_resolution", 75, 600, 25), Value::Int(150));
    ctl.add_option(int_range_option("y_resolution", 75, 600, 25), Value::Int(150));
    let mut backend = normalizer_opt_aliases(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let resolution = get_option(&opts, "resolution");
    resolution.borrow().set_value(Value::Int(300)).unwrap();
    assert_eq!(
        get_option(&opts, "x_resolution")
            .borrow()
            .get_value()
            .unwrap(),
        Value::Int(300)
    );
}

fn area_backend() -> Box<dyn scan_core::Backend> {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("xpos", 0, 200, 1), Value::Int(10));
    ctl.add_option(int_range_option("xextent", 1, 210, 1), Value::Int(100));
    ctl.add_option(int_range_option("ypos", 0, 290, 1), Value::Int(20));
    ctl.add_option(int_range_option("yextent", 1, 297, 1), Value::Int(200));
    normalizer_opt_aliases(Box::new(backend)).unwrap()
}

#[test]
fn scan_area_aliases_are_synthesized() {
    let mut backend = area_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let names = option_names(&opts);
    for alias in ["tl-x", "tl-y", "br-x", "br-y"] {
        assert!(names.iter().any(|n| n == alias), "missing alias {alias}");
    }
}

#[test]
fn tl_set_preserves_bottom_right_corner() {
    let mut backend = area_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);

    // br-x = xpos + xextent = 110 before and after
    let br_x = get_option(&opts, "br-x");
    assert_eq!(br_x.borrow().get_value().unwrap(), Value::Int(110));

    let tl_x = get_option(&opts, "tl-x");
    assert_eq!(tl_x.borrow().get_value().unwrap(), Value::Int(10));
    tl_x.borrow().set_value(Value::Int(30)).unwrap();

    assert_eq!(
        get_option(&opts, "xpos").borrow().get_value().unwrap(),
        Value::Int(30)
    );
    assert_eq!(
        get_option(&opts, "xextent").borrow().get_value().unwrap(),
        Value::Int(80)
    );
    assert_eq!(br_x.borrow().get_value().unwrap(), Value::Int(110));
}

#[test]
fn br_set_adjusts_extent_only() {
    let mut backend = area_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);

    let br_y = get_option(&opts, "br-y");
    assert_eq!(br_y.borrow().get_value().unwrap(), Value::Int(220));
    br_y.borrow().set_value(Value::Int(150)).unwrap();

    assert_eq!(
        get_option(&opts, "ypos").borrow().get_value().unwrap(),
        Value::Int(20)
    );
    assert_eq!(
        get_option(&opts, "yextent").borrow().get_value().unwrap(),
        Value::Int(130)
    );
}

#[test]
fn alias_round_trips_every_constraint_value() {
    // full stack for the resolution option on a WIA-shaped driver:
    // aliases first, then the constraint normalizer above them
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(int_range_option("xres", 50, 250, 50), Value::Int(120));
    ctl.add_option(int_range_option("yres", 50, 250, 50), Value::Int(120));
    let backend = scan_wrappers::normalizers::normalizer_opt_aliases(Box::new(backend)).unwrap();
    let mut backend = scan_wrappers::normalizers::normalizer_resolution(backend).unwrap();

    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let resolution = get_option(&opts, "resolution");
    let desc = resolution.borrow().descriptor();
    let Constraint::List(values) = desc.constraint else {
        panic!("resolution constraint was not normalized to a list");
    };
    assert!(!values.is_empty());

    for value in values {
        resolution.borrow().set_value(value.clone()).unwrap();
        assert_eq!(resolution.borrow().get_value().unwrap(), value);
        assert_eq!(get_option(&opts, "xres").borrow().get_value().unwrap(), value);
        assert_eq!(get_option(&opts, "yres").borrow().get_value().unwrap(), value);
    }
}

#[test]
fn no_alias_without_underlying_options() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(str_list_option("mode", &["Color"]), Value::Str("Color".into()));
    let mut backend = normalizer_opt_aliases(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    assert_eq!(option_names(&opts), ["mode"]);
}
