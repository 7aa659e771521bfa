mod common;

use common::*;
use scan_core::{Item, ScanOption, Value};
use scan_dumb::DumbPage;
use scan_wrappers::workarounds::workaround_set_opt_late;

fn backend_with_mode() -> (Box<dyn scan_core::Backend>, scan_dumb::DumbController) {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option("mode", &["Color", "Gray", "LineArt"]),
        Value::Str("Gray".into()),
    );
    ctl.add_option(int_range_option("resolution", 75, 600, 25), Value::Int(300));
    ctl.set_scan_result(vec![DumbPage::single(vec![1, 2, 3])]);
    (workaround_set_opt_late(Box::new(backend)).unwrap(), ctl)
}

#[test]
fn mode_write_is_buffered_until_scan_start() {
    let (mut backend, _ctl) = backend_with_mode();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let mode = get_option(&opts, "mode");

    mode.borrow().set_value(Value::Str("Color".into())).unwrap();

    // the wrapper serves the buffered value back
    assert_eq!(
        mode.borrow().get_value().unwrap(),
        Value::Str("Color".into())
    );

    // replay happens right before the driver's scan_start; a type or
    // constraint problem would surface here as an error
    let session = dev.borrow_mut().scan_start().unwrap();
    let pages = read_all_pages(&session).unwrap();
    assert_eq!(pages, vec![vec![1, 2, 3]]);

    let opts = options_of(&dev);
    assert_eq!(
        get_option(&opts, "mode").borrow().get_value().unwrap(),
        Value::Str("Color".into())
    );
}

#[test]
fn unrelated_options_pass_straight_through() {
    let (mut backend, _ctl) = backend_with_mode();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let resolution = get_option(&opts, "resolution");
    resolution.borrow().set_value(Value::Int(150)).unwrap();
    assert_eq!(resolution.borrow().get_value().unwrap(), Value::Int(150));
}

#[test]
fn buffered_value_wins_over_the_driver_value() {
    let (mut backend, _ctl) = backend_with_mode();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let mode = get_option(&opts, "mode");
    assert_eq!(mode.borrow().get_value().unwrap(), Value::Str("Gray".into()));
    mode.borrow()
        .set_value(Value::Str("LineArt".into()))
        .unwrap();
    assert_eq!(
        mode.borrow().get_value().unwrap(),
        Value::Str("LineArt".into())
    );
}
