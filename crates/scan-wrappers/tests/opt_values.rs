mod common;

use common::*;
use scan_core::{Constraint, ScanOption, Value};
use scan_wrappers::workarounds::workaround_opt_values;

fn brother_backend() -> Box<dyn scan_core::Backend> {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option(
            "mode",
            &[
                "Black & White",
                "Gray[Error Diffusion]",
                "True Gray",
                "24bit Color",
                "24bit Color[Fast]",
            ],
        ),
        Value::Str("24bit Color".into()),
    );
    workaround_opt_values(Box::new(backend)).unwrap()
}

fn constraint_strings(constraint: &Constraint) -> Vec<String> {
    let Constraint::List(values) = constraint else {
        panic!("expected a list constraint");
    };
    values
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn brother_mode_values_are_rewritten() {
    let mut backend = brother_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let desc = get_option(&opts, "mode").borrow().descriptor();
    assert_eq!(
        constraint_strings(&desc.constraint),
        [
            "LineArt",
            "Gray[Error Diffusion]",
            "Gray",
            "Color",
            "24bit Color[Fast]"
        ]
    );
}

#[test]
fn get_translates_to_canonical() {
    let mut backend = brother_backend();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let mode = get_option(&opts, "mode");
    assert_eq!(
        mode.borrow().get_value().unwrap(),
        Value::Str("Color".into())
    );
}

#[test]
fn set_translates_back_to_the_vendor_spelling() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option("mode", &["Black & White", "True Gray", "24bit Color"]),
        Value::Str("True Gray".into()),
    );
    let mut wrapped = workaround_opt_values(Box::new(backend)).unwrap();
    let dev = get_device(&mut wrapped);
    let opts = options_of(&dev);
    let mode = get_option(&opts, "mode");

    mode.borrow().set_value(Value::Str("LineArt".into())).unwrap();
    // reading back goes vendor spelling -> canonical again
    assert_eq!(
        mode.borrow().get_value().unwrap(),
        Value::Str("LineArt".into())
    );
}

#[test]
fn french_sane_translations_are_rewritten() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option(
            "source",
            &["Scanneur à plat", "Chargeur automatique de documents (ADF)"],
        ),
        Value::Str("Scanneur à plat".into()),
    );
    let mut backend = workaround_opt_values(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let source = get_option(&opts, "source");
    let desc = source.borrow().descriptor();
    assert_eq!(constraint_strings(&desc.constraint), ["flatbed", "feeder"]);
    assert_eq!(
        source.borrow().get_value().unwrap(),
        Value::Str("flatbed".into())
    );
    source
        .borrow()
        .set_value(Value::Str("feeder".into()))
        .unwrap();
    assert_eq!(
        source.borrow().get_value().unwrap(),
        Value::Str("feeder".into())
    );
}

#[test]
fn unmapped_options_are_untouched() {
    let (backend, ctl) = dumb_with_one_device();
    ctl.add_option(
        str_list_option("paper-size", &["A4", "Letter"]),
        Value::Str("A4".into()),
    );
    let mut backend = workaround_opt_values(Box::new(backend)).unwrap();
    let dev = get_device(&mut backend);
    let opts = options_of(&dev);
    let desc = get_option(&opts, "paper-size").borrow().descriptor();
    assert_eq!(constraint_strings(&desc.constraint), ["A4", "Letter"]);
}
