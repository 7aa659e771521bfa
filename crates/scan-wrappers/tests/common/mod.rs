//! Shared helpers for the wrapper test suites.

#![allow(dead_code)]

use scan_core::{
    Backend, Capabilities, Constraint, Item, ItemRef, OptionDescriptor, OptionRef, ScanOption,
    ScanResult, ScanSession, SessionRef, Unit, Value, ValueRange, ValueType,
};
use scan_dumb::{DumbBackend, DumbController};

pub fn dumb_with_one_device() -> (DumbBackend, DumbController) {
    let backend = DumbBackend::new("dumb");
    let ctl = backend.controller();
    ctl.set_nb_devices(1);
    (backend, ctl)
}

pub fn int_range_option(name: &str, min: i32, max: i32, interval: i32) -> OptionDescriptor {
    OptionDescriptor {
        name: name.to_string(),
        title: name.to_string(),
        desc: format!("{name} option"),
        capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
        value_type: ValueType::Int,
        unit: Unit::Dpi,
        constraint: Constraint::Range(ValueRange {
            min: Value::Int(min),
            max: Value::Int(max),
            interval: Value::Int(interval),
        }),
    }
}

pub fn str_list_option(name: &str, values: &[&str]) -> OptionDescriptor {
    OptionDescriptor {
        name: name.to_string(),
        title: name.to_string(),
        desc: format!("{name} option"),
        capabilities: Capabilities::READABLE | Capabilities::SW_SELECT,
        value_type: ValueType::Str,
        unit: Unit::None,
        constraint: Constraint::List(values.iter().map(|v| Value::Str((*v).to_string())).collect()),
    }
}

pub fn get_device(backend: &mut Box<dyn Backend>) -> ItemRef {
    backend.get_device("dumb dev0").expect("get_device")
}

pub fn option_names(options: &[OptionRef]) -> Vec<String> {
    options
        .iter()
        .map(|option| option.borrow().descriptor().name)
        .collect()
}

pub fn get_option(options: &[OptionRef], name: &str) -> OptionRef {
    scan_core::find_option(options, name)
        .unwrap_or_else(|| panic!("option '{name}' not found"))
}

/// Drain a whole session, page by page.
pub fn read_all_pages(session: &SessionRef) -> ScanResult<Vec<Vec<u8>>> {
    let mut pages = Vec::new();
    loop {
        let mut page = Vec::new();
        loop {
            if session.borrow_mut().end_of_page() {
                break;
            }
            let mut buf = [0u8; 64];
            let nb = session.borrow_mut().scan_read(&mut buf)?;
            page.extend_from_slice(&buf[..nb]);
        }
        pages.push(page);
        if session.borrow_mut().end_of_feed() {
            break;
        }
    }
    Ok(pages)
}

/// Drain a session but stop after `max_pages`, for backends that never
/// end the feed by themselves.
pub fn read_pages_capped(session: &SessionRef, max_pages: usize) -> ScanResult<Vec<Vec<u8>>> {
    let mut pages = Vec::new();
    while pages.len() < max_pages {
        let mut page = Vec::new();
        loop {
            if session.borrow_mut().end_of_page() {
                break;
            }
            let mut buf = [0u8; 64];
            let nb = session.borrow_mut().scan_read(&mut buf)?;
            page.extend_from_slice(&buf[..nb]);
        }
        pages.push(page);
        if session.borrow_mut().end_of_feed() {
            break;
        }
    }
    Ok(pages)
}

pub fn children_of(item: &ItemRef) -> Vec<ItemRef> {
    item.borrow_mut().get_children().expect("get_children")
}

pub fn options_of(item: &ItemRef) -> Vec<OptionRef> {
    item.borrow_mut().get_options().expect("get_options")
}
