mod common;

use common::*;
use scan_core::{ImageFormat, Item, ScanParameters, ScanSession};
use scan_dumb::DumbPage;
use scan_wrappers::format::normalizer_raw24;

fn backend_with_format(
    format: ImageFormat,
    image_size: usize,
    pages: Vec<DumbPage>,
) -> Box<dyn scan_core::Backend> {
    let (backend, ctl) = dumb_with_one_device();
    ctl.set_scan_parameters(ScanParameters {
        format,
        width: 16,
        height: 16,
        image_size,
    });
    ctl.set_scan_result(pages);
    normalizer_raw24(Box::new(backend)).unwrap()
}

#[test]
fn grayscale_bytes_are_tripled() {
    let mut backend = backend_with_format(
        ImageFormat::Grayscale8,
        4,
        vec![DumbPage::single(vec![0x10, 0x20, 0x30, 0x40])],
    );
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();

    let params = session.borrow_mut().get_scan_parameters().unwrap();
    assert_eq!(params.format, ImageFormat::RawRgb24);
    assert_eq!(params.image_size, 12);

    let pages = read_all_pages(&session).unwrap();
    assert_eq!(
        pages[0],
        vec![0x10, 0x10, 0x10, 0x20, 0x20, 0x20, 0x30, 0x30, 0x30, 0x40, 0x40, 0x40]
    );
}

#[test]
fn bw_bits_expand_msb_first() {
    // 16x16 black-and-white page: 0b00010101, 0b00001010 for row 1
    let mut body = vec![0x15u8, 0x0A];
    body.resize(32, 0x00);
    let mut backend =
        backend_with_format(ImageFormat::Bw1, 32, vec![DumbPage::single(body)]);
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();

    let params = session.borrow_mut().get_scan_parameters().unwrap();
    assert_eq!(params.format, ImageFormat::RawRgb24);
    assert_eq!(params.image_size, 32 * 24);

    let pages = read_all_pages(&session).unwrap();
    assert_eq!(pages[0].len(), 32 * 24);

    // 0b0001_0101: pixels 3, 5 and 7 are black, the rest white
    let mut first_byte = [0xFFu8; 24];
    for px in [3, 5, 7] {
        for c in 0..3 {
            first_byte[px * 3 + c] = 0x00;
        }
    }
    assert_eq!(&pages[0][..24], &first_byte);

    // 0b0000_1010: pixels 4 and 6 are black
    let mut second_byte = [0xFFu8; 24];
    for px in [4, 6] {
        for c in 0..3 {
            second_byte[px * 3 + c] = 0x00;
        }
    }
    assert_eq!(&pages[0][24..48], &second_byte);
}

#[test]
fn rgb_streams_are_passed_through_untouched() {
    let mut backend = backend_with_format(
        ImageFormat::RawRgb24,
        6,
        vec![DumbPage::single(vec![1, 2, 3, 4, 5, 6])],
    );
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();
    let pages = read_all_pages(&session).unwrap();
    assert_eq!(pages, vec![vec![1, 2, 3, 4, 5, 6]]);
}

#[test]
fn tiny_buffers_ask_for_a_retry() {
    let mut backend = backend_with_format(
        ImageFormat::Grayscale8,
        2,
        vec![DumbPage::single(vec![0xAA, 0xBB])],
    );
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();

    let mut tiny = [0u8; 2];
    assert_eq!(session.borrow_mut().scan_read(&mut tiny).unwrap(), 0);

    let mut big = [0u8; 64];
    let nb = session.borrow_mut().scan_read(&mut big).unwrap();
    assert_eq!(nb, 6);
    assert_eq!(&big[..6], &[0xAA, 0xAA, 0xAA, 0xBB, 0xBB, 0xBB]);
}

#[test]
fn bw_buffer_rounds_down_to_whole_input_bytes() {
    let mut backend = backend_with_format(
        ImageFormat::Bw1,
        2,
        vec![DumbPage::single(vec![0xFF, 0x00])],
    );
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();

    let mut tiny = [0u8; 23];
    assert_eq!(session.borrow_mut().scan_read(&mut tiny).unwrap(), 0);

    // 30 usable bytes round down to 24: exactly one input byte
    let mut medium = [0u8; 30];
    let nb = session.borrow_mut().scan_read(&mut medium).unwrap();
    assert_eq!(nb, 24);
    assert!(medium[..24].iter().all(|&b| b == 0x00));

    let mut rest = [0u8; 64];
    let nb = session.borrow_mut().scan_read(&mut rest).unwrap();
    assert_eq!(nb, 24);
    assert!(rest[..24].iter().all(|&b| b == 0xFF));
}

#[test]
fn multi_page_feeds_keep_expanding() {
    let mut backend = backend_with_format(
        ImageFormat::Grayscale8,
        2,
        vec![
            DumbPage::single(vec![0x01, 0x02]),
            DumbPage::single(vec![0x03, 0x04]),
        ],
    );
    let dev = get_device(&mut backend);
    let session = dev.borrow_mut().scan_start().unwrap();
    let pages = read_all_pages(&session).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], vec![0x01, 0x01, 0x01, 0x02, 0x02, 0x02]);
    assert_eq!(pages[1], vec![0x03, 0x03, 0x03, 0x04, 0x04, 0x04]);
}
