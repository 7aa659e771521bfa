//! Peel BMP framing off the scan stream and emit raw RGB24.
//!
//! WIA drivers must support BMP output and many support nothing else.
//! When the wrapped session advertises BMP, this wrapper reads the
//! 54-byte header, the palette, and any surplus bytes up to
//! `offset_to_data`, then decodes the pixel stream:
//!
//! * 24-bit: BGR triples become RGB, per-row padding is stripped;
//! * 8-bit: palette lookup (grey ramp when the palette is empty);
//! * 1-bit: MSB first, palette entry 0 for a set bit, entry 1 for a
//!   clear one, black/white when there is no palette;
//! * bottom-to-top row order (positive height) is reversed.
//!
//! On multi-page feeds a fresh header is parsed at every page boundary.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{error, info, warn};

use scan_core::{
    Backend, ImageFormat, ScanError, ScanParameters, ScanResult, ScanSession, SessionRef,
};

use crate::base::{ScanStartCtx, WrapperHooks, wrap_backend};
use crate::format::bmp::{BMP_HEADER_SIZE, BmpHeader, parse_header};

/// Read exactly `buf.len()` bytes from the wrapped session.
fn read_full(wrapped: &SessionRef, buf: &mut [u8]) -> ScanResult<()> {
    let mut filled = 0;
    let mut stalls = 0u32;
    while filled < buf.len() {
        let nb = wrapped.borrow_mut().scan_read(&mut buf[filled..])?;
        if nb == 0 {
            if wrapped.borrow_mut().end_of_feed() {
                error!(
                    remaining = buf.len() - filled,
                    "unexpected end of stream while reading BMP data"
                );
                return Err(ScanError::ImageFormatNotSupported);
            }
            stalls += 1;
            if stalls > 65536 {
                error!("wrapped session keeps returning no data");
                return Err(ScanError::Io("stalled scan stream".to_string()));
            }
            continue;
        }
        stalls = 0;
        filled += nb;
    }
    Ok(())
}

/// Discard `nb` bytes from the wrapped session.
fn skip_bytes(wrapped: &SessionRef, mut nb: usize) -> ScanResult<()> {
    let mut scratch = [0u8; BMP_HEADER_SIZE];
    while nb > 0 {
        let want = nb.min(scratch.len());
        read_full(wrapped, &mut scratch[..want])?;
        nb -= want;
    }
    Ok(())
}

struct PageState {
    header: BmpHeader,
    palette: Vec<[u8; 3]>,
    /// Rows decoded to RGB, waiting to be handed out (bottom-up pages
    /// only; they are collected in stored order and served in reverse).
    buffered_rows: Vec<Vec<u8>>,
    pending: Vec<u8>,
    pending_off: usize,
    rows_fed: usize,
    rows_emitted: usize,
}

impl PageState {
    fn complete(&self) -> bool {
        self.rows_emitted as u32 >= self.header.height && self.pending_off >= self.pending.len()
    }
}

fn parse_page(wrapped: &SessionRef) -> ScanResult<PageState> {
    let mut buf = [0u8; BMP_HEADER_SIZE];
    read_full(wrapped, &mut buf)?;
    let header = parse_header(&buf)?;

    let palette_room = header.offset_to_data as usize - BMP_HEADER_SIZE;
    let palette_len = (header.nb_colors_in_palette as usize * 4).min(palette_room);
    let mut palette = Vec::with_capacity(palette_len / 4);
    if palette_len > 0 {
        let mut raw = vec![0u8; palette_len];
        read_full(wrapped, &mut raw)?;
        for bgra in raw.chunks_exact(4) {
            palette.push([bgra[2], bgra[1], bgra[0]]);
        }
    }

    let surplus = header.offset_to_data as usize - BMP_HEADER_SIZE - palette_len;
    if surplus > 0 {
        info!(surplus, "extra BMP header bytes skipped");
        skip_bytes(wrapped, surplus)?;
    }

    Ok(PageState {
        header,
        palette,
        buffered_rows: Vec::new(),
        pending: Vec::new(),
        pending_off: 0,
        rows_fed: 0,
        rows_emitted: 0,
    })
}

fn decode_row(header: &BmpHeader, palette: &[[u8; 3]], raw: &[u8]) -> Vec<u8> {
    let width = header.width as usize;
    let mut row = Vec::with_capacity(width * 3);
    match header.bits_per_pixel {
        24 => {
            for bgr in raw[..width * 3].chunks_exact(3) {
                row.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
            }
        }
        8 => {
            for &idx in &raw[..width] {
                match palette.get(idx as usize) {
                    Some(rgb) => row.extend_from_slice(rgb),
                    None => row.extend_from_slice(&[idx, idx, idx]),
                }
            }
        }
        1 => {
            for px in 0..width {
                let byte = raw[px / 8];
                let set = byte & (1 << (7 - (px % 8))) != 0;
                let rgb = if palette.len() >= 2 {
                    // BMP convention: entry 0 for a set bit
                    if set { palette[0] } else { palette[1] }
                } else if set {
                    [0x00, 0x00, 0x00]
                } else {
                    [0xFF, 0xFF, 0xFF]
                };
                row.extend_from_slice(&rgb);
            }
        }
        _ => unreachable!("depth validated by the header parser"),
    }
    row
}

struct Bmp2RawSession {
    wrapped: SessionRef,
    page: Option<PageState>,
    last_params: ScanParameters,
    delayed_err: Option<ScanError>,
    cancelled: bool,
}

impl Bmp2RawSession {
    fn new(wrapped: SessionRef) -> ScanResult<Self> {
        let page = parse_page(&wrapped)?;
        let last_params = page.header.scan_parameters();
        Ok(Self {
            wrapped,
            page: Some(page),
            last_params,
            delayed_err: None,
            cancelled: false,
        })
    }

    /// Decode until `pending` holds the next chunk of output.
    fn refill(&mut self) -> ScanResult<()> {
        let Some(page) = self.page.as_mut() else {
            return Ok(());
        };
        if page.pending_off < page.pending.len() || page.complete() {
            return Ok(());
        }

        let stride = page.header.row_stride();
        let height = page.header.height as usize;
        if page.header.top_to_bottom {
            let mut raw = vec![0u8; stride];
            read_full(&self.wrapped, &mut raw)?;
            page.rows_fed += 1;
            let row = decode_row(&page.header, &page.palette, &raw);
            page.pending = row;
            page.pending_off = 0;
            page.rows_emitted += 1;
        } else {
            // bottom-up: the whole page must be read before the first
            // output row can be served
            while page.rows_fed < height {
                let mut raw = vec![0u8; stride];
                read_full(&self.wrapped, &mut raw)?;
                let row = decode_row(&page.header, &page.palette, &raw);
                page.buffered_rows.push(row);
                page.rows_fed += 1;
            }
            if let Some(row) = page.buffered_rows.pop() {
                page.pending = row;
                page.pending_off = 0;
                page.rows_emitted += 1;
            }
        }
        Ok(())
    }
}

impl ScanSession for Bmp2RawSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        Ok(self.last_params)
    }

    fn end_of_feed(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        let page_done = self.page.as_ref().is_none_or(PageState::complete);
        page_done && self.wrapped.borrow_mut().end_of_feed()
    }

    fn end_of_page(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        match &self.page {
            None => true,
            Some(page) if page.complete() => {
                // page boundary: let the wrapped session move on, then
                // prime the next page so parameters are available
                // before its first read
                let _ = self.wrapped.borrow_mut().end_of_page();
                if self.wrapped.borrow_mut().end_of_feed() {
                    self.page = None;
                } else {
                    match parse_page(&self.wrapped) {
                        Ok(page) => {
                            self.last_params = page.header.scan_parameters();
                            self.page = Some(page);
                        }
                        Err(err) => {
                            error!(%err, "failed to read the next BMP header");
                            self.delayed_err = Some(err);
                            self.page = None;
                        }
                    }
                }
                true
            }
            Some(_) => false,
        }
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        if let Some(err) = &self.delayed_err {
            warn!(%err, "delayed error");
            return Err(err.clone());
        }
        if self.cancelled {
            return Err(ScanError::Cancelled);
        }
        if out.is_empty() {
            return Ok(0);
        }
        self.refill()?;
        let Some(page) = self.page.as_mut() else {
            return Ok(0);
        };
        let available = &page.pending[page.pending_off..];
        let nb = available.len().min(out.len());
        out[..nb].copy_from_slice(&available[..nb]);
        page.pending_off += nb;
        Ok(nb)
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.wrapped.borrow_mut().cancel();
    }
}

struct Bmp2RawHooks;

impl WrapperHooks for Bmp2RawHooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_bmp2raw"
    }

    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        let wrapped = ctx.forward()?;
        let params = wrapped.borrow_mut().get_scan_parameters()?;
        if params.format != ImageFormat::Bmp {
            warn!(format = ?params.format, "unexpected image format; returning it as is");
            return Ok(wrapped);
        }
        match Bmp2RawSession::new(wrapped.clone()) {
            Ok(session) => Ok(Rc::new(RefCell::new(session))),
            Err(err) => {
                error!(%err, "failed to read the first BMP header");
                wrapped.borrow_mut().cancel();
                Err(err)
            }
        }
    }
}

pub fn normalizer_bmp2raw(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, Bmp2RawHooks))
}
