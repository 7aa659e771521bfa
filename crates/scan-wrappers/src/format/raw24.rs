//! Expand grayscale and black-and-white raw streams to RGB24.
//!
//! Sane drivers report RAW1 (black and white), RAW8 (grayscale) or
//! RAW24 depending on the mode. Applications get RAW24 in all cases:
//! grayscale bytes are tripled, 1-bit bytes expand MSB-first to
//! 24 output bytes (a set bit is black).
//!
//! The expansion happens in place, from the tail of the caller's
//! buffer: the wrapped session is asked for at most `len / factor`
//! bytes, so the expanded result always fits. A buffer too small for
//! even one expansion unit yields `Ok(0)`; the caller is expected to
//! come back with a bigger one.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use scan_core::{
    Backend, ImageFormat, ScanParameters, ScanResult, ScanSession, SessionRef,
};

use crate::base::{ScanStartCtx, WrapperHooks, wrap_backend};

/// Triple every grayscale byte, working backwards so the expansion can
/// share the input buffer.
fn unpack_8_to_24(buf: &mut [u8], nb_in: usize) -> usize {
    for i in (0..nb_in).rev() {
        let val = buf[i];
        buf[i * 3] = val;
        buf[i * 3 + 1] = val;
        buf[i * 3 + 2] = val;
    }
    nb_in * 3
}

/// Expand every input byte into 8 RGB pixels, MSB first. A set bit is
/// black (0x00), a clear bit white (0xFF).
fn unpack_1_to_24(buf: &mut [u8], nb_in: usize) -> usize {
    for i in (0..nb_in).rev() {
        let byte = buf[i];
        for bit in 0..8 {
            let val = if byte & (1 << (7 - bit)) != 0 {
                0x00
            } else {
                0xFF
            };
            let base = i * 24 + bit * 3;
            buf[base] = val;
            buf[base + 1] = val;
            buf[base + 2] = val;
        }
    }
    nb_in * 24
}

fn expanded_params(params: ScanParameters) -> ScanParameters {
    match params.format {
        ImageFormat::Grayscale8 => ScanParameters {
            format: ImageFormat::RawRgb24,
            image_size: params.image_size * 3,
            ..params
        },
        ImageFormat::Bw1 => ScanParameters {
            format: ImageFormat::RawRgb24,
            // 8 pixels per input byte, 3 output bytes per pixel
            image_size: params.image_size * 8 * 3,
            ..params
        },
        _ => params,
    }
}

struct Raw24Session {
    wrapped: SessionRef,
    format: ImageFormat,
}

impl ScanSession for Raw24Session {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        let params = self.wrapped.borrow_mut().get_scan_parameters()?;
        Ok(expanded_params(params))
    }

    fn end_of_feed(&mut self) -> bool {
        self.wrapped.borrow_mut().end_of_feed()
    }

    fn end_of_page(&mut self) -> bool {
        self.wrapped.borrow_mut().end_of_page()
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        match self.format {
            ImageFormat::Grayscale8 => {
                if out.len() < 3 {
                    warn!(len = out.len(), "buffer too small to unpack raw8");
                    return Ok(0);
                }
                let want = out.len() / 3;
                let nb = self.wrapped.borrow_mut().scan_read(&mut out[..want])?;
                Ok(unpack_8_to_24(out, nb))
            }
            ImageFormat::Bw1 => {
                let usable = out.len() - (out.len() % 24);
                if usable < 24 {
                    warn!(len = out.len(), "buffer too small to unpack raw1");
                    return Ok(0);
                }
                let want = usable / 24;
                let nb = self.wrapped.borrow_mut().scan_read(&mut out[..want])?;
                Ok(unpack_1_to_24(out, nb))
            }
            _ => self.wrapped.borrow_mut().scan_read(out),
        }
    }

    fn cancel(&mut self) {
        self.wrapped.borrow_mut().cancel();
    }
}

struct Raw24Hooks;

impl WrapperHooks for Raw24Hooks {
    fn wrapper_name(&self) -> &'static str {
        "normalizer_raw24"
    }

    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        let wrapped = ctx.forward()?;
        let params = wrapped.borrow_mut().get_scan_parameters()?;
        match params.format {
            ImageFormat::RawRgb24 => Ok(wrapped),
            ImageFormat::Grayscale8 => {
                info!("will automatically convert from grayscale to RGB");
                Ok(Rc::new(RefCell::new(Raw24Session {
                    wrapped,
                    format: ImageFormat::Grayscale8,
                })))
            }
            ImageFormat::Bw1 => {
                info!("will automatically convert from black and white to RGB");
                Ok(Rc::new(RefCell::new(Raw24Session {
                    wrapped,
                    format: ImageFormat::Bw1,
                })))
            }
            other => {
                warn!(format = ?other, "unsupported image format; passed through");
                Ok(wrapped)
            }
        }
    }
}

pub fn normalizer_raw24(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, Raw24Hooks))
}
