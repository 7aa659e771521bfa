//! Image format pipeline.
//!
//! Whatever the driver emits, applications get `RAW_RGB_24`: 8 bits per
//! channel, rows top-to-bottom, no padding, `image_size = width ×
//! height × 3`. Two layers cooperate: [`bmp2raw`] peels BMP framing
//! off drivers that only speak BMP (WIA), [`raw24`] expands grayscale
//! and black-and-white raw streams (Sane).

pub mod bmp;
mod bmp2raw;
mod raw24;

pub use bmp2raw::normalizer_bmp2raw;
pub use raw24::normalizer_raw24;
