//! Stop flatbed sessions after their one and only page.
//!
//! Some flatbed drivers keep reporting the same image page after page.
//! A flatbed can physically hold one sheet: once the session reports
//! the end of a page, the end of the feed follows.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use scan_core::{
    Backend, ItemType, ScanParameters, ScanResult, ScanSession, SessionRef,
};

use crate::base::{ScanStartCtx, WrapperHooks, wrap_backend};

struct OnePageSession {
    wrapped: SessionRef,
    /// Latched once the first page boundary has been observed; a
    /// flatbed holds one sheet, so that boundary is the end of the
    /// feed, whatever the driver keeps claiming.
    page_seen: bool,
}

impl OnePageSession {
    fn at_page_boundary(&mut self) -> bool {
        if self.page_seen {
            return true;
        }
        if self.wrapped.borrow_mut().end_of_page() {
            self.page_seen = true;
        }
        self.page_seen
    }
}

impl ScanSession for OnePageSession {
    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn end_of_feed(&mut self) -> bool {
        // one sheet on the glass: the first page is the last
        if self.at_page_boundary() {
            return true;
        }
        self.wrapped.borrow_mut().end_of_feed()
    }

    fn end_of_page(&mut self) -> bool {
        self.at_page_boundary()
    }

    fn scan_read(&mut self, out: &mut [u8]) -> ScanResult<usize> {
        if self.page_seen {
            return Ok(0);
        }
        self.wrapped.borrow_mut().scan_read(out)
    }

    fn cancel(&mut self) {
        self.wrapped.borrow_mut().cancel();
    }
}

struct OnePageFlatbedHooks;

impl WrapperHooks for OnePageFlatbedHooks {
    fn wrapper_name(&self) -> &'static str {
        "workaround_one_page_flatbed"
    }

    fn scan_start(&self, ctx: &ScanStartCtx<'_>) -> ScanResult<SessionRef> {
        let wrapped = ctx.forward()?;
        match ctx.item_type() {
            ItemType::Flatbed => Ok(Rc::new(RefCell::new(OnePageSession {
                wrapped,
                page_seen: false,
            }))),
            ItemType::Adf => Ok(wrapped),
            other => {
                warn!(
                    item = %ctx.item_name(),
                    ty = ?other,
                    "unexpected source type; assuming the driver stops by itself"
                );
                Ok(wrapped)
            }
        }
    }
}

pub fn workaround_one_page_flatbed(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(wrap_backend(to_wrap, OnePageFlatbedHooks))
}
