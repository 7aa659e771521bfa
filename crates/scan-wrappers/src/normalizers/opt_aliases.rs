//! Synthesize canonical aliases for resolution and scan-area options.
//!
//! WIA drivers expose `xres`/`yres` and position+extent pairs
//! (`xpos`/`xextent`, ...); TWAIN uses `x_resolution`/`y_resolution`.
//! Sane's names are the canonical ones. This wrapper adds `resolution`,
//! `tl-x`, `tl-y`, `br-x` and `br-y` on top of whatever is there:
//!
//! * `resolution` reads the first underlying alias and writes all of
//!   them;
//! * `tl-*` reads the position and writes position + extent so that
//!   `pos + extent` is preserved;
//! * `br-*` reads `pos + extent` and writes `extent = br - pos`.
//!
//! The alias inherits the capabilities of its underlying options ORed
//! with `EMULATED`. When all underlying constraints are integer ranges,
//! the alias range is their intersection (`resolution`, `tl-*`) or
//! their upper envelope (`br-*`).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, error, info};

use scan_core::{
    Backend, Capabilities, Constraint, DeviceDescriptor, DeviceLocations, Item, ItemRef, ItemType,
    OptionDescriptor, OptionRef, ScanError, ScanOption, ScanParameters, ScanResult, SessionRef,
    SetFlags, Value, ValueRange, ValueType, find_option, opt,
};

#[derive(Clone, Copy, PartialEq)]
enum AliasKind {
    /// Read the first underlying option, write all of them.
    Simple,
    /// Alias over (pos, extent): get = pos, set keeps pos+extent.
    TopLeft,
    /// Alias over (pos, extent): get = pos+extent, set writes extent.
    BottomRight,
}

struct AliasSpec {
    name: &'static str,
    underlying: &'static [&'static str],
    require_all: bool,
    kind: AliasKind,
}

const ALIASES: [AliasSpec; 5] = [
    AliasSpec {
        name: opt::RESOLUTION,
        // WIA2, then TWAIN
        underlying: &["xres", "yres", "x_resolution", "y_resolution"],
        require_all: false,
        kind: AliasKind::Simple,
    },
    AliasSpec {
        name: opt::TL_X,
        underlying: &["xpos", "xextent"],
        require_all: true,
        kind: AliasKind::TopLeft,
    },
    AliasSpec {
        name: opt::TL_Y,
        underlying: &["ypos", "yextent"],
        require_all: true,
        kind: AliasKind::TopLeft,
    },
    AliasSpec {
        name: opt::BR_X,
        underlying: &["xpos", "xextent"],
        require_all: true,
        kind: AliasKind::BottomRight,
    },
    AliasSpec {
        name: opt::BR_Y,
        underlying: &["ypos", "yextent"],
        require_all: true,
        kind: AliasKind::BottomRight,
    },
];

struct AliasBackend {
    wrapped: Box<dyn Backend>,
}

impl Backend for AliasBackend {
    fn base_name(&self) -> &str {
        self.wrapped.base_name()
    }

    fn list_devices(&mut self, locations: DeviceLocations) -> ScanResult<Vec<DeviceDescriptor>> {
        self.wrapped.list_devices(locations)
    }

    fn get_device(&mut self, dev_id: &str) -> ScanResult<ItemRef> {
        let wrapped = self.wrapped.get_device(dev_id)?;
        Ok(Rc::new(RefCell::new(AliasItem {
            wrapped,
            closed: false,
        })))
    }

    fn cleanup(&mut self) {
        self.wrapped.cleanup();
    }
}

struct AliasItem {
    wrapped: ItemRef,
    closed: bool,
}

impl Item for AliasItem {
    fn name(&self) -> String {
        self.wrapped.borrow().name()
    }

    fn item_type(&self) -> ItemType {
        self.wrapped.borrow().item_type()
    }

    fn get_children(&mut self) -> ScanResult<Vec<ItemRef>> {
        let children = self.wrapped.borrow_mut().get_children()?;
        Ok(children
            .into_iter()
            .map(|child| {
                Rc::new(RefCell::new(AliasItem {
                    wrapped: child,
                    closed: false,
                })) as ItemRef
            })
            .collect())
    }

    fn get_options(&mut self) -> ScanResult<Vec<OptionRef>> {
        let options = self.wrapped.borrow_mut().get_options()?;
        let mut out = options.clone();
        for spec in &ALIASES {
            let underlying: Vec<OptionRef> = spec
                .underlying
                .iter()
                .filter_map(|name| find_option(&options, name))
                .collect();
            if underlying.is_empty() {
                debug!(alias = spec.name, "no aliased option; alias not created");
                continue;
            }
            if spec.require_all && underlying.len() != spec.underlying.len() {
                debug!(
                    alias = spec.name,
                    "not all required options available; alias not created"
                );
                continue;
            }
            info!(alias = spec.name, "alias option added");
            out.push(Rc::new(RefCell::new(AliasOption::new(spec, underlying))));
        }
        Ok(out)
    }

    fn get_scan_parameters(&mut self) -> ScanResult<ScanParameters> {
        self.wrapped.borrow_mut().get_scan_parameters()
    }

    fn scan_start(&mut self) -> ScanResult<SessionRef> {
        self.wrapped.borrow_mut().scan_start()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.wrapped.borrow_mut().close();
    }
}

struct AliasOption {
    desc: OptionDescriptor,
    kind: AliasKind,
    underlying: Vec<OptionRef>,
}

impl AliasOption {
    fn new(spec: &AliasSpec, underlying: Vec<OptionRef>) -> Self {
        let mut desc = underlying[0].borrow().descriptor();
        desc.name = spec.name.to_string();
        desc.capabilities = underlying
            .iter()
            .fold(Capabilities::EMULATED, |caps, option| {
                caps | option.borrow().descriptor().capabilities
            });
        if let Some(range) = combined_range(spec.kind, &underlying) {
            desc.constraint = Constraint::Range(range);
        }
        Self {
            desc,
            kind: spec.kind,
            underlying,
        }
    }

    fn pos(&self) -> &OptionRef {
        &self.underlying[0]
    }

    fn extent(&self) -> &OptionRef {
        &self.underlying[1]
    }
}

/// Intersection of the underlying integer ranges (`Simple`/`TopLeft`)
/// or their upper envelope (`BottomRight`). `None` when any underlying
/// option is not an integer range.
fn combined_range(kind: AliasKind, underlying: &[OptionRef]) -> Option<ValueRange> {
    let mut combined: Option<(i32, i32, Value)> = None;
    for option in underlying {
        let desc = option.borrow().descriptor();
        if desc.value_type != ValueType::Int {
            return None;
        }
        let Constraint::Range(range) = desc.constraint else {
            return None;
        };
        let (Value::Int(min), Value::Int(max)) = (&range.min, &range.max) else {
            return None;
        };
        combined = Some(match combined {
            None => (*min, *max, range.interval.clone()),
            Some((cur_min, cur_max, _)) => {
                if kind == AliasKind::BottomRight {
                    (cur_min.max(*min), cur_max.max(*max), range.interval.clone())
                } else {
                    // intersection: every underlying option must accept
                    // the value the alias writes
                    (cur_min.max(*min), cur_max.min(*max), range.interval.clone())
                }
            }
        });
    }
    combined.map(|(min, max, interval)| ValueRange {
        min: Value::Int(min),
        max: Value::Int(max),
        interval,
    })
}

impl ScanOption for AliasOption {
    fn descriptor(&self) -> OptionDescriptor {
        self.desc.clone()
    }

    fn get_value(&self) -> ScanResult<Value> {
        match self.kind {
            AliasKind::Simple | AliasKind::TopLeft => self.underlying[0].borrow().get_value(),
            AliasKind::BottomRight => {
                let pos = self.pos().borrow().get_value()?;
                let extent = self.extent().borrow().get_value()?;
                pos.add(&extent)
            }
        }
    }

    fn set_value(&self, value: Value) -> ScanResult<SetFlags> {
        match self.kind {
            AliasKind::Simple => {
                let mut flags = SetFlags::empty();
                let mut failure: Option<ScanError> = None;
                for option in &self.underlying {
                    match option.borrow().set_value(value.clone()) {
                        Ok(f) => flags |= f,
                        Err(err) => {
                            error!(
                                alias = %self.desc.name,
                                option = %option.borrow().descriptor().name,
                                %err,
                                "failed to set aliased option"
                            );
                            failure = Some(err);
                        }
                    }
                }
                match failure {
                    Some(err) => Err(err),
                    None => Ok(flags),
                }
            }
            AliasKind::TopLeft => {
                // keep pos + extent stable: the bottom-right corner must
                // not move when the top-left one does
                let pos = self.pos().borrow().get_value()?;
                let extent = self.extent().borrow().get_value()?;
                let total = pos.add(&extent)?;
                let new_extent = total.sub(&value)?;
                let mut flags = self.pos().borrow().set_value(value)?;
                flags |= self.extent().borrow().set_value(new_extent)?;
                Ok(flags)
            }
            AliasKind::BottomRight => {
                let pos = self.pos().borrow().get_value()?;
                let new_extent = value.sub(&pos)?;
                self.extent().borrow().set_value(new_extent)
            }
        }
    }
}

pub fn normalizer_opt_aliases(to_wrap: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    Ok(Box::new(AliasBackend { wrapped: to_wrap }))
}
