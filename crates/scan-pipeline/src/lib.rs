//! Pipeline composition policy.
//!
//! [`safebet`] is the recommended stack: base backends behind a
//! multiplexer, then every normalizer and workaround in the order that
//! is known to work, the dedicated worker thread last. Each wrapper can
//! be switched off (or on) with its `LIBINSANE_<WRAPPER>` environment
//! variable; base backends have `LIBINSANE_SANE`-style switches.
//!
//! [`parse_pipeline`] builds an arbitrary chain from a comma-separated
//! string (`dumb,source_nodes,raw24,...`), mainly for tests and
//! debugging.

mod multiplexer;

use tracing::{error, info};

use scan_core::{Backend, ScanError, ScanResult, env_flag};
use scan_dumb::DumbBackend;
use scan_isolation::workaround_dedicated_thread;
use scan_wrappers::format::{normalizer_bmp2raw, normalizer_raw24};
use scan_wrappers::normalizers::{
    normalizer_all_opts_on_all_sources, normalizer_clean_dev_descs, normalizer_min_one_source,
    normalizer_opt_aliases, normalizer_resolution, normalizer_safe_defaults,
    normalizer_source_names, normalizer_source_nodes, normalizer_source_types,
};
use scan_wrappers::workarounds::{
    workaround_cache, workaround_check_capabilities, workaround_lamp,
    workaround_one_page_flatbed, workaround_opt_names, workaround_opt_values,
    workaround_set_opt_late,
};

pub use multiplexer::multiplexer;

type WrapFn = fn(Box<dyn Backend>) -> ScanResult<Box<dyn Backend>>;

struct WrapperEntry {
    name: &'static str,
    env: &'static str,
    enabled_by_default: bool,
    wrap: WrapFn,
}

/// Composition order, innermost first. The dedicated thread is handled
/// separately: it must wrap the finished stack.
const WRAPPERS: [WrapperEntry; 17] = [
    WrapperEntry {
        name: "workaround_check_capabilities",
        env: "LIBINSANE_WORKAROUND_CHECK_CAPABILITIES",
        enabled_by_default: true,
        wrap: workaround_check_capabilities,
    },
    WrapperEntry {
        name: "workaround_cache",
        env: "LIBINSANE_WORKAROUND_CACHE",
        enabled_by_default: true,
        wrap: workaround_cache,
    },
    WrapperEntry {
        name: "workaround_lamp",
        env: "LIBINSANE_WORKAROUND_LAMP",
        // Sane only
        enabled_by_default: cfg!(not(windows)),
        wrap: workaround_lamp,
    },
    WrapperEntry {
        name: "workaround_set_opt_late",
        env: "LIBINSANE_WORKAROUND_SET_OPT_LATE",
        // TWAIN only
        enabled_by_default: cfg!(windows),
        wrap: workaround_set_opt_late,
    },
    WrapperEntry {
        name: "normalizer_opt_aliases",
        env: "LIBINSANE_NORMALIZER_OPT_ALIASES",
        // Sane names are already the canonical ones
        enabled_by_default: cfg!(windows),
        wrap: normalizer_opt_aliases,
    },
    WrapperEntry {
        name: "workaround_opt_values",
        env: "LIBINSANE_WORKAROUND_OPT_VALUES",
        enabled_by_default: true,
        wrap: workaround_opt_values,
    },
    WrapperEntry {
        name: "workaround_opt_names",
        env: "LIBINSANE_WORKAROUND_OPT_NAMES",
        enabled_by_default: true,
        wrap: workaround_opt_names,
    },
    WrapperEntry {
        name: "normalizer_bmp2raw",
        env: "LIBINSANE_NORMALIZER_BMP2RAW",
        // WIA returns BMP images
        enabled_by_default: cfg!(windows),
        wrap: normalizer_bmp2raw,
    },
    WrapperEntry {
        name: "normalizer_raw24",
        env: "LIBINSANE_NORMALIZER_RAW24",
        // Sane returns various raw formats
        enabled_by_default: cfg!(not(windows)),
        wrap: normalizer_raw24,
    },
    WrapperEntry {
        name: "normalizer_resolution",
        env: "LIBINSANE_NORMALIZER_RESOLUTION",
        enabled_by_default: true,
        wrap: normalizer_resolution,
    },
    WrapperEntry {
        name: "normalizer_clean_dev_descs",
        env: "LIBINSANE_NORMALIZER_CLEAN_DEV_DESCS",
        enabled_by_default: true,
        wrap: normalizer_clean_dev_descs,
    },
    WrapperEntry {
        name: "normalizer_safe_defaults",
        env: "LIBINSANE_NORMALIZER_SAFE_DEFAULTS",
        enabled_by_default: true,
        wrap: normalizer_safe_defaults,
    },
    WrapperEntry {
        name: "normalizer_source_nodes",
        env: "LIBINSANE_NORMALIZER_SOURCE_NODES",
        enabled_by_default: true,
        wrap: normalizer_source_nodes,
    },
    WrapperEntry {
        name: "normalizer_min_one_source",
        env: "LIBINSANE_NORMALIZER_MIN_ONE_SOURCE",
        enabled_by_default: true,
        wrap: normalizer_min_one_source,
    },
    WrapperEntry {
        name: "normalizer_source_names",
        env: "LIBINSANE_NORMALIZER_SOURCE_NAMES",
        enabled_by_default: true,
        wrap: normalizer_source_names,
    },
    WrapperEntry {
        name: "normalizer_source_types",
        env: "LIBINSANE_NORMALIZER_SOURCE_TYPES",
        enabled_by_default: true,
        wrap: normalizer_source_types,
    },
    WrapperEntry {
        name: "workaround_one_page_flatbed",
        env: "LIBINSANE_WORKAROUND_ONE_PAGE_FLATBED",
        enabled_by_default: true,
        wrap: workaround_one_page_flatbed,
    },
];

/// `all_opts_on_all_sources` comes after the table: it must see the
/// final topology.
const OUTER_WRAPPERS: [WrapperEntry; 1] = [WrapperEntry {
    name: "normalizer_all_opts_on_all_sources",
    env: "LIBINSANE_NORMALIZER_ALL_OPTS_ON_ALL_SOURCES",
    enabled_by_default: true,
    wrap: normalizer_all_opts_on_all_sources,
}];

fn apply_wrappers(mut backend: Box<dyn Backend>) -> ScanResult<Box<dyn Backend>> {
    let mut nb = 0;
    for entry in WRAPPERS.iter().chain(OUTER_WRAPPERS.iter()) {
        let enabled = env_flag(entry.env, entry.enabled_by_default);
        info!(wrapper = entry.name, enabled, "pipeline composition");
        if enabled {
            backend = (entry.wrap)(backend).inspect_err(|err| {
                error!(wrapper = entry.name, %err, "failed to initialize wrapper");
            })?;
            nb += 1;
        }
    }
    info!(nb, "workarounds & normalizers initialized");
    Ok(backend)
}

fn build_bases(
    extra: Vec<Box<dyn Backend>>,
) -> ScanResult<Vec<Box<dyn Backend>>> {
    let mut bases = extra;
    // The real driver backends (Sane, TWAIN, WIA) are separate
    // implementations of the backend contract; when none is supplied,
    // the dumb fake keeps the pipeline usable.
    if env_flag("LIBINSANE_DUMB", bases.is_empty()) {
        bases.push(Box::new(DumbBackend::new("dumb")));
    }
    Ok(bases)
}

/// The default recommended pipeline, built on top of the supplied base
/// backends (constructed inside the worker thread by the factory).
///
/// Environment variables override every decision; the dedicated worker
/// thread is installed last unless `LIBINSANE_WORKAROUND_DEDICATED_THREAD=0`.
pub fn safebet_with_bases(
    bases: impl FnOnce() -> ScanResult<Vec<Box<dyn Backend>>> + Send + 'static,
) -> ScanResult<Box<dyn Backend>> {
    info!("initializing base implementations");
    let build = move || -> ScanResult<Box<dyn Backend>> {
        let backend = multiplexer(build_bases(bases()?)?)?;
        apply_wrappers(backend)
    };
    if env_flag("LIBINSANE_WORKAROUND_DEDICATED_THREAD", true) {
        workaround_dedicated_thread(build)
    } else {
        build()
    }
}

/// [`safebet_with_bases`] with no externally supplied base backend.
pub fn safebet() -> ScanResult<Box<dyn Backend>> {
    safebet_with_bases(|| Ok(Vec::new()))
}

fn base_from_token(token: &str) -> ScanResult<Box<dyn Backend>> {
    match token {
        "dumb" => Ok(Box::new(DumbBackend::new("dumb"))),
        "sane" | "twain" | "wia_automation" | "wia_ll" => {
            error!(base = token, "base backend not available in this build");
            Err(ScanError::NotImplemented)
        }
        other => {
            error!(base = other, "unknown base backend");
            Err(ScanError::NotImplemented)
        }
    }
}

fn wrapper_from_token(token: &str) -> ScanResult<WrapFn> {
    let table: [(&str, WrapFn); 18] = [
        ("all_opts_on_all_sources", normalizer_all_opts_on_all_sources),
        ("min_one_source", normalizer_min_one_source),
        ("bmp2raw", normalizer_bmp2raw),
        ("raw24", normalizer_raw24),
        ("resolution", normalizer_resolution),
        ("opt_aliases", normalizer_opt_aliases),
        ("source_nodes", normalizer_source_nodes),
        ("source_types", normalizer_source_types),
        ("source_names", normalizer_source_names),
        ("safe_defaults", normalizer_safe_defaults),
        ("clean_dev_descs", normalizer_clean_dev_descs),
        ("check_capabilities", workaround_check_capabilities),
        ("opt_names", workaround_opt_names),
        ("opt_values", workaround_opt_values),
        ("cache", workaround_cache),
        ("one_page_flatbed", workaround_one_page_flatbed),
        ("lamp", workaround_lamp),
        ("set_opt_late", workaround_set_opt_late),
    ];
    match table.iter().find(|(name, _)| *name == token) {
        Some((_, wrap)) => Ok(*wrap),
        None => {
            error!(wrapper = token, "unknown wrapper");
            Err(ScanError::NotImplemented)
        }
    }
}

/// Build a pipeline from a comma-separated description:
/// `<base>,<wrapper>,<wrapper>,...`.
///
/// `dedicated_thread` is accepted as the final token only; the worker
/// must own the whole stack beneath it.
pub fn parse_pipeline(description: &str) -> ScanResult<Box<dyn Backend>> {
    let mut tokens = description.split(',').map(str::trim);
    let Some(base_token) = tokens.next().filter(|t| !t.is_empty()) else {
        error!("empty pipeline description");
        return Err(ScanError::InvalidValue);
    };
    let base_token = base_token.to_string();
    let wrapper_tokens: Vec<String> = tokens.map(str::to_string).collect();

    let dedicated_thread = wrapper_tokens.last().is_some_and(|t| t == "dedicated_thread");
    if wrapper_tokens
        .iter()
        .rev()
        .skip(1)
        .any(|t| t == "dedicated_thread")
    {
        error!("dedicated_thread must be the last wrapper of the pipeline");
        return Err(ScanError::NotImplemented);
    }

    let inner_tokens: Vec<String> = if dedicated_thread {
        wrapper_tokens[..wrapper_tokens.len() - 1].to_vec()
    } else {
        wrapper_tokens
    };

    let build = move || -> ScanResult<Box<dyn Backend>> {
        let mut backend = base_from_token(&base_token)?;
        for token in &inner_tokens {
            backend = (wrapper_from_token(token)?)(backend)?;
        }
        Ok(backend)
    };

    if dedicated_thread {
        workaround_dedicated_thread(build)
    } else {
        build()
    }
}
