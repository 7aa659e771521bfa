//! Environment variable helper for pipeline composition switches.

/// Read a `0`/`1` style environment flag. Anything that parses as a
/// non-zero integer counts as enabled; unset or unparseable values fall
/// back to `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(n) => n != 0,
            Err(_) => default,
        },
        Err(_) => default,
    }
}
