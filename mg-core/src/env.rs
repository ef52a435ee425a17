//! Environment variable parsing for the configuration loaders
//!
//! Loaders take a lookup function instead of reading the process
//! environment directly, so tests can feed variables without mutating
//! global state.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::{GridError, GridResult};

/// Lookup of the real process environment
pub fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Value of `var`, or `None` when unset or blank
pub fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|s| !s.trim().is_empty())
}

/// Parse `var`, falling back to `default` when unset or blank
///
/// A value that is set but does not parse is a configuration error, never a
/// silent fallback.
pub fn parse_or<F, T>(lookup: &F, var: &str, default: T) -> GridResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match non_empty(lookup, var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GridError::Configuration(format!("{}={:?}: {}", var, raw, e))),
        None => Ok(default),
    }
}
