//! Named options.
//!
//! Every strategy accepts its settings either through a typed builder or as
//! `key = value` string pairs, as read from a command line or a job file.
//! Values are validated eagerly and unknown keys are refused.

use std::collections::HashMap;

use crate::error::{MeshError, Result};

/// Options that can be built from `key = value` pairs.
pub trait FromOptions: Default {
    /// Apply one option.
    fn set_option(&mut self, key: &str, value: &str) -> Result<()>;

    /// Check the combination of options once all of them are set.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Build options from pairs, applied in order.
    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self> {
        let mut options = Self::default();
        for &(key, value) in pairs {
            options.set_option(key, value)?;
        }
        options.validate()?;
        Ok(options)
    }

    /// Build options from a map. Keys are applied in sorted order so that
    /// errors are reported deterministically.
    fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        let mut options = Self::default();
        for key in keys {
            options.set_option(key, &map[key])?;
        }
        options.validate()?;
        Ok(options)
    }
}

pub(crate) fn unknown(key: &str) -> MeshError {
    MeshError::UnknownOption {
        key: key.to_string(),
    }
}

/// Parse a finite float.
pub(crate) fn parse_f64(key: &str, value: &str) -> Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        Ok(_) => Err(MeshError::invalid_option(key, value, "must be finite")),
        Err(_) => Err(MeshError::invalid_option(key, value, "not a number")),
    }
}

/// Parse a finite, strictly positive float.
pub(crate) fn parse_positive(key: &str, value: &str) -> Result<f64> {
    let x = parse_f64(key, value)?;
    if x > 0.0 {
        Ok(x)
    } else {
        Err(MeshError::invalid_option(key, value, "must be positive"))
    }
}

pub(crate) fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| MeshError::invalid_option(key, value, "not a non-negative integer"))
}

pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(MeshError::invalid_option(key, value, "not a boolean")),
    }
}

/// Parse a cosine, which must lie in `[-1, 1]`.
pub(crate) fn parse_cosine(key: &str, value: &str) -> Result<f64> {
    let x = parse_f64(key, value)?;
    if (-1.0..=1.0).contains(&x) {
        Ok(x)
    } else {
        Err(MeshError::invalid_option(key, value, "must be in [-1, 1]"))
    }
}
