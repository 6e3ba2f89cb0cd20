//! Shape predicates over templated sink URIs.
//!
//! Duplicated, deliberately, from `harmonia_core::uri`: `Node` (in
//! `harmonia-core`) holds a [`crate::LogProviderFactory`], so `harmonia-core`
//! depends on this crate. A dependency the other way round would make a
//! cycle, and these five one-line predicates are cheaper to keep in sync by
//! hand than to hoist into a sixth workspace member. See `DESIGN.md`.

use crate::error::{Result, TelemetryError};

pub fn has_scheme(uri: &str) -> Result<()> {
    if uri.contains("://") {
        Ok(())
    } else {
        Err(TelemetryError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a protocol (\"://\")",
        })
    }
}

pub fn has_name(uri: &str) -> Result<()> {
    if uri.contains("{name}") {
        Ok(())
    } else {
        Err(TelemetryError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a name indicator ({name})",
        })
    }
}

pub fn has_version(uri: &str) -> Result<()> {
    if uri.contains("{version}") {
        Ok(())
    } else {
        Err(TelemetryError::InvalidUri {
            uri: uri.to_string(),
            reason: "URI must contain a version indicator ({version})",
        })
    }
}

/// No-op for non-`file://` URIs. For `file://` URIs, creates the parent
/// directory of the path portion, idempotently. A single-segment path (no
/// parent directory) is a no-op.
pub fn makedirs(uri: &str) -> Result<()> {
    let Some(path) = uri.strip_prefix("file://") else {
        return Ok(());
    };
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
