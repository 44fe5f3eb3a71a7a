use crate::error::{Result, SvcError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File and directory constants
// ---------------------------------------------------------------------------

pub const DESCRIPTOR_FILE: &str = "svcctl.yaml";
pub const DEFAULT_UNIT_TEMPLATE: &str = "templates/service.unit";
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";
pub const DEFAULT_LOGGING_ROOT: &str = "/var/log";

/// Exported to every command, and read back by a nested `svcctl`.
pub const ROOT_ENV: &str = "SVCCTL_ROOT";
pub const FILE_ENV: &str = "SVCCTL_FILE";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn descriptor_path(root: &Path) -> PathBuf {
    root.join(DESCRIPTOR_FILE)
}

/// Directory a descriptor lives in; relative paths inside it resolve from here.
pub fn descriptor_root(descriptor: &Path) -> PathBuf {
    match descriptor.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn unit_path(unit_dir: &Path, unit_name: &str) -> PathBuf {
    unit_dir.join(unit_name)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

/// Service and configuration names end up in unit names, socket names and
/// log paths, so they are restricted to lowercase slugs.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(SvcError::InvalidDescriptor(format!(
            "invalid {kind} name '{name}': must be lowercase alphanumeric with '-' or '_'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
