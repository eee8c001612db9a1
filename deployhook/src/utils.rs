//! Utility functions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Registry assumed for images without an explicit host
pub const DEFAULT_REGISTRY_HOST: &str = "docker.io";

/// Version information for deployhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Registry host of an image reference.
///
/// Follows docker's rule: the first path component is a host only when it
/// contains a `.` or `:`, or is `localhost`.
pub fn registry_host(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first
        }
        _ => DEFAULT_REGISTRY_HOST,
    }
}

/// Replace the `{branch}` placeholder in an image reference
pub fn expand_image(image: &str, branch: &str) -> String {
    if branch.is_empty() {
        return image.to_string();
    }
    image.replace("{branch}", branch)
}

/// Parse plain `KEY=VALUE` env content.
///
/// Blank lines, `#` comments and lines without `=` are skipped. Matching
/// surrounding quotes are stripped from values. Later keys win.
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let mut value = value.trim();
        if value.len() >= 2 {
            let first = value.as_bytes()[0];
            if (first == b'"' || first == b'\'') && value.as_bytes()[value.len() - 1] == first {
                value = &value[1..value.len() - 1];
            }
        }
        if !key.is_empty() {
            result.insert(key.to_string(), value.to_string());
        }
    }
    result
}

/// Split `extra_flags` lines into `docker run` arguments using POSIX shell
/// quoting rules.
///
/// On error returns the first line that does not split (an unclosed quote or
/// a trailing backslash).
pub fn split_flag_lines(lines: &[String]) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    for line in lines {
        let parts = shlex::split(line).ok_or_else(|| line.clone())?;
        args.extend(parts);
    }
    Ok(args)
}
