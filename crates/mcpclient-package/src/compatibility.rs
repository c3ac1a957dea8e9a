//! Platform/runtime/context compatibility checks (spec §4.5 steps 1-4).

use std::process::Command;

use mcpclient_transport_traits::{TransportError, TransportResult};
use regex::Regex;
use semver::{Version, VersionReq};

use crate::manifest::Compatibility;

/// Maps `std::env::consts::OS` onto the platform identifiers DXT manifests
/// use, which follow the Node/Electron convention rather than Rust's.
fn current_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

/// Step 1: platform compatibility. An absent or empty `platforms` list means
/// "no restriction".
pub fn check_platform(compat: &Compatibility) -> TransportResult<()> {
    match &compat.platforms {
        Some(platforms) if !platforms.is_empty() => {
            let current = current_platform();
            if platforms.iter().any(|p| p == current) {
                Ok(())
            } else {
                Err(TransportError::UnsupportedPlatform(platforms.clone()))
            }
        }
        _ => Ok(()),
    }
}

/// Step 2: context compatibility. `compatibility.context` is a semver
/// requirement the embedding host application's version must satisfy (e.g.
/// a manifest declaring `">=1.2.0"` refuses to load under an older host).
/// Absent `context` or a missing `host_app_version` means "no restriction".
pub fn check_context(compat: &Compatibility, host_app_version: Option<&str>) -> TransportResult<()> {
    let Some(context) = &compat.context else {
        return Ok(());
    };
    let Some(host_app_version) = host_app_version else {
        return Ok(());
    };

    let req = VersionReq::parse(context).map_err(|e| {
        TransportError::ManifestInvalid(format!("invalid context version requirement {context:?}: {e}"))
    })?;
    let installed = extract_version_token(host_app_version).ok_or_else(|| {
        TransportError::ManifestInvalid(format!(
            "host application version {host_app_version:?} is not a valid semver"
        ))
    })?;

    if req.matches(&installed) {
        Ok(())
    } else {
        Err(TransportError::ManifestInvalid(format!(
            "host application version {installed} does not satisfy context requirement {context:?}"
        )))
    }
}

/// Extracts a semver-shaped token from free-form `<runtime> --version`
/// output (e.g. `Python 3.11.4` -> `3.11.4`, `v18.19.0` -> `18.19.0`).
fn extract_version_token(output: &str) -> Option<Version> {
    let re = Regex::new(r"\d+\.\d+\.\d+").ok()?;
    let captured = re.find(output)?;
    Version::parse(captured.as_str()).ok()
}

/// Step 3: runtime availability and version compatibility. Invokes
/// `<runtime> --version` and compares against the manifest's semver
/// requirement string.
pub fn check_runtime(runtime: &str, requirement: &str) -> TransportResult<()> {
    let output = Command::new(runtime)
        .arg("--version")
        .output()
        .map_err(|_| TransportError::RuntimeNotInstalled(runtime.to_string()))?;

    if !output.status.success() {
        return Err(TransportError::RuntimeNotInstalled(runtime.to_string()));
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let installed = extract_version_token(&combined).ok_or_else(|| {
        TransportError::RuntimeVersionMismatch {
            runtime: runtime.to_string(),
            required: requirement.to_string(),
            installed: combined.trim().to_string(),
        }
    })?;

    let req = VersionReq::parse(requirement).map_err(|e| {
        TransportError::ManifestInvalid(format!(
            "invalid runtime version requirement {requirement:?}: {e}"
        ))
    })?;

    if req.matches(&installed) {
        Ok(())
    } else {
        Err(TransportError::RuntimeVersionMismatch {
            runtime: runtime.to_string(),
            required: requirement.to_string(),
            installed: installed.to_string(),
        })
    }
}

/// Runs every declared runtime check (step 3), short-circuiting on the
/// first failure.
pub fn check_runtimes(compat: &Compatibility) -> TransportResult<()> {
    let Some(runtimes) = &compat.runtimes else {
        return Ok(());
    };
    for (runtime, requirement) in runtimes {
        check_runtime(runtime, requirement)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_semver_token_from_python_banner() {
        let v = extract_version_token("Python 3.11.4").unwrap();
        assert_eq!(v, Version::new(3, 11, 4));
    }

    #[test]
    fn extracts_semver_token_from_node_v_prefixed_banner() {
        let v = extract_version_token("v18.19.0\n").unwrap();
        assert_eq!(v, Version::new(18, 19, 0));
    }

    #[test]
    fn empty_platforms_list_means_no_restriction() {
        let compat = Compatibility {
            platforms: Some(vec![]),
            ..Default::default()
        };
        assert!(check_platform(&compat).is_ok());
    }

    #[test]
    fn absent_platforms_means_no_restriction() {
        let compat = Compatibility::default();
        assert!(check_platform(&compat).is_ok());
    }

    #[test]
    fn unlisted_platform_is_rejected() {
        let compat = Compatibility {
            platforms: Some(vec!["nonexistent-os".to_string()]),
            ..Default::default()
        };
        assert!(check_platform(&compat).is_err());
    }

    #[test]
    fn absent_context_always_accepted() {
        let compat = Compatibility::default();
        assert!(check_context(&compat, Some("2.0.0")).is_ok());
    }

    #[test]
    fn missing_host_app_version_skips_context_check() {
        let compat = Compatibility {
            context: Some(">=2.0.0".to_string()),
            ..Default::default()
        };
        assert!(check_context(&compat, None).is_ok());
    }

    #[test]
    fn satisfied_context_requirement_is_accepted() {
        let compat = Compatibility {
            context: Some(">=1.0.0".to_string()),
            ..Default::default()
        };
        assert!(check_context(&compat, Some("1.5.0")).is_ok());
    }

    #[test]
    fn unsatisfied_context_requirement_is_rejected() {
        let compat = Compatibility {
            context: Some(">=2.0.0".to_string()),
            ..Default::default()
        };
        assert!(check_context(&compat, Some("1.0.0")).is_err());
    }
}
