//! Resolves a DXT package directory into a running stdio transport
//! (spec §4.5 step 6): validate, substitute, delegate.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mcpclient_protocol::JsonRpcMessage;
use mcpclient_stdio::{StdioTransport, StdioTransportConfig};
use mcpclient_transport_traits::{Transport, TransportError, TransportResult, TransportState};
use serde_json::Value;

use crate::compatibility::{check_context, check_platform, check_runtimes};
use crate::manifest::{Manifest, McpConfig};
use crate::substitution::{expand_token, substitute_string, SubstitutionContext};
use crate::user_config::validate_and_resolve;

/// Configuration for loading a DXT package: where it lives on disk and the
/// user-supplied config values to resolve against its `user_config`
/// declarations.
#[derive(Debug, Clone, Default)]
pub struct PackageConfig {
    pub package_dir: PathBuf,
    pub user_config: HashMap<String, Value>,
    /// Whether sensitive user-config values are allowed to flow through
    /// (true when `user_config` was sourced from a secret store).
    pub allow_sensitive: bool,
    /// The embedding host application's own version, checked against the
    /// manifest's `compatibility.context` semver requirement (spec §4.5
    /// step 3). `None` skips the check, same as an absent `context` field.
    pub host_app_version: Option<String>,
}

fn path_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

fn special_dir(home: Option<&str>, name: &str) -> Option<String> {
    home.map(|h| format!("{h}/{name}"))
}

/// Loads and validates `manifest.json` from `package_dir`, then builds a
/// [`StdioTransportConfig`] with every `${...}` placeholder resolved.
pub fn resolve(config: &PackageConfig) -> TransportResult<StdioTransportConfig> {
    let manifest_path = config.package_dir.join("manifest.json");
    let manifest_bytes = std::fs::read(&manifest_path).map_err(|_| TransportError::ManifestMissing)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| TransportError::ManifestInvalid(e.to_string()))?;

    if let Some(compat) = &manifest.compatibility {
        check_platform(compat)?;
        check_context(compat, config.host_app_version.as_deref())?;
        check_runtimes(compat)?;
    }

    let declared = manifest.user_config.clone().unwrap_or_default();
    let resolved_user_config =
        validate_and_resolve(&declared, &config.user_config, config.allow_sensitive)?;

    let mut mcp_config = manifest.server.mcp_config.clone();
    if let Some(compat) = &manifest.compatibility {
        if let Some(overrides) = &compat.platform_overrides {
            let current = std::env::consts::OS;
            let key = match current {
                "macos" => "darwin",
                "windows" => "win32",
                other => other,
            };
            if let Some(over) = overrides.get(key) {
                mcp_config = mcp_config.with_override(over);
            }
        }
    }

    build_stdio_config(&config.package_dir, &mcp_config, &resolved_user_config)
}

fn build_stdio_config(
    package_dir: &Path,
    mcp_config: &McpConfig,
    user_config: &HashMap<String, crate::manifest::UserConfigValue>,
) -> TransportResult<StdioTransportConfig> {
    let home = env::var("HOME").ok();
    let ctx = SubstitutionContext {
        dirname: package_dir,
        desktop: special_dir(home.as_deref(), "Desktop"),
        documents: special_dir(home.as_deref(), "Documents"),
        downloads: special_dir(home.as_deref(), "Downloads"),
        home,
        path_separator: path_separator(),
        user_config,
    };

    let command = substitute_string(&mcp_config.command, &ctx, ",");

    let mut args = Vec::new();
    for token in &mcp_config.args {
        args.extend(expand_token(token, &ctx));
    }

    let mut env = HashMap::with_capacity(mcp_config.env.len());
    for (key, value) in &mcp_config.env {
        env.insert(key.clone(), substitute_string(value, &ctx, path_separator()));
    }

    let working_directory = mcp_config
        .working_directory
        .as_ref()
        .map(|wd| PathBuf::from(substitute_string(wd, &ctx, ",")));

    Ok(StdioTransportConfig {
        command,
        args,
        env,
        working_directory,
    })
}

/// A transport backed by a DXT package: on `start`, resolves the manifest
/// into a stdio invocation and delegates every subsequent call to the
/// spawned [`StdioTransport`].
pub struct PackageTransport {
    config: PackageConfig,
    inner: tokio::sync::OnceCell<StdioTransport>,
}

impl PackageTransport {
    pub fn new(config: PackageConfig) -> Self {
        Self {
            config,
            inner: tokio::sync::OnceCell::new(),
        }
    }

    fn inner(&self) -> TransportResult<&StdioTransport> {
        self.inner.get().ok_or(TransportError::NotStarted)
    }
}

#[async_trait]
impl Transport for PackageTransport {
    async fn start(&self) -> TransportResult<()> {
        if self.inner.get().is_some() {
            return Ok(());
        }
        let stdio_config = resolve(&self.config)?;
        let transport = StdioTransport::new(stdio_config);
        transport.start().await?;
        // OnceCell won't overwrite if another caller raced us to start();
        // in that case the freshly-spawned transport is simply dropped
        // (and its child process killed via kill_on_drop).
        let _ = self.inner.set(transport);
        Ok(())
    }

    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        self.inner()?.send(message).await
    }

    async fn receive(&self) -> TransportResult<Option<JsonRpcMessage>> {
        self.inner()?.receive().await
    }

    async fn receive_logs(&self) -> TransportResult<Option<String>> {
        self.inner()?.receive_logs().await
    }

    async fn receive_connection_state(&self) -> TransportResult<Option<TransportState>> {
        self.inner()?.receive_connection_state().await
    }

    async fn close(&self) -> TransportResult<()> {
        match self.inner.get() {
            Some(transport) => transport.close().await,
            None => Ok(()),
        }
    }
}
