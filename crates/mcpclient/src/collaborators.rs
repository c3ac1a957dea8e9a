//! External collaborators (spec §6): interfaces the core consumes but does
//! not implement. Each is a plain `async_trait` with no default/concrete
//! implementation — callers inject their own, matching the teacher's
//! `SamplingHandler`/`AuthProvider`-style extension points in
//! `turbomcp-client` and `turbomcp-auth`.

use async_trait::async_trait;

pub use mcpclient_client::SamplingHandler;

/// Produces a fresh bearer token in response to an HTTP 401 (spec §4.4,
/// §6). The transport retries the failed request once if this succeeds.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn reauthorize(&self) -> Result<String, String>;
}

/// Resolves `sensitive` DXT user-config values to plain strings before
/// they reach package resolution (spec §4.5, §6). Kept separate from
/// `mcpclient_package::PackageConfig::user_config` so callers can back it
/// with an OS keychain, environment variables, or a prompt, without the
/// package crate depending on any of those.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<String, String>;
}

/// A source of the current time, injected so transport timeout/keep-alive
/// logic is deterministic under test (spec §6).
pub trait Clock: Send + Sync {
    fn now(&self) -> std::time::SystemTime;
}

/// The OS-provided `Clock`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> std::time::SystemTime {
        std::time::SystemTime::now()
    }
}

/// Spawns a child process for the stdio/package transports (spec §6),
/// injected so transport construction can be tested without actually
/// forking. The shipped `StdioTransport`/`PackageTransport` spawn via
/// `tokio::process::Command` directly rather than through this trait —
/// see DESIGN.md's Open Question decision on why the extension point is
/// offered at the facade layer without being threaded through the
/// existing transport crates.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
        working_directory: Option<&std::path::Path>,
    ) -> std::io::Result<tokio::process::Child>;
}

/// The OS-provided `ProcessLauncher`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessLauncher;

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn spawn(
        &self,
        command: &str,
        args: &[String],
        env: &std::collections::HashMap<String, String>,
        working_directory: Option<&std::path::Path>,
    ) -> std::io::Result<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }
        cmd.spawn()
    }
}

/// The shared outbound HTTP session (spec §5: "may be shared across
/// transports owned by the same process; treated as immutable
/// configuration and mutated only through `set_authorization_token`").
/// Modeled here so the HTTP transport can be constructed against a
/// caller-supplied client rather than always building its own.
pub trait HttpSession: Send + Sync {
    fn client(&self) -> &reqwest::Client;
}
