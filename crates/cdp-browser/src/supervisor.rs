//! Spawns, probes the readiness of, and tears down an external Chromium
//! process (spec §4.F). Readiness polling reuses `reqwest` (a teacher
//! dependency already pulled in for `cli/src/main.rs`'s control-plane HTTP
//! calls) instead of adding a second HTTP client.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::discovery;
use crate::error::BrowserError;
use crate::launch_options::LaunchOptions;
use crate::port;
use crate::profile;

const READINESS_DEADLINE: Duration = Duration::from_secs(20);
const GRACEFUL_TERMINATE_WINDOW: Duration = Duration::from_secs(5);
const STALE_PROFILE_MIN_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: Option<String>,
}

/// Owns the spawned process handle exclusively (spec §3 "Ownership").
pub struct BrowserSupervisor {
    child: tokio::process::Child,
    http: reqwest::Client,
    debug_address: String,
    debug_port: u16,
    profile_dir: PathBuf,
    profile_is_ephemeral: bool,
    kill_on_teardown: bool,
    torn_down: bool,
    websocket_debugger_url: String,
}

impl BrowserSupervisor {
    pub async fn launch(mut options: LaunchOptions) -> Result<Self, BrowserError> {
        let executable = match options.executable.take() {
            Some(path) => path,
            None => {
                let installations = discovery::discover_installations();
                discovery::find_best(&installations).map(|i| i.path).ok_or(BrowserError::NoInstallationFound)?
            }
        };

        let port = if options.port == 0 { port::allocate_port(&options.bind_address)? } else { options.port };

        let (profile_dir, profile_is_ephemeral) = match options.user_data_dir.clone() {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                (dir, false)
            }
            None => {
                let swept = profile::sweep_stale_profiles(STALE_PROFILE_MIN_AGE);
                if swept > 0 {
                    debug!(swept, "removed stale ephemeral profile directories");
                }
                (profile::create_ephemeral_profile_dir()?, true)
            }
        };

        if !options.extensions.is_empty() {
            let request = cdp_provision::ProvisionRequest {
                extensions: options.extensions.clone(),
                incognito: options.extensions_incognito,
                file_access: options.extensions_file_access,
            };
            // The supervisor just created (or adopted) this directory itself,
            // so it is always the implicit owner (spec §4.G "Safety rail").
            let ids = cdp_provision::provision_profile(&profile_dir, &request, true)?;
            debug!(?ids, "pre-provisioned extensions");
        }

        let args = options.to_args(port, &profile_dir);
        debug!(?executable, port, profile = %profile_dir.display(), "launching browser");

        let mut command = Command::new(&executable);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(false);
        if options.headless {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = command.spawn().map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let mut supervisor = Self {
            child,
            http: reqwest::Client::new(),
            debug_address: options.bind_address,
            debug_port: port,
            profile_dir,
            profile_is_ephemeral,
            kill_on_teardown: options.kill_on_teardown,
            torn_down: false,
            websocket_debugger_url: String::new(),
        };

        supervisor.wait_until_ready(READINESS_DEADLINE).await?;
        info!(url = %supervisor.websocket_debugger_url, "browser ready");
        Ok(supervisor)
    }

    async fn wait_until_ready(&mut self, deadline: Duration) -> Result<(), BrowserError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = tokio::time::Instant::now();

        loop {
            if let Some(_status) = self.child.try_wait()? {
                return Err(BrowserError::ProcessDied);
            }
            match self.fetch_version().await {
                Ok(version) => {
                    self.websocket_debugger_url = version.web_socket_debugger_url;
                    return Ok(());
                }
                Err(_) if start.elapsed() < deadline => {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                }
                Err(_) => return Err(BrowserError::Timeout),
            }
        }
    }

    async fn fetch_version(&self) -> Result<VersionInfo, BrowserError> {
        let url = format!("http://{}:{}/json/version", self.debug_address, self.debug_port);
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Enumerate existing targets via `/json/list` (spec §6, supplemented
    /// from `original_source`'s `ChromeLauncher.hpp`).
    pub async fn list_targets(&self) -> Result<Vec<TargetDescriptor>, BrowserError> {
        let url = format!("http://{}:{}/json/list", self.debug_address, self.debug_port);
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub fn websocket_debugger_url(&self) -> &str {
        &self.websocket_debugger_url
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    pub fn debug_port(&self) -> u16 {
        self.debug_port
    }

    /// Polite-then-force teardown (spec §4.F). Idempotent: a second call
    /// is a no-op.
    pub async fn shutdown(&mut self) -> Result<(), BrowserError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if self.kill_on_teardown {
            terminate_politely(&self.child);
            let graceful = tokio::time::timeout(GRACEFUL_TERMINATE_WINDOW, self.child.wait()).await;
            if graceful.is_err() {
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }

        if self.profile_is_ephemeral {
            // Best effort: a handle still open in the just-killed process
            // can make this fail; that's fine, the sweep in the next
            // `BrowserSupervisor::launch()` call picks it up later.
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
        Ok(())
    }
}

#[cfg(unix)]
fn terminate_politely(child: &tokio::process::Child) {
    if let Some(pid) = child.id() {
        let _ = std::process::Command::new("kill").arg("-TERM").arg(pid.to_string()).status();
    }
}

#[cfg(not(unix))]
fn terminate_politely(_child: &tokio::process::Child) {
    // No portable polite-terminate primitive without an added Win32
    // dependency; teardown falls straight through to force-kill.
}

impl Drop for BrowserSupervisor {
    fn drop(&mut self) {
        if !self.torn_down && self.kill_on_teardown {
            warn!("BrowserSupervisor dropped without an explicit shutdown(); force-killing, profile cleanup skipped");
            let _ = self.child.start_kill();
        }
    }
}
