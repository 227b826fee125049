//! The flat option struct driving argument-vector synthesis (spec §6).

use std::path::PathBuf;

/// Every recognized switch, flattened into one value type (spec §3
/// "Launch options"). `port == 0` means "allocate one"; `user_data_dir ==
/// None` means "create an ephemeral profile directory".
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub port: u16,
    pub bind_address: String,
    pub user_data_dir: Option<PathBuf>,
    pub window_size: Option<(u32, u32)>,
    pub window_position: Option<(i32, i32)>,
    pub start_maximized: bool,
    pub ignore_certificate_errors: bool,
    pub proxy_server: Option<String>,
    pub proxy_bypass_list: Option<String>,
    pub extensions: Vec<PathBuf>,
    /// Per-extension flags threaded into the `ProvisionRequest` built for
    /// pre-provisioning (spec.md:55, :165); meaningless when `extensions`
    /// is empty.
    pub extensions_incognito: bool,
    pub extensions_file_access: bool,
    pub additional_flags: Vec<String>,
    pub start_url: Option<String>,
    /// Whether the supervisor kills the process on its own teardown
    /// (spec §3 "disposition flag").
    pub kill_on_teardown: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            port: 0,
            bind_address: "127.0.0.1".to_string(),
            user_data_dir: None,
            window_size: None,
            window_position: None,
            start_maximized: false,
            ignore_certificate_errors: false,
            proxy_server: None,
            proxy_bypass_list: None,
            extensions: Vec::new(),
            extensions_incognito: true,
            extensions_file_access: true,
            additional_flags: Vec::new(),
            start_url: None,
            kill_on_teardown: true,
        }
    }
}

/// Fixed stability flags that disable hang monitoring, first-run
/// experiences, metrics submission, and component updates (spec §4.F).
const STABILITY_FLAGS: &[&str] = &[
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-popup-blocking",
    "--disable-default-apps",
    "--disable-sync",
    "--disable-translate",
    "--disable-background-networking",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--disable-component-update",
    "--disable-breakpad",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--password-store=basic",
    "--use-mock-keychain",
];

impl LaunchOptions {
    /// Expand to a canonical argument vector. `resolved_port` and
    /// `profile_dir` are threaded in separately since they're decided by
    /// the supervisor (port allocation, ephemeral dir creation) rather
    /// than fixed at options-construction time.
    pub fn to_args(&self, resolved_port: u16, profile_dir: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={resolved_port}"),
            format!("--remote-debugging-address={}", self.bind_address),
            format!("--user-data-dir={}", profile_dir.display()),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }
        if self.start_maximized {
            args.push("--start-maximized".to_string());
        }
        if let Some((w, h)) = self.window_size {
            args.push(format!("--window-size={w},{h}"));
        }
        if let Some((x, y)) = self.window_position {
            args.push(format!("--window-position={x},{y}"));
        }

        args.extend(STABILITY_FLAGS.iter().map(|s| s.to_string()));

        args.push("--disable-gpu".to_string());
        args.push("--disable-software-rasterizer".to_string());
        args.push("--mute-audio".to_string());

        if self.ignore_certificate_errors {
            args.push("--ignore-certificate-errors".to_string());
            args.push("--ignore-ssl-errors".to_string());
        }

        if let Some(proxy) = &self.proxy_server {
            args.push(format!("--proxy-server={proxy}"));
        }
        if let Some(bypass) = &self.proxy_bypass_list {
            args.push(format!("--proxy-bypass-list={bypass}"));
        }

        if self.extensions.is_empty() {
            args.push("--disable-extensions".to_string());
        }

        args.extend(self.additional_flags.iter().cloned());

        if let Some(url) = &self.start_url {
            if !url.is_empty() {
                args.push(url.clone());
            }
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn headless_toggle_becomes_headless_new() {
        let options = LaunchOptions::default();
        let args = options.to_args(9222, Path::new("/tmp/profile"));
        assert!(args.contains(&"--headless=new".to_string()));
    }

    #[test]
    fn disable_extensions_is_toggled_off_when_extensions_present() {
        let mut options = LaunchOptions::default();
        options.extensions.push("/opt/ext/foo".into());
        let args = options.to_args(9222, Path::new("/tmp/profile"));
        assert!(!args.contains(&"--disable-extensions".to_string()));
    }

    #[test]
    fn start_url_is_appended_last() {
        let mut options = LaunchOptions::default();
        options.start_url = Some("https://example.com".to_string());
        let args = options.to_args(9222, Path::new("/tmp/profile"));
        assert_eq!(args.last(), Some(&"https://example.com".to_string()));
    }

    #[test]
    fn additional_flags_are_passed_through_verbatim() {
        let mut options = LaunchOptions::default();
        options.additional_flags.push("--enable-automation".to_string());
        let args = options.to_args(9222, Path::new("/tmp/profile"));
        assert!(args.contains(&"--enable-automation".to_string()));
    }
}
