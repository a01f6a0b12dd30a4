//! Headless rendering of the kiosk page.
//!
//! The leaderboards are built client-side, so a plain HTTP fetch returns an
//! empty shell. [`ChromeRenderer`] drives a headless Chromium process that is
//! started fresh for every call and torn down on every exit path.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::RenderError;
use crate::util::env as env_util;

/// Render a URL to its final, script-populated HTML.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    pub binary: String,
    /// Hard ceiling for navigation + settling.
    pub timeout: Duration,
    /// Virtual-time budget Chromium spends letting network activity go idle.
    pub settle: Duration,
}

impl Default for ChromeRenderer {
    fn default() -> Self {
        Self {
            binary: "chromium".to_string(),
            timeout: Duration::from_secs(60),
            settle: Duration::from_millis(5_000),
        }
    }
}

impl ChromeRenderer {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: env_util::env_opt("CHROME_BIN").unwrap_or(defaults.binary),
            timeout: Duration::from_secs(env_util::env_parse("RENDER_TIMEOUT_SECS", 60u64)),
            settle: Duration::from_millis(env_util::env_parse("RENDER_SETTLE_MS", 5_000u64)),
        }
    }

    fn command(&self, url: &str, profile_dir: &std::path::Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!("--virtual-time-budget={}", self.settle.as_millis()))
            .arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    #[instrument(skip(self), fields(binary = %self.binary))]
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        // Isolated profile per call; removed when `profile` drops.
        let profile = tempfile::Builder::new()
            .prefix("pinball-render-")
            .tempdir()
            .map_err(RenderError::Launch)?;

        let child = self
            .command(url, profile.path())
            .spawn()
            .map_err(RenderError::Launch)?;
        debug!(pid = ?child.id(), "browser launched");

        // On timeout the output future (and with it the child) is dropped,
        // which kills the process.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(res) => res.map_err(RenderError::Launch)?,
            Err(_) => {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(RenderError::Exited {
                url: url.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let html = String::from_utf8(output.stdout)?;
        info!(bytes = html.len(), "page rendered");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_isolated_dump_command() {
        let renderer = ChromeRenderer {
            binary: "chromium-test".into(),
            timeout: Duration::from_secs(5),
            settle: Duration::from_millis(2500),
        };
        let dir = std::path::Path::new("/tmp/profile-x");
        let cmd = renderer.command("https://example.test/kiosk/abc", dir);
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "chromium-test");
        let args: Vec<String> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--dump-dom".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile-x".to_string()));
        assert!(args.contains(&"--virtual-time-budget=2500".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.test/kiosk/abc"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let renderer = ChromeRenderer {
            binary: "/nonexistent/definitely-not-chromium".into(),
            ..ChromeRenderer::default()
        };
        let err = renderer.render("https://example.test/").await.unwrap_err();
        assert!(matches!(err, RenderError::Launch(_)));
    }

    /// Stand-in browser: a shell script that ignores its arguments.
    #[cfg(unix)]
    fn fake_browser(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-chromium.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Retries spawn on ETXTBSY, which shows up when another test thread forked
    /// while the script was still open for writing.
    #[cfg(unix)]
    async fn render_script(renderer: &ChromeRenderer, url: &str) -> Result<String, RenderError> {
        for _ in 0..5 {
            match renderer.render(url).await {
                Err(RenderError::Launch(e)) if e.raw_os_error() == Some(26) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                other => return other,
            }
        }
        renderer.render(url).await
    }

    /// Gone or a zombie waiting to be reaped.
    #[cfg(unix)]
    fn process_is_dead(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                == Some("Z"),
            Err(_) => true,
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_browser() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("browser.pid");
        let renderer = ChromeRenderer {
            binary: fake_browser(
                dir.path(),
                &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
            ),
            timeout: Duration::from_millis(500),
            settle: Duration::from_millis(100),
        };

        let err = render_script(&renderer, "https://example.test/slow").await.unwrap_err();
        match &err {
            RenderError::Timeout { url, timeout } => {
                assert_eq!(url, "https://example.test/slow");
                assert_eq!(*timeout, Duration::from_millis(500));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let mut dead = false;
        for _ in 0..40 {
            if process_is_dead(&pid) {
                dead = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(dead, "browser process {pid} still running after timeout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChromeRenderer {
            binary: fake_browser(dir.path(), "echo boom >&2\nexit 3"),
            timeout: Duration::from_secs(10),
            settle: Duration::from_millis(100),
        };

        let err = render_script(&renderer, "https://example.test/broken").await.unwrap_err();
        match err {
            RenderError::Exited { url, status, stderr } => {
                assert_eq!(url, "https://example.test/broken");
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_returns_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ChromeRenderer {
            binary: fake_browser(dir.path(), "echo '<html><body>ok</body></html>'"),
            timeout: Duration::from_secs(10),
            settle: Duration::from_millis(100),
        };

        let html = render_script(&renderer, "https://example.test/").await.unwrap();
        assert_eq!(html.trim(), "<html><body>ok</body></html>");
    }
}
