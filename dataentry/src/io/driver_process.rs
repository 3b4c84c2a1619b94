//! Supervision of a local WebDriver server process (`chromedriver`, `geckodriver`).

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::core::rules::Browser;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How to start the driver server for a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCommand {
    pub program: String,
    pub args: Vec<String>,
    pub port: u16,
}

impl DriverCommand {
    /// Default driver for `browser`, optionally overriding the executable path.
    pub fn for_browser(browser: Browser, program: Option<&Path>) -> Self {
        let (default_program, port, args) = match browser {
            Browser::Chrome => ("chromedriver", 9515, vec!["--port=9515".to_string()]),
            Browser::Firefox => (
                "geckodriver",
                4444,
                vec!["--port".to_string(), "4444".to_string()],
            ),
        };
        Self {
            program: program
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| default_program.to_string()),
            args,
            port,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// A running driver server. Dropping it kills the process.
pub struct DriverProcess {
    child: Child,
    base_url: String,
}

impl DriverProcess {
    /// Spawn the driver and wait until `ready(base_url)` reports true.
    ///
    /// Fails if the process cannot be spawned, exits during startup, or is not
    /// ready within `startup_timeout`.
    pub fn spawn<F>(command: &DriverCommand, startup_timeout: Duration, ready: F) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        debug!(program = %command.program, args = ?command.args, "spawning webdriver server");
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn {}", command.program))?;
        let mut process = Self {
            child,
            base_url: command.base_url(),
        };

        let deadline = Instant::now() + startup_timeout;
        loop {
            if ready(&process.base_url) {
                info!(base_url = %process.base_url, "webdriver server ready");
                return Ok(process);
            }
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "{} not ready after {:?}",
                    command.program,
                    startup_timeout
                ));
            }
            // Doubles as the poll sleep while watching for an early exit.
            if let Some(status) = process
                .child
                .wait_timeout(READY_POLL_INTERVAL)
                .context("wait for webdriver server")?
            {
                return Err(anyhow!(
                    "{} exited during startup with {}",
                    command.program,
                    status
                ));
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(err) = self.child.kill() {
            warn!(%err, "failed to kill webdriver server");
            return;
        }
        match self.child.wait_timeout(SHUTDOWN_GRACE) {
            Ok(Some(_)) => debug!("webdriver server stopped"),
            Ok(None) => warn!("webdriver server did not exit after kill"),
            Err(err) => warn!(%err, "failed to reap webdriver server"),
        }
    }
}
