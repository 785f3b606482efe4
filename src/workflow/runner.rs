//! Workflow runner: launches a persistent-profile browser,
//! seeds the start URL, drives the dispatcher over an assembled workflow,
//! and implements the keep-alive-after-failure behavior a long-running
//! automation needs.
//!
//! Tracing setup is left to the caller: this crate never installs a
//! global subscriber itself — construct a
//! [`LogSink`](crate::log_sink::LogSink) via [`Runner::log_sink`] and wire
//! it into a `tracing_subscriber::Registry` the way the binary/test
//! harness wants.

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::AgenticBrowser;
use crate::config::{BrowserConfig, RunnerConfig};
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::page::Page;
use crate::workflow::dispatcher::{self, ExecCtx};
use crate::workflow::step::StepData;

/// The runner retries a persistent-profile launch exactly once, against a
/// randomized-suffix directory, after a `SingletonLock`-contention
/// failure (spec §4.F: "retry once with a randomized suffix").
const SINGLETON_LOCK_RETRY_LIMIT: u32 = 2;

/// How often the runner polls for the user having closed every tab after
/// a fatal, unignored step failure, before re-raising it.
const MANUAL_CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The result of a full workflow run.
pub struct RunOutcome {
    pub success: bool,
    /// The captured execution log, in emission order.
    pub log: Vec<String>,
    /// `Some(message)` when the workflow stopped on a fatal, unignored
    /// step failure.
    pub error: Option<String>,
}

pub struct Runner {
    browser: AgenticBrowser,
    config: RunnerConfig,
    log: LogSink,
}

impl Runner {
    /// Launches a browser against `config.profile_dir`, retrying with a
    /// randomized-suffix directory if the profile is already locked by
    /// another running instance.
    pub async fn launch(config: RunnerConfig) -> Result<Self> {
        let browser = launch_with_profile(&config).await?;
        Ok(Self {
            browser,
            config,
            log: LogSink::new(),
        })
    }

    /// A clonable handle to this run's in-memory execution log. Register
    /// it as a `tracing_subscriber::Layer` before calling [`Self::run`] to
    /// capture step-level events.
    pub fn log_sink(&self) -> &LogSink {
        &self.log
    }

    /// Runs `steps` to completion, or until a fatal (unignored) step
    /// failure. On failure, the browser is deliberately left open and this
    /// call blocks, polling every 500ms, until every tab has been closed
    /// — so an operator can inspect the page the workflow
    /// died on — before returning the failed outcome.
    pub async fn run(&self, steps: &[StepData]) -> RunOutcome {
        let page = match self.open_start_page().await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to open start page");
                return RunOutcome {
                    success: false,
                    log: self.log.lines(),
                    error: Some(e.to_string()),
                };
            }
        };

        let ctx = ExecCtx {
            browser: &self.browser,
            page: &page,
        };
        let outcome = dispatcher::run_workflow(&ctx, steps).await;

        match outcome.fatal {
            None => {
                tracing::info!("workflow completed successfully");
                RunOutcome {
                    success: true,
                    log: self.log.lines(),
                    error: None,
                }
            }
            Some(e) => {
                tracing::error!(error = %e, "workflow aborted on unignored step failure");
                self.wait_for_manual_close().await;
                RunOutcome {
                    success: false,
                    log: self.log.lines(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn open_start_page(&self) -> Result<Page> {
        let url = self.config.start_url.as_deref().unwrap_or("about:blank");
        self.browser.new_page(url).await
    }

    async fn wait_for_manual_close(&self) {
        loop {
            match self.browser.pages().await {
                Ok(pages) if pages.is_empty() => return,
                Ok(_) => {}
                Err(_) => return,
            }
            tokio::time::sleep(MANUAL_CLOSE_POLL_INTERVAL).await;
        }
    }
}

async fn launch_with_profile(config: &RunnerConfig) -> Result<AgenticBrowser> {
    let mut profile_dir = config.profile_dir.clone();

    for attempt in 0..SINGLETON_LOCK_RETRY_LIMIT {
        let browser_config = BrowserConfig {
            headless: config.headless,
            stealth: config.stealth,
            viewport_width: config.viewport.0,
            viewport_height: config.viewport.1,
            chrome_path: None,
            proxy: None,
            user_data_dir: Some(profile_dir.clone()),
            locale: config.locale.clone(),
            timezone: config.timezone.clone(),
            default_timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
        };

        match AgenticBrowser::launch(browser_config).await {
            Ok(browser) => return Ok(browser),
            Err(Error::LaunchError(msg)) if msg.contains("SingletonLock") => {
                if attempt + 1 >= SINGLETON_LOCK_RETRY_LIMIT {
                    return Err(Error::LaunchError(format!(
                        "profile directory still locked after {SINGLETON_LOCK_RETRY_LIMIT} attempts: {msg}"
                    )));
                }
                profile_dir = retry_dir(&config.profile_dir);
                tracing::warn!(
                    dir = %profile_dir.display(),
                    "profile directory locked by another instance, retrying with a fresh suffix"
                );
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("loop always returns before exhausting its bound")
}

fn retry_dir(base: &PathBuf) -> PathBuf {
    let suffix: u32 = rand::random();
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("automation_profile");
    base.with_file_name(format!("{name}-{suffix:x}"))
}
