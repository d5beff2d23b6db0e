use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;

use super::launcher::find_chrome_binary;

/// A Chrome instance with a throwaway profile, used as a live document.
pub struct BrowserSession {
    browser: Browser,
    _handler_task: tokio::task::JoinHandle<()>,
    _profile: TempDir,
    headless: bool,
}

impl BrowserSession {
    /// Launch Chrome and establish the CDP connection.
    pub async fn launch(headless: bool) -> Result<Self> {
        let chrome = find_chrome_binary()?;
        let profile = tempfile::tempdir().context("Failed to create Chrome profile dir")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(profile.path());

        if headless {
            builder = builder.arg("--headless=new");
        }

        builder = builder
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-default-apps")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-sync")
            .window_size(1280, 720);

        let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

        let (browser, mut handler) =
            Browser::launch(config).await.context("Failed to launch Chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        tracing::info!("Browser session started (headless: {})", headless);

        Ok(Self {
            browser,
            _handler_task: handler_task,
            _profile: profile,
            headless,
        })
    }

    /// Open `url` in a new tab.
    pub async fn open(&self, url: &str) -> Result<Page> {
        tracing::info!("Opening {}", url);
        let page = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;
        Ok(page)
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Shut Chrome down and remove the profile.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await.context("Failed to close Chrome")?;
        match self.browser.wait().await {
            Ok(status) => tracing::debug!("Chrome exited: {:?}", status),
            Err(e) => tracing::warn!("Failed to reap Chrome process: {}", e),
        }
        tracing::info!("Browser session closed");
        Ok(())
    }
}
