//! Headless Chromium driven over CDP with `chromiumoxide`.
//!
//! - [`BrowserSession`]: one browser process per run, launched under the
//!   `launch` retry policy and closed explicitly at the end of the run
//! - [`PageGuard`]: a tab that is closed on every exit path
//! - [`BrowserRenderer`]: the render path of retrieval (navigate, pick up the
//!   creator, print to PDF)
//!
//! `PageGuard` also implements [`FeedSession`] so the pagination driver can
//! run against a live feed page.

use crate::config::{BrowserSettings, Config, FeedConfig, PdfLayout};
use crate::error::{BrowserError, PipelineError, RetrievalError};
use crate::retrieve::Renderer;
use crate::retry::RetryPolicy;
use crate::scrapers::paginate::FeedSession;
use crate::utils::pause;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use scraper::{Html, Selector};
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A running browser plus the task pumping its CDP connection.
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    /// Launch the browser, retrying per `policy`.
    ///
    /// Exhausting the policy is a fatal initialisation failure.
    #[instrument(level = "info", skip_all, fields(headless = settings.headless))]
    pub async fn launch(settings: &BrowserSettings, policy: RetryPolicy) -> Result<Self, PipelineError> {
        let session = policy
            .run("launch_browser", move || Self::launch_once(settings))
            .await
            .map_err(|e| PipelineError::Init(format!("browser: {e}")))?;
        info!("Browser initialized");
        Ok(session)
    }

    async fn launch_once(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder();
        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "CDP handler event error");
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
        })
    }

    /// Open a blank tab guarded for cleanup; `label` is used in logs.
    pub async fn new_page(&self, label: &str) -> Result<PageGuard, BrowserError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Launch("browser already closed".to_string()))?;
        let page = browser.new_page("about:blank").await?;
        Ok(PageGuard::new(page, label.to_string()))
    }

    /// Close the browser and stop the handler task.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Failed to close browser");
            }
            if let Err(e) = browser.wait().await {
                debug!(error = %e, "Browser process did not exit cleanly");
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        info!("Browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.is_some() {
            // chromiumoxide kills the child process when `Browser` drops
            warn!("Browser session dropped without close");
        }
    }
}

/// A browser tab that is always closed.
///
/// Prefer [`PageGuard::close`]; if the guard is dropped instead, closing is
/// spawned onto the runtime captured at construction.
pub struct PageGuard {
    page: Option<Page>,
    label: String,
    runtime_handle: tokio::runtime::Handle,
}

impl PageGuard {
    pub fn new(page: Page, label: String) -> Self {
        Self {
            page: Some(page),
            label,
            runtime_handle: tokio::runtime::Handle::current(),
        }
    }

    pub async fn close(mut self) -> Result<(), BrowserError> {
        if let Some(page) = self.page.take() {
            page.close().await?;
            trace!(label = %self.label, "Page closed");
        }
        Ok(())
    }

    /// Navigate to `url`, failing after `timeout`.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.goto(url)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Block requests whose URL matches any of `patterns`.
    pub async fn block_resources(&self, patterns: &[String]) -> Result<(), BrowserError> {
        if patterns.is_empty() {
            return Ok(());
        }
        self.execute(EnableParams::default()).await?;
        self.execute(SetBlockedUrLsParams::new(patterns.to_vec())).await?;
        debug!(count = patterns.len(), "Blocking heavy resources");
        Ok(())
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref().expect("PageGuard: page already closed")
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let label = std::mem::take(&mut self.label);
            self.runtime_handle.spawn(async move {
                if let Err(e) = page.close().await {
                    warn!(%label, error = %e, "Page cleanup on drop failed");
                }
            });
        }
    }
}

impl FeedSession for PageGuard {
    async fn wait_for_container(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let poll = async {
            loop {
                if self.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout {
                what: selector.to_string(),
                secs: timeout.as_secs(),
            })
    }

    async fn content_extent(&self) -> Result<i64, BrowserError> {
        let height = self
            .evaluate("document.body.scrollHeight")
            .await?
            .into_value::<i64>()?;
        Ok(height)
    }

    async fn load_more(&self) -> Result<(), BrowserError> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<String, BrowserError> {
        Ok(self.content().await?)
    }
}

/// Open the feed in a new tab with heavy resources blocked.
#[instrument(level = "info", skip_all, fields(url = %feed.url))]
pub async fn open_feed(
    session: &BrowserSession,
    feed: &FeedConfig,
    navigation: RetryPolicy,
) -> Result<PageGuard, BrowserError> {
    let page = session.new_page(&feed.url).await?;
    if let Err(e) = page.block_resources(&feed.blocked_resources).await {
        warn!(error = %e, "Could not block resources; continuing");
    }

    let timeout = Duration::from_secs(feed.navigation_timeout_secs);
    let url = feed.url.as_str();
    let page_ref = &page;
    navigation
        .run("navigate_feed", move || page_ref.navigate(url, timeout))
        .await?;
    info!("Feed page loaded");
    Ok(page)
}

/// Text of the first element matching `selector`, or empty.
pub fn extract_creator(html: &str, selector: &Selector) -> String {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .next()
        .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn pdf_params(layout: &PdfLayout) -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(layout.print_background),
        paper_width: Some(layout.paper_width),
        paper_height: Some(layout.paper_height),
        margin_top: Some(layout.margin_top),
        margin_bottom: Some(layout.margin_bottom),
        margin_left: Some(layout.margin_left),
        margin_right: Some(layout.margin_right),
        ..Default::default()
    }
}

/// Render-path settings, compiled ahead of the browser launch.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub navigation_timeout: Duration,
    pub settle: Duration,
    pub creator_selector: Selector,
    pub pdf: PdfLayout,
    pub navigation: RetryPolicy,
    pub pdf_render: RetryPolicy,
}

impl RenderSettings {
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let selector = &config.retrieval.creator_selector;
        let creator_selector = Selector::parse(selector)
            .map_err(|e| PipelineError::Config(format!("invalid selector {selector:?}: {e:?}")))?;
        Ok(Self {
            navigation_timeout: Duration::from_secs(config.feed.navigation_timeout_secs),
            settle: Duration::from_millis(config.retrieval.render_settle_ms),
            creator_selector,
            pdf: config.retrieval.pdf,
            navigation: config.retry.navigation,
            pdf_render: config.retry.pdf_render,
        })
    }
}

/// Renders live pages to PDF through a shared [`BrowserSession`].
pub struct BrowserRenderer<'a> {
    session: &'a BrowserSession,
    settings: RenderSettings,
}

impl<'a> BrowserRenderer<'a> {
    pub fn new(session: &'a BrowserSession, settings: RenderSettings) -> Self {
        Self { session, settings }
    }

    async fn render_on(&self, page: &PageGuard, url: &str, target: &Path) -> Result<String, RetrievalError> {
        let settings = &self.settings;
        let timeout = settings.navigation_timeout;

        let creator = settings
            .navigation
            .run("navigate_and_extract_creator", move || async move {
                page.navigate(url, timeout).await?;
                pause(settings.settle).await;
                let html = page.content().await?;
                Ok::<String, BrowserError>(extract_creator(&html, &settings.creator_selector))
            })
            .await?;
        if creator.is_empty() {
            debug!("No creator information found");
        } else {
            info!(%creator, "Found creator");
        }

        settings
            .pdf_render
            .run("render_pdf", move || async move {
                page.save_pdf(pdf_params(&settings.pdf), target).await?;
                Ok::<(), BrowserError>(())
            })
            .await?;

        Ok(creator)
    }
}

impl Renderer for BrowserRenderer<'_> {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn render(&self, url: &str, target: &Path) -> Result<String, RetrievalError> {
        let page = self.session.new_page(url).await?;
        let result = self.render_on(&page, url, target).await;
        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close page");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> Selector {
        Selector::parse("div.author-details div.name").unwrap()
    }

    #[test]
    fn test_extract_creator_found() {
        let html = r#"<html><body>
            <div class="author-details"><img src="x.png"><div class="name">
                Christine   Lagarde
            </div></div></body></html>"#;
        assert_eq!(extract_creator(html, &selector()), "Christine Lagarde");
    }

    #[test]
    fn test_extract_creator_absent_is_empty() {
        let html = r#"<div class="name">Not an author block</div>"#;
        assert_eq!(extract_creator(html, &selector()), "");
    }

    #[test]
    fn test_pdf_params_follow_layout() {
        let params = pdf_params(&PdfLayout::default());
        assert_eq!(params.paper_width, Some(8.27));
        assert_eq!(params.paper_height, Some(11.69));
        assert_eq!(params.margin_top, Some(1.0));
        assert_eq!(params.margin_left, Some(0.5));
        assert_eq!(params.print_background, Some(true));
    }

    #[test]
    fn test_render_settings_reject_bad_selector() {
        let mut config = Config::default();
        config.retrieval.creator_selector = "div[".to_string();
        assert!(matches!(RenderSettings::from_config(&config), Err(PipelineError::Config(_))));
    }
}
