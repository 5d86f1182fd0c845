//! [`Session`] backed by a real Chrome, driven over the DevTools protocol.

use super::{NodePath, Session, SessionError};
use chromiumoxide::{Browser, BrowserConfig, Page, error::CdpError};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

impl From<CdpError> for SessionError {
    fn from(e: CdpError) -> Self {
        SessionError::Backend(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOpts {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
}

impl Default for LaunchOpts {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: (1920, 1080),
            user_agent: None,
        }
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// Start a browser with a single blank tab
    pub async fn launch(opts: &LaunchOpts) -> Result<Self, SessionError> {
        let (w, h) = opts.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(w, h)
            .arg(format!("--window-size={w},{h}"));
        if let Some(ua) = &opts.user_agent {
            builder = builder.arg(format!("--user-agent={ua}"));
        }
        if !opts.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(SessionError::Backend)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(err = %e, "Browser handler error");
                }
            }
            debug!("Browser handler done");
        });

        let page = browser.new_page("about:blank").await?;
        debug!(headless = opts.headless, width = w, height = h, "Browser launched");

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Shut the browser down and wait for it to exit
    pub async fn close(mut self) -> Result<(), SessionError> {
        self.browser.close().await?;
        if let Err(e) = self.browser.wait().await {
            warn!(err = %e, "Browser did not exit cleanly");
        }
        self.handler.abort();
        Ok(())
    }

    /// Run a script for its side effects
    async fn run(&self, script: &str) -> Result<(), SessionError> {
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, SessionError> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| SessionError::Backend(format!("unexpected script result: {e}")))
    }

    /// Evaluate `body` with `el` bound to the node, or fail with [`SessionError::NodeNotFound`]
    async fn eval_on<T: DeserializeOwned>(
        &self,
        node: &NodePath,
        body: &str,
    ) -> Result<T, SessionError> {
        let selector = serde_json::to_string(node.as_str())
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); if (!el) return null; return ({body}); }})()"
        );
        self.eval::<Option<T>>(&script)
            .await?
            .ok_or_else(|| SessionError::NodeNotFound(node.clone()))
    }
}

impl Session for ChromeSession {
    async fn navigate(&mut self, url: &Url) -> Result<(), SessionError> {
        let nav_err = |e: CdpError| SessionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        };
        self.page.goto(url.as_str()).await.map_err(nav_err)?;
        self.page.wait_for_navigation().await.map_err(nav_err)?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, SessionError> {
        Ok(self.page.content().await?)
    }

    async fn scroll_by(&mut self, dy: i64) -> Result<(), SessionError> {
        self.run(&format!("window.scrollBy(0, {dy})")).await
    }

    async fn scroll_to(&mut self, y: i64) -> Result<(), SessionError> {
        self.run(&format!("window.scrollTo(0, {y})")).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.run("window.scrollTo(0, document.body.scrollHeight)")
            .await
    }

    async fn scroll_into_view(&mut self, node: &NodePath) -> Result<(), SessionError> {
        self.eval_on::<bool>(node, "el.scrollIntoView({block: 'center'}), true")
            .await
            .map(|_| ())
    }

    async fn click(&mut self, node: &NodePath) -> Result<(), SessionError> {
        let el = self
            .page
            .find_element(node.as_str())
            .await
            .map_err(|_| SessionError::NodeNotFound(node.clone()))?;
        el.click().await.map_err(|e| {
            trace!(err = %e, node = %node, "Click failed");
            SessionError::ClickIntercepted(node.clone())
        })?;
        Ok(())
    }

    async fn force_click(&mut self, node: &NodePath) -> Result<(), SessionError> {
        let el = self
            .page
            .find_element(node.as_str())
            .await
            .map_err(|_| SessionError::NodeNotFound(node.clone()))?;
        el.call_js_fn("function() { this.click(); }", false).await?;
        Ok(())
    }

    async fn is_displayed(&mut self, node: &NodePath) -> Result<bool, SessionError> {
        self.eval_on(
            node,
            "(() => { const s = getComputedStyle(el); const r = el.getBoundingClientRect(); \
             return s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0; })()",
        )
        .await
    }

    async fn is_enabled(&mut self, node: &NodePath) -> Result<bool, SessionError> {
        self.eval_on(
            node,
            "!el.disabled && el.getAttribute('aria-disabled') !== 'true'",
        )
        .await
    }

    async fn remove_all(&mut self, selector: &str) -> Result<usize, SessionError> {
        let selector =
            serde_json::to_string(selector).map_err(|e| SessionError::Backend(e.to_string()))?;
        self.eval(&format!(
            "(() => {{ const els = document.querySelectorAll({selector}); els.forEach(el => el.remove()); return els.length; }})()"
        ))
        .await
    }
}
