pub mod webdriver;

#[cfg(test)]
pub mod fixture;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub use webdriver::WebDriverPage;

/// Attributes captured in every element snapshot.
pub const SNAPSHOT_ATTRS: &[&str] = &[
    "id",
    "name",
    "class",
    "type",
    "placeholder",
    "href",
    "role",
    "for",
    "value",
    "aria-label",
    "data-test",
    "data-testid",
];

/// A point-in-time view of one DOM element. `handle` is only meaningful to
/// the page that produced it.
#[derive(Debug, Clone, Default)]
pub struct ElementRef {
    pub handle: usize,
    pub tag: String,
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub attrs: BTreeMap<String, String>,
}

impl ElementRef {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// The text a user would read on the control. Inputs show their value.
    pub fn label(&self) -> &str {
        if self.tag == "input" {
            self.attr("value").unwrap_or("").trim()
        } else {
            self.text.trim()
        }
    }

    /// The control's live value (what the user typed or selected).
    pub fn current_value(&self) -> &str {
        self.value.trim()
    }

    /// Short identifier for log lines.
    pub fn describe(&self) -> String {
        let key = self
            .attr("name")
            .or_else(|| self.attr("id"))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.label().chars().take(40).collect());
        format!("<{}> {}", self.tag, key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    Info,
    Success,
    Warning,
    Error,
}

impl BannerKind {
    pub fn color(self) -> &'static str {
        match self {
            BannerKind::Info => "#0066cc",
            BannerKind::Success => "#008000",
            BannerKind::Warning => "#ff9900",
            BannerKind::Error => "#cc0000",
        }
    }
}

/// One browser tab. Calls are issued one at a time by a single run.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn source(&self) -> Result<String>;
    /// Rendered text of `<body>`.
    async fn body_text(&self) -> Result<String>;
    /// Snapshots of every element matching `css`, in document order.
    async fn query(&self, css: &str) -> Result<Vec<ElementRef>>;
    async fn click(&self, el: &ElementRef) -> Result<()>;
    /// Replaces the control's value with `text`.
    async fn fill(&self, el: &ElementRef, text: &str) -> Result<()>;
    async fn options(&self, el: &ElementRef) -> Result<Vec<SelectOption>>;
    async fn select(&self, el: &ElementRef, value: &str) -> Result<()>;
    async fn upload(&self, el: &ElementRef, path: &Path) -> Result<()>;
    async fn wait_for_load(&self, timeout: Duration) -> Result<()>;
    async fn screenshot(&self, path: &Path) -> Result<()>;
    async fn show_banner(&self, message: &str, kind: BannerKind) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub element: Duration,
    pub page_load: Duration,
    pub navigation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(5),
            page_load: Duration::from_secs(10),
            navigation: Duration::from_secs(30),
        }
    }
}

impl Timeouts {
    /// No waiting at all; one attempt per lookup.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            element: Duration::ZERO,
            page_load: Duration::ZERO,
            navigation: Duration::from_secs(1),
        }
    }
}

/// Randomised human-like pauses between actions.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    enabled: bool,
}

impl Pacing {
    pub fn human() -> Self {
        Self { enabled: true }
    }

    #[cfg(test)]
    pub fn off() -> Self {
        Self { enabled: false }
    }

    /// Sleeps for a random duration in `[min_ms, max_ms]`.
    pub async fn pause(&self, min_ms: u64, max_ms: u64) {
        if !self.enabled {
            return;
        }
        let ms = rand::thread_rng().gen_range(min_ms..=max_ms.max(min_ms));
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls `attempt` until it yields a value or `timeout` elapses. Always makes
/// at least one attempt.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut attempt: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(found) = attempt().await {
            return Some(found);
        }
        if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
