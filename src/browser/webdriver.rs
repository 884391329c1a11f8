use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;

use super::{BannerKind, ElementRef, Page, SNAPSHOT_ATTRS, SelectOption, Timeouts, wait_for};

const SNAPSHOT_JS: &str = r#"
const names = arguments[1];
return Array.from(document.querySelectorAll(arguments[0])).map(el => {
    const attrs = {};
    for (const n of names) {
        const v = el.getAttribute(n);
        if (v !== null) attrs[n] = v;
    }
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none'
        && style.visibility !== 'hidden'
        && (rect.width > 0 || rect.height > 0);
    const value = ('value' in el && el.value != null) ? String(el.value) : '';
    return {
        tag: el.tagName.toLowerCase(),
        text: (el.innerText || el.textContent || '').trim(),
        value: value,
        visible: visible,
        attrs: attrs
    };
});
"#;

const BANNER_JS: &str = r#"
const existing = document.getElementById('autoapply-status');
if (existing) existing.remove();
const div = document.createElement('div');
div.id = 'autoapply-status';
div.textContent = arguments[0];
div.style.cssText = 'position:fixed;top:0;left:0;right:0;color:white;padding:15px 20px;'
    + 'text-align:center;font:bold 16px Arial,sans-serif;z-index:999999;'
    + 'box-shadow:0 2px 10px rgba(0,0,0,0.3);background-color:' + arguments[1] + ';';
document.body.appendChild(div);
"#;

#[derive(Debug, Deserialize)]
struct Snapshot {
    tag: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

/// Element handles handed out for the current page. Re-querying an element
/// that is already registered returns its existing slot, so polling the same
/// DOM does not grow the store. Cleared on navigation.
struct HandleStore<T> {
    slots: Vec<T>,
    by_id: HashMap<String, usize>,
}

impl<T> Default for HandleStore<T> {
    fn default() -> Self {
        Self {
            slots: vec![],
            by_id: HashMap::new(),
        }
    }
}

impl<T: Clone> HandleStore<T> {
    fn register(&mut self, id: String, element: T) -> usize {
        if let Some(&handle) = self.by_id.get(&id) {
            self.slots[handle] = element;
            return handle;
        }
        self.slots.push(element);
        let handle = self.slots.len() - 1;
        self.by_id.insert(id, handle);
        handle
    }

    fn get(&self, handle: usize) -> Option<T> {
        self.slots.get(handle).cloned()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.by_id.clear();
    }
}

/// Pairs the script's snapshots with the driver's element handles. Both come
/// from the same selector but in separate round trips, so a DOM change in
/// between shows up as a count mismatch.
fn pair_up<S, E>(css: &str, snapshots: Vec<S>, elements: Vec<E>) -> Result<Vec<(S, E)>> {
    if snapshots.len() != elements.len() {
        return Err(anyhow!(
            "page changed while querying '{}' ({} snapshots, {} elements)",
            css,
            snapshots.len(),
            elements.len()
        ));
    }
    Ok(snapshots.into_iter().zip(elements).collect())
}

/// A Chrome tab driven over WebDriver (chromedriver, selenium, ...).
pub struct WebDriverPage {
    driver: WebDriver,
    handles: Mutex<HandleStore<WebElement>>,
    navigation_timeout: Duration,
    closed: AtomicBool,
}

impl WebDriverPage {
    pub async fn connect(server_url: &str, headless: bool, timeouts: Timeouts) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--window-size=1920,1080")?;
        if headless {
            caps.set_headless()?;
        }

        let driver = WebDriver::new(server_url, caps)
            .await
            .with_context(|| format!("Failed to start a browser session at {}. Is chromedriver running?", server_url))?;

        Ok(Self {
            driver,
            handles: Mutex::new(HandleStore::default()),
            navigation_timeout: timeouts.navigation,
            closed: AtomicBool::new(false),
        })
    }

    fn element(&self, el: &ElementRef) -> Result<WebElement> {
        let handles = self
            .handles
            .lock()
            .map_err(|_| anyhow!("element handle store poisoned"))?;
        handles
            .get(el.handle)
            .ok_or_else(|| anyhow!("stale element handle {}", el.handle))
    }

    async fn ready_state(&self) -> Option<()> {
        let ret = self
            .driver
            .execute("return document.readyState;", vec![])
            .await
            .ok()?;
        (ret.json().as_str() == Some("complete")).then_some(())
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<()> {
        tokio::time::timeout(self.navigation_timeout, self.driver.goto(url))
            .await
            .map_err(|_| {
                anyhow!(
                    "Navigation to {} timed out after {}s",
                    url,
                    self.navigation_timeout.as_secs()
                )
            })?
            .with_context(|| format!("Failed to navigate to {}", url))?;

        if let Ok(mut handles) = self.handles.lock() {
            handles.clear();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.driver.current_url().await?.to_string())
    }

    async fn source(&self) -> Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn body_text(&self) -> Result<String> {
        let body = self.driver.find(By::Tag("body")).await?;
        Ok(body.text().await?)
    }

    async fn query(&self, css: &str) -> Result<Vec<ElementRef>> {
        let ret = self
            .driver
            .execute(SNAPSHOT_JS, vec![json!(css), json!(SNAPSHOT_ATTRS)])
            .await
            .with_context(|| format!("Snapshot query failed for '{}'", css))?;
        let snapshots: Vec<Snapshot> = serde_json::from_value(ret.json().clone())
            .context("Unexpected snapshot shape from page script")?;
        let elements = self.driver.find_all(By::Css(css)).await?;
        let pairs = pair_up(css, snapshots, elements)?;

        let mut handles = self
            .handles
            .lock()
            .map_err(|_| anyhow!("element handle store poisoned"))?;
        let refs = pairs
            .into_iter()
            .map(|(snap, element)| ElementRef {
                handle: handles.register(element.element_id().to_string(), element),
                tag: snap.tag,
                text: snap.text,
                value: snap.value,
                visible: snap.visible,
                attrs: snap.attrs,
            })
            .collect();
        tracing::trace!(css, registered = handles.len(), "queried elements");
        Ok(refs)
    }

    async fn click(&self, el: &ElementRef) -> Result<()> {
        let element = self.element(el)?;
        element.scroll_into_view().await.ok();
        element
            .click()
            .await
            .with_context(|| format!("Failed to click {}", el.describe()))?;
        Ok(())
    }

    async fn fill(&self, el: &ElementRef, text: &str) -> Result<()> {
        let element = self.element(el)?;
        element.scroll_into_view().await.ok();
        element.clear().await?;
        element
            .send_keys(text)
            .await
            .with_context(|| format!("Failed to type into {}", el.describe()))?;
        Ok(())
    }

    async fn options(&self, el: &ElementRef) -> Result<Vec<SelectOption>> {
        let element = self.element(el)?;
        let mut options = vec![];
        for option in element.find_all(By::Tag("option")).await? {
            options.push(SelectOption {
                text: option.text().await?.trim().to_string(),
                value: option.value().await?.unwrap_or_default(),
            });
        }
        Ok(options)
    }

    async fn select(&self, el: &ElementRef, value: &str) -> Result<()> {
        let element = self.element(el)?;
        let select = SelectElement::new(&element).await?;
        select
            .select_by_value(value)
            .await
            .with_context(|| format!("Failed to select '{}' in {}", value, el.describe()))?;
        Ok(())
    }

    async fn upload(&self, el: &ElementRef, path: &Path) -> Result<()> {
        let absolute = std::fs::canonicalize(path)
            .with_context(|| format!("Resume file not found: {}", path.display()))?;
        let element = self.element(el)?;
        element
            .send_keys(absolute.to_string_lossy().to_string())
            .await
            .with_context(|| format!("Failed to attach file to {}", el.describe()))?;
        Ok(())
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        if wait_for(timeout, || self.ready_state()).await.is_none() {
            tracing::warn!("page did not finish loading within {}s", timeout.as_secs());
        }
        if let Ok(mut handles) = self.handles.lock() {
            handles.clear();
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.driver
            .screenshot(path)
            .await
            .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
        Ok(())
    }

    async fn show_banner(&self, message: &str, kind: BannerKind) -> Result<()> {
        self.driver
            .execute(BANNER_JS, vec![json!(message), json!(kind.color())])
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.driver
            .clone()
            .quit()
            .await
            .context("Failed to close the browser session")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_store_reuses_slots_for_known_elements() {
        let mut store = HandleStore::default();
        let a = store.register("el-a".to_string(), "a1");
        let b = store.register("el-b".to_string(), "b1");
        for _ in 0..20 {
            assert_eq!(store.register("el-a".to_string(), "a2"), a);
            assert_eq!(store.register("el-b".to_string(), "b2"), b);
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a), Some("a2"));
        assert_eq!(store.get(b), Some("b2"));

        store.clear();
        assert_eq!(store.get(a), None);
        assert_eq!(store.register("el-c".to_string(), "c"), 0);
    }

    #[test]
    fn test_pair_up_rejects_count_mismatch() {
        let pairs = pair_up("button", vec!["s1", "s2"], vec![1, 2]).unwrap();
        assert_eq!(pairs, vec![("s1", 1), ("s2", 2)]);

        let err = pair_up("button", vec!["s1", "s2"], vec![1]).unwrap_err();
        assert!(err.to_string().contains("page changed while querying 'button'"));
    }
}
