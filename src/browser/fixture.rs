//! In-memory `Page` over static HTML, used to exercise the apply flow
//! without a browser.
//!
//! Elements carrying `data-goto="<url>"` switch to that fixture page when
//! clicked, which is enough to model multi-page wizards.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{BannerKind, ElementRef, Page, SNAPSHOT_ATTRS, SelectOption};

#[derive(Default)]
struct State {
    pages: Vec<(String, String)>,
    current: usize,
    values: HashMap<(usize, usize), String>,
    events: Vec<String>,
    banners: Vec<String>,
    uploads: Vec<PathBuf>,
    screenshots: Vec<PathBuf>,
    close_count: usize,
}

pub struct HtmlPage {
    state: Mutex<State>,
}

impl HtmlPage {
    /// Pages are `(url, html)` pairs; the first one is current.
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            state: Mutex::new(State {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                ..Default::default()
            }),
        }
    }

    pub fn single(html: &str) -> Self {
        Self::new(&[("https://jobs.example.com/posting/1", html)])
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn banners(&self) -> Vec<String> {
        self.lock().banners.clone()
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.lock().uploads.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }

    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    pub fn current_page_url(&self) -> String {
        let state = self.lock();
        state.pages[state.current].0.clone()
    }

    /// Current value of the first element matching `css` on the current page.
    pub fn value_of(&self, css: &str) -> Option<String> {
        let state = self.lock();
        let snapshot = snapshot(&state, css).ok()?;
        snapshot.into_iter().next().map(|el| el.value)
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

fn all_elements(doc: &Html) -> Vec<scraper::ElementRef<'_>> {
    let any = Selector::parse("*").unwrap();
    doc.select(&any).collect()
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_hidden(el: &scraper::ElementRef<'_>) -> bool {
    if el.value().name() == "input" && el.value().attr("type") == Some("hidden") {
        return true;
    }
    std::iter::once(el.value())
        .chain((**el).ancestors().filter_map(|n| n.value().as_element()))
        .any(|e| {
            e.attr("hidden").is_some()
                || e.attr("style").is_some_and(|s| {
                    let s = s.replace(' ', "").to_lowercase();
                    s.contains("display:none") || s.contains("visibility:hidden")
                })
        })
}

fn option_list(el: &scraper::ElementRef<'_>) -> Vec<(SelectOption, bool)> {
    let option = Selector::parse("option").unwrap();
    el.select(&option)
        .map(|o| {
            let text = normalize(&o.text().collect::<String>());
            let value = o.value().attr("value").map(str::to_string).unwrap_or_else(|| text.clone());
            (SelectOption { text, value }, o.value().attr("selected").is_some())
        })
        .collect()
}

fn initial_value(el: &scraper::ElementRef<'_>) -> String {
    match el.value().name() {
        "input" => el.value().attr("value").unwrap_or("").to_string(),
        "textarea" => el.text().collect(),
        "select" => {
            let options = option_list(el);
            options
                .iter()
                .find(|(_, selected)| *selected)
                .or(options.first())
                .map(|(o, _)| o.value.clone())
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn to_ref(state: &State, handle: usize, el: &scraper::ElementRef<'_>) -> ElementRef {
    let attrs = SNAPSHOT_ATTRS
        .iter()
        .filter_map(|name| el.value().attr(name).map(|v| (name.to_string(), v.to_string())))
        .collect();
    let value = state
        .values
        .get(&(state.current, handle))
        .cloned()
        .unwrap_or_else(|| initial_value(el));

    ElementRef {
        handle,
        tag: el.value().name().to_string(),
        text: normalize(&el.text().collect::<String>()),
        value,
        visible: !is_hidden(el),
        attrs,
    }
}

fn snapshot(state: &State, css: &str) -> Result<Vec<ElementRef>> {
    let selector = parse_selector(css)?;
    let doc = Html::parse_document(&state.pages[state.current].1);
    let all = all_elements(&doc);
    let refs = doc
        .select(&selector)
        .filter_map(|el| {
            let handle = all.iter().position(|other| other.id() == el.id())?;
            Some(to_ref(state, handle, &el))
        })
        .collect();
    Ok(refs)
}

/// Runs `f` against the live element behind `el` on the current page.
fn with_element<T>(
    state: &State,
    el: &ElementRef,
    f: impl FnOnce(&scraper::ElementRef<'_>) -> T,
) -> Result<T> {
    let doc = Html::parse_document(&state.pages[state.current].1);
    let all = all_elements(&doc);
    let live = all
        .get(el.handle)
        .ok_or_else(|| anyhow!("stale element handle {}", el.handle))?;
    if live.value().name() != el.tag {
        return Err(anyhow!("stale element handle {}", el.handle));
    }
    Ok(f(live))
}

#[async_trait]
impl Page for HtmlPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        let index = state
            .pages
            .iter()
            .position(|(u, _)| u == url)
            .ok_or_else(|| anyhow!("net::ERR_NAME_NOT_RESOLVED at {}", url))?;
        state.current = index;
        state.events.push(format!("goto:{}", url));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_page_url())
    }

    async fn source(&self) -> Result<String> {
        let state = self.lock();
        Ok(state.pages[state.current].1.clone())
    }

    async fn body_text(&self) -> Result<String> {
        let state = self.lock();
        Ok(snapshot(&state, "body")?
            .into_iter()
            .next()
            .map(|body| body.text)
            .unwrap_or_default())
    }

    async fn query(&self, css: &str) -> Result<Vec<ElementRef>> {
        let state = self.lock();
        snapshot(&state, css)
    }

    async fn click(&self, el: &ElementRef) -> Result<()> {
        let mut state = self.lock();
        let target = with_element(&state, el, |live| {
            live.value().attr("data-goto").map(str::to_string)
        })?;
        state.events.push(format!("click:{}", el.label()));
        if let Some(url) = target {
            let index = state
                .pages
                .iter()
                .position(|(u, _)| *u == url)
                .ok_or_else(|| anyhow!("no fixture page for {}", url))?;
            state.current = index;
        }
        Ok(())
    }

    async fn fill(&self, el: &ElementRef, text: &str) -> Result<()> {
        let mut state = self.lock();
        let fillable = with_element(&state, el, |live| {
            matches!(live.value().name(), "input" | "textarea")
        })?;
        if !fillable {
            return Err(anyhow!("{} is not fillable", el.describe()));
        }
        let key = (state.current, el.handle);
        state.values.insert(key, text.to_string());
        state.events.push(format!("fill:{}={}", el.describe(), text));
        Ok(())
    }

    async fn options(&self, el: &ElementRef) -> Result<Vec<SelectOption>> {
        let state = self.lock();
        with_element(&state, el, |live| {
            option_list(live).into_iter().map(|(o, _)| o).collect()
        })
    }

    async fn select(&self, el: &ElementRef, value: &str) -> Result<()> {
        let mut state = self.lock();
        let known = with_element(&state, el, |live| {
            option_list(live).iter().any(|(o, _)| o.value == value)
        })?;
        if !known {
            return Err(anyhow!("no option '{}' in {}", value, el.describe()));
        }
        let key = (state.current, el.handle);
        state.values.insert(key, value.to_string());
        state.events.push(format!("select:{}={}", el.describe(), value));
        Ok(())
    }

    async fn upload(&self, el: &ElementRef, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(anyhow!("file not found: {}", path.display()));
        }
        let mut state = self.lock();
        let key = (state.current, el.handle);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        state.values.insert(key, name);
        state.uploads.push(path.to_path_buf());
        state.events.push(format!("upload:{}", el.describe()));
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn show_banner(&self, message: &str, _kind: BannerKind) -> Result<()> {
        self.lock().banners.push(message.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lock().close_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_snapshots_visibility_and_values() {
        let page = HtmlPage::single(
            r#"<html><body>
                <input name="email" value="a@b.co">
                <div style="display: none"><button>Hidden</button></div>
                <select name="auth"><option value="">Pick</option><option value="y" selected>Yes</option></select>
            </body></html>"#,
        );

        let inputs = page.query("input").await.unwrap();
        assert_eq!(inputs[0].current_value(), "a@b.co");
        assert!(inputs[0].visible);

        let buttons = page.query("button").await.unwrap();
        assert!(!buttons[0].visible);

        let selects = page.query("select").await.unwrap();
        assert_eq!(selects[0].current_value(), "y");
        assert_eq!(page.options(&selects[0]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_click_with_data_goto_switches_page() {
        let page = HtmlPage::new(&[
            ("https://x.example/1", r#"<a data-goto="https://x.example/2">Next</a>"#),
            ("https://x.example/2", "<p>Page two</p>"),
        ]);
        let links = page.query("a").await.unwrap();
        page.click(&links[0]).await.unwrap();
        assert_eq!(page.current_page_url(), "https://x.example/2");
        assert!(page.body_text().await.unwrap().contains("Page two"));
    }

    #[tokio::test]
    async fn test_goto_unknown_url_fails() {
        let page = HtmlPage::single("<p>hi</p>");
        assert!(page.goto("https://nowhere.example").await.is_err());
    }
}
