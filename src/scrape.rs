use anyhow::{Context, Result, anyhow};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::apply::locator::{Strategy, locate};
use crate::browser::Page;

const SHOW_MORE: &[Strategy] = &[
    Strategy::Css {
        selector: "button.show-more-less-html__button",
        visible_only: true,
    },
    Strategy::Css {
        selector: "button.show-more-less-html__button--more",
        visible_only: true,
    },
    Strategy::Css {
        selector: ".jobs-description__footer-button",
        visible_only: true,
    },
    Strategy::Css {
        selector: "button[aria-label*='Show more']",
        visible_only: true,
    },
    Strategy::Css {
        selector: "button[aria-label*='See more']",
        visible_only: true,
    },
];

/// Tried in order; the first with non-empty text wins.
const DESCRIPTION_SELECTORS: &[&str] = &[
    ".jobs-description__content",
    ".jobs-box__html-content",
    ".show-more-less-html__markup",
    ".description__text",
    "div.jobs-description-content__text",
    "#job-details",
    "article.jobs-description",
    "#content .job-post",
    ".posting-page .section-wrapper",
    "[class*=job-description]",
    "[data-automation-id=jobPostingDescription]",
];

fn inner_text(el: scraper::ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pulls the job description out of a posting's HTML, falling back to all
/// of the body text.
pub fn extract_description(html: &str) -> Result<String> {
    let doc = Html::parse_document(html);

    for css in DESCRIPTION_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            tracing::warn!(selector = css, "invalid description selector");
            continue;
        };
        if let Some(text) = doc
            .select(&selector)
            .map(inner_text)
            .find(|t| !t.is_empty())
        {
            tracing::debug!(selector = css, chars = text.len(), "description found");
            return Ok(text);
        }
    }

    tracing::info!("no description container; using body text");
    let body = Selector::parse("body").map_err(|e| anyhow!("invalid selector: {:?}", e))?;
    let text = doc.select(&body).map(inner_text).next().unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("No content found on page"));
    }
    Ok(text)
}

/// Opens `url`, expands a collapsed description if there is one, and
/// returns the description text.
pub async fn fetch_job_description(page: &dyn Page, url: &str, load_timeout: Duration) -> Result<String> {
    println!("Navigating to: {}", url);
    page.goto(url)
        .await
        .context("Failed to navigate to job URL")?;
    if let Err(e) = page.wait_for_load(load_timeout).await {
        tracing::warn!("page load wait failed: {e:#}");
    }

    if let Some(button) = locate(page, SHOW_MORE).await {
        println!("Expanding description ({})", button.describe());
        match page.click(&button).await {
            Ok(()) => tokio::time::sleep(Duration::from_secs(2)).await,
            Err(e) => tracing::warn!("could not expand description: {e:#}"),
        }
    }

    let html = page.source().await.context("Failed to read page source")?;
    let text = extract_description(&html)?;
    println!("Extracted {} characters", text.len());
    Ok(text)
}
