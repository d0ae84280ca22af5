//! Bundled HTML analyzer
//!
//! Extracts links to follow and item records from HTML pages using CSS
//! selectors from the `[analyzer]` configuration section.

use crate::config::AnalyzerConfig;
use crate::pipeline::traits::{AnalyzeError, Analyzer, Extraction, ResponseBody};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A record scraped from one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedItem {
    /// The page the item was found on
    pub page_url: String,
    /// Item title (or page title when no item selector is configured)
    pub title: Option<String>,
    /// Absolute link carried by the item
    pub link: Option<String>,
    /// Collapsed text content of the item
    pub text: Option<String>,
}

/// Selector-driven HTML analyzer
pub struct HtmlAnalyzer {
    link_selector: Selector,
    item_selector: Option<Selector>,
    title_selector: Selector,
    anchor_selector: Selector,
    same_host_only: bool,
}

impl HtmlAnalyzer {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(HtmlAnalyzer)` - All selectors are valid
    /// * `Err(ConfigError::InvalidSelector)` - A selector failed to parse
    pub fn new(config: &AnalyzerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            link_selector: compile(&config.link_selector)?,
            item_selector: config.item_selector.as_deref().map(compile).transpose()?,
            title_selector: compile("title")?,
            anchor_selector: compile("a[href]")?,
            same_host_only: config.same_host_only,
        })
    }

    fn extract_links(&self, document: &Html, base_url: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.link_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let Some(absolute) = resolve_link(href, base_url) else {
                continue;
            };

            if self.same_host_only && absolute.host_str() != base_url.host_str() {
                continue;
            }

            let absolute = absolute.to_string();
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }

        links
    }

    fn extract_items(&self, document: &Html, base_url: &Url) -> Vec<ScrapedItem> {
        let page_url = base_url.to_string();

        let Some(item_selector) = &self.item_selector else {
            return vec![ScrapedItem {
                page_url,
                title: extract_title(document, &self.title_selector),
                link: None,
                text: None,
            }];
        };

        document
            .select(item_selector)
            .map(|item| {
                let anchor = if item.value().attr("href").is_some() {
                    Some(item)
                } else {
                    item.select(&self.anchor_selector).next()
                };

                let link = anchor
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| resolve_link(href, base_url))
                    .map(|u| u.to_string());

                let title = anchor
                    .and_then(|a| a.value().attr("title").map(str::to_string))
                    .or_else(|| anchor.map(collapsed_text))
                    .filter(|t| !t.is_empty());

                let text = Some(collapsed_text(item)).filter(|t| !t.is_empty());

                ScrapedItem {
                    page_url: page_url.clone(),
                    title,
                    link,
                    text,
                }
            })
            .collect()
    }
}

impl Analyzer for HtmlAnalyzer {
    type Record = ScrapedItem;

    fn analyze(&self, body: &ResponseBody) -> Result<Extraction<ScrapedItem>, AnalyzeError> {
        let base_url = Url::parse(&body.url).map_err(|e| AnalyzeError::Failed {
            url: body.url.clone(),
            message: format!("invalid page URL: {}", e),
        })?;

        let document = Html::parse_document(&body.body);
        let urls = self.extract_links(&document, &base_url);
        let records = self.extract_items(&document, &base_url);

        tracing::debug!(
            "Analyzed {}: {} links, {} records",
            body.url,
            urls.len(),
            records.len()
        );

        Ok(Extraction::new(urls, records))
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html, title_selector: &Selector) -> Option<String> {
    document
        .select(title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Non-HTTP(S) URLs after resolution
///
/// The fragment of the resolved URL is dropped.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }
    absolute.set_fragment(None);
    Some(absolute)
}
