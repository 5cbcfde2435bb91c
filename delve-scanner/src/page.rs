use crate::error::{Result, ScanError};
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// A fetched document reduced to what the traversal engine needs.
pub trait Page: Send + Sync {
    fn title(&self) -> String;

    /// Absolute outbound links, in document order.
    fn links(&self) -> Vec<String>;
}

/// HTML page with its title and links extracted up front.
///
/// `scraper::Html` is not `Send`, so the document is parsed and dropped inside
/// [`HtmlPage::parse`] and only owned strings are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlPage {
    url: String,
    title: String,
    links: Vec<String>,
}

impl HtmlPage {
    pub fn parse(url: &str, body: &str) -> Result<Self> {
        let base = Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        let document = Html::parse_document(body);

        let title_selector = selector("title")?;
        let title = document
            .select(&title_selector)
            .next()
            .map(|element| element.text().collect::<String>())
            .unwrap_or_default();

        let link_selector = selector("a[href]")?;
        let mut links = Vec::new();
        for element in document.select(&link_selector) {
            if let Some(href) = element.value().attr("href")
                && let Some(absolute_url) = resolve_url(&base, href)
            {
                debug!("Found link: {} on {}", absolute_url, url);
                links.push(absolute_url);
            }
        }

        Ok(Self {
            url: url.to_string(),
            title,
            links,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Page for HtmlPage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn links(&self) -> Vec<String> {
        self.links.clone()
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("selector '{}': {}", css, e)))
}

/// Resolve `href` against the page URL. Returns `None` for links that cannot
/// be fetched (scripts, mail, phone, in-page anchors).
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);

    Some(resolved.to_string())
}
