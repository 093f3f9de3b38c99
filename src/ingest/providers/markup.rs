// src/ingest/providers/markup.rs
use async_trait::async_trait;
use metrics::counter;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ingest::fetch::{build_client, fetch_text, FetchOptions, Transport};
use crate::ingest::types::{Article, SourceAdapter, SourceDescriptor, SourceError};
use crate::ingest::{clean_text, parse_published, MAX_ITEMS_PER_SOURCE};

/// CSS selection rules locating repeated article blocks on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupSelectors {
    pub item: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub date: String,
    pub image: String,
}

impl Default for MarkupSelectors {
    fn default() -> Self {
        Self {
            item: "article".into(),
            title: "h2 a".into(),
            link: "a".into(),
            content: "p".into(),
            date: "time".into(),
            image: "img".into(),
        }
    }
}

struct Compiled {
    item: Selector,
    title: Selector,
    link: Selector,
    content: Selector,
    date: Selector,
    image: Selector,
}

impl Compiled {
    fn new(s: &MarkupSelectors) -> Result<Self, SourceError> {
        fn one(css: &str) -> Result<Selector, SourceError> {
            Selector::parse(css).map_err(|_| SourceError::Selector(css.to_string()))
        }
        Ok(Self {
            item: one(&s.item)?,
            title: one(&s.title)?,
            link: one(&s.link)?,
            content: one(&s.content)?,
            date: one(&s.date)?,
            image: one(&s.image)?,
        })
    }
}

/// Markup-based source adapter: one listing page, configurable selectors.
pub struct MarkupAdapter {
    descriptor: SourceDescriptor,
    selectors: MarkupSelectors,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http(FetchOptions),
}

impl MarkupAdapter {
    pub fn from_url(
        descriptor: SourceDescriptor,
        selectors: MarkupSelectors,
        opts: FetchOptions,
    ) -> Self {
        Self {
            descriptor,
            selectors,
            mode: Mode::Http(opts),
        }
    }

    pub fn from_fixture(descriptor: SourceDescriptor, selectors: MarkupSelectors, html: &str) -> Self {
        Self {
            descriptor,
            selectors,
            mode: Mode::Fixture(html.to_string()),
        }
    }

    /// Extract articles from a listing page. Relative links resolve against the source URL.
    pub fn parse_page(&self, html: &str) -> Result<Vec<Article>, SourceError> {
        let sel = Compiled::new(&self.selectors)?;
        let base = Url::parse(&self.descriptor.url).ok();
        let doc = Html::parse_document(html);

        let mut out = Vec::new();
        for item in doc.select(&sel.item).take(MAX_ITEMS_PER_SOURCE) {
            match self.extract(item, &sel, base.as_ref()) {
                Some(a) => out.push(a),
                None => counter!("ainews_invalid_entries_total").increment(1),
            }
        }
        counter!("ainews_articles_scraped_total").increment(out.len() as u64);
        Ok(out)
    }

    fn extract(&self, item: ElementRef<'_>, sel: &Compiled, base: Option<&Url>) -> Option<Article> {
        let title_el = item.select(&sel.title).next()?;
        let link_el = item.select(&sel.link).next()?;

        let title = clean_text(&title_el.text().collect::<String>());
        let href = link_el.value().attr("href").unwrap_or_default().trim();
        let url = resolve(base, href).unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            tracing::debug!(source = %self.descriptor.name, "skipping block without title or link");
            return None;
        }

        let content = item
            .select(&sel.content)
            .next()
            .map(|el| clean_text(&el.text().collect::<String>()))
            .unwrap_or_default();

        let published_at = item.select(&sel.date).next().and_then(|el| {
            el.value()
                .attr("datetime")
                .and_then(parse_published)
                .or_else(|| parse_published(&el.text().collect::<String>()))
        });

        let image_url = item
            .select(&sel.image)
            .next()
            .and_then(|el| el.value().attr("src"))
            .and_then(|src| resolve(base, src.trim()));

        Some(Article {
            title,
            content,
            url,
            author: None,
            image_url,
            published_at,
            source: self.descriptor.name.clone(),
        })
    }
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base.and_then(|b| b.join(href).ok()).map(|u| u.to_string())
}

#[async_trait]
impl SourceAdapter for MarkupAdapter {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError> {
        tracing::info!(source = %self.descriptor.name, url = %self.descriptor.url, "scraping page");
        let html = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http(opts) => {
                let client = build_client(opts, Transport::Verified)?;
                fetch_text(&client, &self.descriptor.url).await?
            }
        };
        self.parse_page(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SourceKind;

    fn adapter(selectors: MarkupSelectors) -> MarkupAdapter {
        let d = SourceDescriptor {
            name: "Blog".into(),
            url: "https://blog.test/news/".into(),
            kind: SourceKind::Web,
            weight: 0.2,
        };
        MarkupAdapter::from_fixture(d, selectors, "")
    }

    #[test]
    fn resolves_relative_links_and_skips_incomplete_blocks() {
        let html = r#"<html><body>
<article><h2><a href="/posts/1">First post</a></h2><p>Intro text</p>
  <time datetime="2024-05-01T10:00:00Z">May 1</time><img src="/i/1.png"></article>
<article><h2>No link here</h2></article>
<article><h2><a href="https://other.test/x">Second</a></h2></article>
</body></html>"#;
        let a = adapter(MarkupSelectors::default());
        let out = a.parse_page(html).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://blog.test/posts/1");
        assert_eq!(out[0].content, "Intro text");
        assert_eq!(out[0].image_url.as_deref(), Some("https://blog.test/i/1.png"));
        assert!(out[0].published_at.is_some());
        assert_eq!(out[1].url, "https://other.test/x");
        assert!(out[1].published_at.is_none());
    }

    #[test]
    fn bad_selector_is_an_error() {
        let a = adapter(MarkupSelectors {
            item: "[[[".into(),
            ..Default::default()
        });
        assert!(matches!(a.parse_page("<p/>"), Err(SourceError::Selector(_))));
    }
}
