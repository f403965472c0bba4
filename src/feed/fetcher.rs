use super::{parser, FeedError, NormalizedItem};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

/// Anything that can turn a source URL into normalized items.
pub trait FetchFeed {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<NormalizedItem>, FeedError>> + Send;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Every request is bounded by `timeout` so one unreachable source cannot
    /// stall a whole ingestion cycle.
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("newsbot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FetchFeed for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<NormalizedItem>, FeedError> {
        let response = self
            .client
            .get(url)
            // See: https://stackoverflow.com/a/7001617/5155484
            .header(
                "Accept",
                "application/rss+xml, application/rdf+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8",
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let parsed = parser::parse(&body)?;
        log::debug!("Parsed {} items from {url} as {:?}", parsed.items.len(), parsed.format);
        Ok(parsed.items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    pub source_url: String,
    pub item: NormalizedItem,
}

/// Outcome of fetching a list of sources.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchBatch {
    /// successful sources' items, in source order then feed order
    pub items: Vec<FetchedItem>,
    pub failed: Vec<String>,
}

/// Fetches every source in order. A failing source is logged and skipped;
/// it never aborts the others.
pub async fn fetch_all<F: FetchFeed>(fetcher: &F, urls: &[String]) -> FetchBatch {
    let mut batch = FetchBatch::default();
    for url in urls {
        match fetcher.fetch(url).await {
            Ok(items) => batch.items.extend(items.into_iter().map(|item| FetchedItem {
                source_url: url.clone(),
                item,
            })),
            Err(e) => {
                log::warn!("Error getting feed {url}: {e}");
                batch.failed.push(url.clone());
            }
        }
    }
    batch
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned results per URL and records the order of requests.
    #[derive(Default)]
    pub struct StubFetcher {
        pub feeds: HashMap<String, Vec<NormalizedItem>>,
        pub requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn with_feed(mut self, url: &str, items: Vec<NormalizedItem>) -> Self {
            self.feeds.insert(url.to_string(), items);
            self
        }
    }

    impl FetchFeed for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<NormalizedItem>, FeedError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.feeds.get(url).cloned().ok_or(FeedError::Status(404))
        }
    }

    pub fn item(link: &str, hour: u32) -> NormalizedItem {
        NormalizedItem {
            title: format!("title of {link}"),
            link: link.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failing_sources() {
        let fetcher = StubFetcher::default()
            .with_feed("https://a.example/rss", vec![item("https://a.example/2", 9), item("https://a.example/1", 8)])
            .with_feed("https://c.example/rss", vec![item("https://c.example/1", 10)]);
        let urls = vec![
            "https://a.example/rss".to_string(),
            "https://broken.example/rss".to_string(),
            "https://c.example/rss".to_string(),
        ];

        let batch = fetch_all(&fetcher, &urls).await;

        let links: Vec<&str> = batch.items.iter().map(|f| f.item.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.example/2", "https://a.example/1", "https://c.example/1"]);
        assert_eq!(batch.items[2].source_url, "https://c.example/rss");
        assert_eq!(batch.failed, vec!["https://broken.example/rss".to_string()]);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_all_with_no_sources() {
        let batch = fetch_all(&StubFetcher::default(), &[]).await;
        assert_eq!(batch, FetchBatch::default());
    }
}
