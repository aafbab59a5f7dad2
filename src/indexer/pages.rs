//! Marketing pages fetched through a text-extracting reader service.

use crate::config::Config;
use crate::indexer::chunking::{CHUNK_OVERLAP_CHARS, CHUNK_TARGET_CHARS, split_text};
use crate::knowledge::{ContentType, KnowledgeChunk};
use crate::locale::Locale;
use crate::retry::{BackoffPolicy, retry_with_backoff};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Storefront paths indexed for every locale; the empty path is the home page.
pub const MARKETING_PAGES: &[&str] = &[
    "",
    "about",
    "services",
    "installation",
    "care",
    "faq",
    "delivery",
    "samples",
    "warranty",
    "contact",
];

/// Errors raised by the page reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Reader throttled the request (HTTP 429).
    #[error("Page reader rate limited the request")]
    RateLimited,
    /// HTTP layer failed.
    #[error("Page reader request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Reader answered with an unexpected status code.
    #[error("Unexpected page reader response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the reader.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Page rendered to no text.
    #[error("Page reader returned no content")]
    Empty,
}

impl ReaderError {
    /// Whether the call should be retried after a backoff.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Rendered text of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// Page title, when the reader reported one.
    pub title: Option<String>,
    /// Main text.
    pub text: String,
}

/// Fetches the readable text of a web page.
#[async_trait]
pub trait PageReader: Send + Sync {
    /// Text of the page at `url`.
    async fn read(&self, url: &str) -> Result<PageContent, ReaderError>;
}

/// Reader proxy client: `GET {reader_url}/{page_url}` returns the page as plain text.
pub struct ReaderClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    policy: BackoffPolicy,
}

impl ReaderClient {
    /// Build the client from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, ReaderError> {
        let client = Client::builder()
            .user_agent(concat!("floorchat/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self::with_client(
            client,
            &config.reader_url,
            config.reader_api_key.clone(),
            BackoffPolicy::READER,
        ))
    }

    /// Build the client around an existing HTTP client.
    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: Option<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            policy,
        }
    }

    async fn read_once(&self, url: &str) -> Result<PageContent, ReaderError> {
        let mut request = self
            .client
            .get(format!("{}/{url}", self.base_url))
            .header("accept", "text/plain");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ReaderError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReaderError::UnexpectedStatus { status, body });
        }

        let page = parse_reader_output(&response.text().await?);
        if page.text.is_empty() {
            return Err(ReaderError::Empty);
        }
        Ok(page)
    }
}

#[async_trait]
impl PageReader for ReaderClient {
    async fn read(&self, url: &str) -> Result<PageContent, ReaderError> {
        retry_with_backoff(self.policy, "page_reader", ReaderError::is_rate_limited, || {
            self.read_once(url)
        })
        .await
    }
}

/// Split reader output into its `Title:` header and the content after `Markdown Content:`.
///
/// Output without those headers is taken as the page text.
pub fn parse_reader_output(raw: &str) -> PageContent {
    let title = raw
        .lines()
        .take_while(|line| !line.starts_with("Markdown Content:"))
        .find_map(|line| line.strip_prefix("Title:"))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty());

    let text = match raw.split_once("Markdown Content:") {
        Some((_, content)) => content,
        None => raw,
    };

    PageContent {
        title,
        text: text.trim().to_string(),
    }
}

/// Absolute URL of `path` in `locale`.
pub fn page_url(site_base_url: &str, locale: Locale, path: &str) -> String {
    let base = site_base_url.trim_end_matches('/');
    if path.is_empty() {
        format!("{base}/{locale}")
    } else {
        format!("{base}/{locale}/{path}")
    }
}

/// Source id shared by every locale of a page.
pub fn page_source_id(path: &str) -> String {
    format!("page:/{path}")
}

/// Chunk a fetched page.
pub fn page_chunks(
    page: &PageContent,
    path: &str,
    locale: Locale,
    url: &str,
) -> Vec<KnowledgeChunk> {
    let title = page
        .title
        .clone()
        .unwrap_or_else(|| if path.is_empty() { "home".to_string() } else { path.to_string() });
    let category = if path.is_empty() { "home" } else { path };

    split_text(&page.text, CHUNK_TARGET_CHARS, CHUNK_OVERLAP_CHARS)
        .into_iter()
        .enumerate()
        .map(|(index, text)| KnowledgeChunk {
            text,
            locale,
            content_type: ContentType::Page,
            category: category.to_string(),
            source_id: page_source_id(path),
            source_url: url.to_string(),
            source_title: title.clone(),
            chunk_index: index,
            sku: None,
            price: None,
            image_url: None,
            product: None,
        })
        .collect()
}
