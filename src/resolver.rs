use std::{
    borrow::Cow,
    sync::{Arc, LazyLock},
    time::Duration,
};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    cache::TtlCache,
    source::{Item, ItemKind},
    ytdlp::StreamExtractor,
};

static STREAM_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());

/// A playable URL together with the item it was produced for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream<'a> {
    pub item: &'a Item,
    pub url: Cow<'a, str>,
}

/// Why an item was left out of the playlist
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Unresolvable {
    #[error("item has no url")]
    MissingUrl,
    #[error("YouTube resolution is disabled")]
    Disabled,
    #[error("yt-dlp failed: {0}")]
    ExtractorFailed(String),
    #[error("yt-dlp did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("yt-dlp returned an invalid stream URL: {0:?}")]
    InvalidUrl(String),
}

/// Per-item outcome. Never aborts the surrounding playlist.
#[derive(Debug)]
pub enum Resolution<'a> {
    Resolved(ResolvedStream<'a>),
    Unresolvable(Unresolvable),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Skip YouTube items without calling the extractor
    pub youtube_disabled: bool,
    /// Format expression handed to the extractor
    pub format: String,
    /// How long a resolved URL is reused
    pub cache_ttl: Duration,
    /// Upper bound for a single extractor call
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            youtube_disabled: false,
            format: crate::ytdlp::DEFAULT_FORMAT.to_string(),
            cache_ttl: Duration::from_secs(60 * 60),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct StreamResolver {
    extractor: Arc<dyn StreamExtractor>,
    cache: TtlCache<String>,
    config: ResolverConfig,
}

impl StreamResolver {
    #[must_use]
    pub fn new(extractor: Arc<dyn StreamExtractor>, config: ResolverConfig) -> Self {
        Self {
            extractor,
            cache: TtlCache::new("stream-resolution", config.cache_ttl),
            config,
        }
    }

    /// Resolves an item into a playable URL
    ///
    /// Direct items are passed through untouched. YouTube items go through the
    /// resolution cache and, on a miss, the extractor.
    pub async fn resolve<'a>(&self, item: &'a Item) -> Resolution<'a> {
        let Some(url) = item.url.as_deref() else {
            return Resolution::Unresolvable(Unresolvable::MissingUrl);
        };

        let resolved = match item.kind {
            ItemKind::Direct => Ok(Cow::Borrowed(url)),
            ItemKind::Youtube => self.resolve_youtube(url).await.map(Cow::Owned),
        };

        match resolved {
            Ok(url) => Resolution::Resolved(ResolvedStream { item, url }),
            Err(reason) => Resolution::Unresolvable(reason),
        }
    }

    #[instrument(skip(self))]
    async fn resolve_youtube(&self, source_url: &str) -> Result<String, Unresolvable> {
        if self.config.youtube_disabled {
            return Err(Unresolvable::Disabled);
        }

        let key = format!("yt:{source_url}");
        if let Some(url) = self.cache.get(&key) {
            debug!("Using cached stream URL");
            return Ok(url);
        }

        let extraction = tokio::time::timeout(
            self.config.timeout,
            self.extractor.extract(source_url, &self.config.format),
        )
        .await;

        let output = match extraction {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("yt-dlp error: {e:#}");
                return Err(Unresolvable::ExtractorFailed(format!("{e:#}")));
            }
            Err(_) => {
                warn!("yt-dlp timed out after {:?}", self.config.timeout);
                return Err(Unresolvable::TimedOut(self.config.timeout));
            }
        };

        let stream_url = first_line(&output);
        if !STREAM_URL_REGEX.is_match(stream_url) {
            warn!("yt-dlp returned an invalid stream URL: {stream_url:?}");
            return Err(Unresolvable::InvalidUrl(stream_url.to_string()));
        }

        self.cache.insert(key, stream_url.to_string());
        debug!(
            "Stored stream URL in {} cache for {:?} ({} entries)",
            self.cache.name(),
            self.cache.ttl(),
            self.cache.len()
        );
        Ok(stream_url.to_string())
    }
}

fn first_line(output: &str) -> &str {
    output.trim().lines().next().unwrap_or_default()
}
