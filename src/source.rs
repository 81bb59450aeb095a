use std::{sync::Arc, time::Duration};

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{cache::TtlCache, error::PlaylistError};

pub const DEFAULT_TITLE: &str = "Video";
pub const DEFAULT_GROUP: &str = "Videolar";

/// How an item's `url` turns into something a player can open
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// `url` already points at the media (mp4, m3u8, ...)
    #[default]
    Direct,
    /// `url` is a video page that yt-dlp has to resolve
    Youtube,
}

impl From<&str> for ItemKind {
    fn from(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("youtube") {
            Self::Youtube
        } else {
            Self::Direct
        }
    }
}

/// One entry of the source playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub group: Option<String>,
    pub logo: Option<String>,
    pub kind: ItemKind,
    pub url: Option<String>,
}

impl Item {
    /// Group shown in the `group-title` attribute
    #[must_use]
    pub fn display_group(&self) -> &str {
        self.group.as_deref().unwrap_or(DEFAULT_GROUP)
    }

    /// Group compared against the `?group=` filter. Missing groups never fall back to the default.
    #[must_use]
    pub fn filter_group(&self) -> &str {
        self.group.as_deref().map_or("", str::trim)
    }
}

/// Text attribute that tolerates the wrong JSON type: numbers and booleans
/// are stringified, anything else counts as missing
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

/// Only a real string can be a url; anything else leaves the item unresolvable
fn string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    logo: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    kind: Option<String>,
    #[serde(default, deserialize_with = "string_only")]
    url: Option<String>,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());

        Self {
            title: non_empty(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            group: non_empty(raw.group),
            logo: non_empty(raw.logo),
            kind: raw.kind.as_deref().map(ItemKind::from).unwrap_or_default(),
            url: non_empty(raw.url),
        }
    }
}

/// Parses a playlist document
///
/// Accepts either a bare array of items or an object holding them under `items`.
/// Entries that are not objects are dropped with a warning. Badly typed
/// attributes inside an object fall back to their defaults.
///
/// # Errors
/// Errors when the body is not JSON or has neither accepted shape
pub fn parse_playlist(body: &[u8]) -> Result<Vec<Item>, PlaylistError> {
    let document: Value = serde_json::from_slice(body)?;

    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(PlaylistError::Shape("`items` field is not an array")),
        },
        _ => {
            return Err(PlaylistError::Shape(
                "expected an array or an object with an `items` array",
            ));
        }
    };

    let items = entries
        .into_iter()
        .enumerate()
        .filter_map(
            |(index, entry)| match serde_json::from_value::<RawItem>(entry) {
                Ok(raw) => Some(Item::from(raw)),
                Err(e) => {
                    warn!("Skipping malformed playlist entry #{index}: {e}");
                    None
                }
            },
        )
        .collect();

    Ok(items)
}

/// Downloads and caches the source playlist
pub struct SourceFetcher {
    client: reqwest::Client,
    location: Option<String>,
    cache: TtlCache<Arc<[Item]>>,
}

impl SourceFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, location: Option<String>, ttl: Duration) -> Self {
        Self {
            client,
            location: location.filter(|l| !l.trim().is_empty()),
            cache: TtlCache::new("playlist-source", ttl),
        }
    }

    /// Returns the parsed source playlist, downloading it when the cached copy is stale
    ///
    /// # Errors
    /// * If no playlist location is configured
    /// * On network error or non-2xx response
    /// * If the body is not an acceptable playlist document
    #[instrument(skip(self))]
    pub async fn load_playlist(&self) -> Result<Arc<[Item]>, PlaylistError> {
        let Some(location) = self.location.as_deref() else {
            return Err(PlaylistError::Config);
        };

        let key = format!("pl:{location}");
        if let Some(items) = self.cache.get(&key) {
            debug!(
                "Using {} cache ({} items)",
                self.cache.name(),
                items.len()
            );
            return Ok(items);
        }

        if self.cache.is_empty() {
            info!("Fetching playlist for the first time");
        } else {
            debug!("Cached playlist is older than {:?}, refetching", self.cache.ttl());
        }

        let res = self
            .client
            .get(location)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(PlaylistError::FetchStatus(res.status()));
        }

        let body = res.bytes().await?;
        let items: Arc<[Item]> = parse_playlist(&body)?.into();
        info!("Fetched playlist with {} items", items.len());

        self.cache.insert(key, items.clone());
        Ok(items)
    }
}
