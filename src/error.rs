use reqwest::StatusCode;
use thiserror::Error;

/// Errors that abort a whole playlist request
///
/// Per-item problems are never reported through this type, see
/// [`crate::resolver::Unresolvable`].
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist source is not configured (set PLAYLIST_URL)")]
    Config,

    #[error("unable to download playlist: HTTP {0}")]
    FetchStatus(StatusCode),

    #[error("unable to download playlist: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("playlist is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("playlist JSON is not a list: {0}")]
    Shape(&'static str),
}
