//! Provider resolvers.
//!
//! One resolver per provider, all behind the same [`MusicApi`] surface, each
//! wrapped in the caching decorator from [`cache`]. The router at the bottom
//! is what the rest of the program talks to.

pub mod cache;
pub mod netease;
pub mod qq;
pub mod soda;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ApiResult;
use crate::model::{Album, Lyric, Playlist, SearchResult, SearchSource, SearchType, Song};

/// Unified resolution surface implemented by every provider.
///
/// Operations a provider does not offer return
/// [`ApiError::FunctionNotSupported`](crate::error::ApiError::FunctionNotSupported)
/// without touching the network.
#[async_trait]
pub trait MusicApi: Send + Sync {
    fn source(&self) -> SearchSource;

    async fn fetch_playlist(&self, playlist_id: &str) -> ApiResult<Playlist>;

    async fn fetch_album(&self, album_id: &str) -> ApiResult<Album>;

    /// Resolve a batch of song ids. The returned map carries one entry per
    /// requested id; per-id failures do not fail the batch.
    async fn fetch_songs(&self, song_ids: &[String]) -> ApiResult<HashMap<String, ApiResult<Song>>>;

    /// `verbatim` selects word-by-word lyrics where the provider offers them.
    async fn fetch_lyric(&self, id: &str, verbatim: bool) -> ApiResult<Lyric>;

    /// Direct playable media URL for a song.
    async fn fetch_link(&self, song_id: &str) -> ApiResult<String>;

    async fn search(&self, keyword: &str, search_type: SearchType) -> ApiResult<SearchResult>;
}

/// Provider router: one cached resolver per provider, dispatched by tag.
pub struct Resolvers {
    netease: cache::Cached<netease::NeteaseApi>,
    qq: cache::Cached<qq::QqMusicApi>,
    soda: cache::Cached<soda::SodaApi>,
}

impl Resolvers {
    pub fn new(http: reqwest::Client, cfg: &Config) -> Self {
        Self {
            netease: cache::Cached::new(netease::NeteaseApi::new(
                http.clone(),
                cfg.providers.netease_cookie.clone(),
            )),
            qq: cache::Cached::new(qq::QqMusicApi::new(
                http.clone(),
                cfg.providers.qq_cookie.clone(),
            )),
            soda: cache::Cached::new(soda::SodaApi::new(http)),
        }
    }

    pub fn api(&self, source: SearchSource) -> &dyn MusicApi {
        match source {
            SearchSource::Netease => &self.netease,
            SearchSource::QqMusic => &self.qq,
            SearchSource::Soda => &self.soda,
        }
    }
}
