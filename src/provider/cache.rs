//! Caching decorator around a provider resolver.
//!
//! Wraps any [`MusicApi`] and memoizes every result, failures included: a
//! provider that already rejected a request is not hammered again for the
//! same key. Each key maps to a `tokio::sync::OnceCell`, so the first caller
//! performs the fetch and concurrent callers for the same key await that
//! result instead of issuing redundant requests, so there is at most one
//! underlying resolution per key per process lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use super::MusicApi;
use crate::error::{ApiError, ApiResult};
use crate::model::{Album, Lyric, Playlist, SearchResult, SearchSource, SearchType, Song};

/// One memo table. The outer mutex only guards the key → cell mapping;
/// fetches run outside of it.
struct Memo<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<ApiResult<V>>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: &K) -> Arc<OnceCell<ApiResult<V>>> {
        self.cells
            .lock()
            .expect("cache lock poisoned")
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Cached result if the key was already resolved.
    fn get(&self, key: &K) -> Option<ApiResult<V>> {
        self.cell(key).get().cloned()
    }

    async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> ApiResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<V>>,
    {
        let cell = self.cell(&key);
        cell.get_or_init(fetch).await.clone()
    }

    /// Store a result without fetching; an already-resolved key wins.
    async fn put(&self, key: K, value: ApiResult<V>) -> ApiResult<V> {
        let cell = self.cell(&key);
        cell.get_or_init(|| async { value }).await.clone()
    }
}

/// Caching [`MusicApi`] decorator. Holds the provider it wraps; all calls go
/// through the memo tables.
pub struct Cached<P> {
    inner: P,
    songs: Memo<String, Song>,
    lyrics: Memo<(String, bool), Lyric>,
    albums: Memo<String, Album>,
    playlists: Memo<String, Playlist>,
    links: Memo<String, String>,
    searches: Memo<(String, SearchType), SearchResult>,
    /// Serializes bulk miss resolution so overlapping batches cannot fetch
    /// the same key twice.
    batch_gate: tokio::sync::Mutex<()>,
}

impl<P: MusicApi> Cached<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            songs: Memo::new(),
            lyrics: Memo::new(),
            albums: Memo::new(),
            playlists: Memo::new(),
            links: Memo::new(),
            searches: Memo::new(),
            batch_gate: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl<P: MusicApi> MusicApi for Cached<P> {
    fn source(&self) -> SearchSource {
        self.inner.source()
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> ApiResult<Playlist> {
        self.playlists
            .get_or_fetch(playlist_id.to_string(), || {
                self.inner.fetch_playlist(playlist_id)
            })
            .await
    }

    async fn fetch_album(&self, album_id: &str) -> ApiResult<Album> {
        self.albums
            .get_or_fetch(album_id.to_string(), || self.inner.fetch_album(album_id))
            .await
    }

    async fn fetch_songs(&self, song_ids: &[String]) -> ApiResult<HashMap<String, ApiResult<Song>>> {
        let mut out = HashMap::new();
        let mut misses: Vec<String> = Vec::new();

        for id in song_ids {
            match self.songs.get(id) {
                Some(res) => {
                    out.insert(id.clone(), res);
                }
                None if !misses.contains(id) => misses.push(id.clone()),
                None => {}
            }
        }

        if !misses.is_empty() {
            let _gate = self.batch_gate.lock().await;

            // A concurrent batch may have resolved some keys while we waited.
            let mut still: Vec<String> = Vec::new();
            for id in misses {
                match self.songs.get(&id) {
                    Some(res) => {
                        out.insert(id, res);
                    }
                    None => still.push(id),
                }
            }

            if !still.is_empty() {
                debug!(
                    source = self.inner.source().as_str(),
                    misses = still.len(),
                    "resolving song batch"
                );
                match self.inner.fetch_songs(&still).await {
                    Ok(mut fetched) => {
                        for id in still {
                            let res = fetched.remove(&id).unwrap_or(Err(ApiError::SongNotFound));
                            let stored = self.songs.put(id.clone(), res).await;
                            out.insert(id, stored);
                        }
                    }
                    Err(e) => {
                        for id in still {
                            let stored = self.songs.put(id.clone(), Err(e.clone())).await;
                            out.insert(id, stored);
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    async fn fetch_lyric(&self, id: &str, verbatim: bool) -> ApiResult<Lyric> {
        self.lyrics
            .get_or_fetch((id.to_string(), verbatim), || {
                self.inner.fetch_lyric(id, verbatim)
            })
            .await
    }

    async fn fetch_link(&self, song_id: &str) -> ApiResult<String> {
        self.links
            .get_or_fetch(song_id.to_string(), || self.inner.fetch_link(song_id))
            .await
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> ApiResult<SearchResult> {
        self.searches
            .get_or_fetch((keyword.to_string(), search_type), || {
                self.inner.search(keyword, search_type)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts underlying calls instead of hitting the network.
    struct MockApi {
        lyric_calls: AtomicUsize,
        song_calls: AtomicUsize,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                lyric_calls: AtomicUsize::new(0),
                song_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MusicApi for MockApi {
        fn source(&self) -> SearchSource {
            SearchSource::Netease
        }

        async fn fetch_playlist(&self, _: &str) -> ApiResult<Playlist> {
            Err(ApiError::FunctionNotSupported)
        }

        async fn fetch_album(&self, _: &str) -> ApiResult<Album> {
            Err(ApiError::AlbumNotFound)
        }

        async fn fetch_songs(
            &self,
            song_ids: &[String],
        ) -> ApiResult<HashMap<String, ApiResult<Song>>> {
            self.song_calls.fetch_add(1, Ordering::SeqCst);
            let mut out = HashMap::new();
            for id in song_ids {
                if id == "missing" {
                    out.insert(id.clone(), Err(ApiError::SongNotFound));
                } else {
                    out.insert(
                        id.clone(),
                        Ok(Song {
                            id: id.clone(),
                            display_id: id.clone(),
                            name: format!("song {id}"),
                            ..Default::default()
                        }),
                    );
                }
            }
            Ok(out)
        }

        async fn fetch_lyric(&self, id: &str, _verbatim: bool) -> ApiResult<Lyric> {
            self.lyric_calls.fetch_add(1, Ordering::SeqCst);
            // Yield so concurrent callers pile up on the same cell.
            tokio::task::yield_now().await;
            Ok(Lyric {
                source: SearchSource::Netease,
                lyric: format!("[00:00.000]{id}"),
                translate: None,
                transliteration: None,
                duration_ms: 0,
            })
        }

        async fn fetch_link(&self, _: &str) -> ApiResult<String> {
            Err(ApiError::LinkNotFound)
        }

        async fn search(&self, _: &str, _: SearchType) -> ApiResult<SearchResult> {
            Err(ApiError::SearchEmpty)
        }
    }

    #[tokio::test]
    async fn test_concurrent_same_key_single_fetch() {
        let cached = Arc::new(Cached::new(MockApi::new()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = Arc::clone(&cached);
            handles.push(tokio::spawn(async move { c.fetch_lyric("42", false).await }));
        }
        for h in handles {
            assert!(h.await.expect("join").is_ok());
        }

        assert_eq!(cached.inner.lyric_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_variant_flag_is_part_of_the_key() {
        let cached = Cached::new(MockApi::new());
        cached.fetch_lyric("42", false).await.expect("line lyric");
        cached.fetch_lyric("42", true).await.expect("verbatim lyric");
        cached.fetch_lyric("42", false).await.expect("cached");
        assert_eq!(cached.inner.lyric_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_merges_hits_and_misses() {
        let cached = Cached::new(MockApi::new());

        let first = cached.fetch_songs(&["a".into(), "b".into()]).await.expect("batch");
        assert_eq!(first.len(), 2);
        assert_eq!(cached.inner.song_calls.load(Ordering::SeqCst), 1);

        // "a" and "b" are hits now; only "c" and "missing" go to the provider.
        let second = cached
            .fetch_songs(&["a".into(), "c".into(), "missing".into()])
            .await
            .expect("batch");
        assert_eq!(second.len(), 3);
        assert_eq!(cached.inner.song_calls.load(Ordering::SeqCst), 2);
        assert!(second["a"].is_ok());
        assert!(second["c"].is_ok());
        assert!(matches!(second["missing"], Err(ApiError::SongNotFound)));
    }

    #[tokio::test]
    async fn test_failures_are_memoized() {
        let cached = Cached::new(MockApi::new());
        cached.fetch_songs(&["missing".into()]).await.expect("batch");
        cached.fetch_songs(&["missing".into()]).await.expect("batch");
        // Second call is served from cache, failure included.
        assert_eq!(cached.inner.song_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_operation_passthrough() {
        let cached = Cached::new(MockApi::new());
        assert!(matches!(
            cached.fetch_playlist("p1").await,
            Err(ApiError::FunctionNotSupported)
        ));
    }
}
