//! NetEase Cloud Music resolver.
//!
//! Talks to the public web API on `music.163.com`. Responses are plain JSON
//! but with no schema guarantee, so mapping goes through `serde_json::Value`
//! with optional lookups throughout. The detail endpoint is the only bulk
//! one; large id lists are chunked before hitting it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::MusicApi;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Album, Lyric, Playlist, SearchResult, SearchSource, SearchType, SimpleSong, Song, SongSummary,
};
use crate::util;

const BASE: &str = "https://music.163.com";
/// The detail endpoint accepts up to this many ids per call.
const DETAIL_BATCH: usize = 500;

pub struct NeteaseApi {
    http: reqwest::Client,
    cookie: Option<String>,
}

impl NeteaseApi {
    pub fn new(http: reqwest::Client, cookie: Option<String>) -> Self {
        Self { http, cookie }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut rb = self.http.get(url).header("Referer", format!("{BASE}/"));
        if let Some(cookie) = &self.cookie {
            rb = rb.header("Cookie", cookie.clone());
        }
        rb
    }

    async fn song_detail(&self, ids: &[String]) -> ApiResult<Value> {
        let url = format!("{BASE}/api/song/detail?ids=[{}]", ids.join(","));
        let v: Value = self
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Network(e.to_string()))?
            .json()
            .await?;
        Ok(v)
    }
}

fn artist_names(song: &Value) -> Vec<String> {
    song.get("artists")
        .or_else(|| song.get("ar"))
        .and_then(Value::as_array)
        .map(|artists| {
            artists
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn album_name(song: &Value) -> String {
    song.get("album")
        .or_else(|| song.get("al"))
        .and_then(|al| al.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn duration_ms(song: &Value) -> i64 {
    song.get("duration")
        .or_else(|| song.get("dt"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn map_song(song: &Value) -> Option<Song> {
    let id = song.get("id")?.as_i64()?.to_string();
    Some(Song {
        display_id: id.clone(),
        id,
        name: song
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        singer: artist_names(song),
        album: album_name(song),
        duration_ms: duration_ms(song),
        link: None,
    })
}

fn code_of(v: &Value) -> i64 {
    v.get("code").and_then(Value::as_i64).unwrap_or(-1)
}

#[async_trait]
impl MusicApi for NeteaseApi {
    fn source(&self) -> SearchSource {
        SearchSource::Netease
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> ApiResult<Playlist> {
        let url = format!("{BASE}/api/v6/playlist/detail?id={playlist_id}");
        let v: Value = self.get(&url).send().await?.json().await?;

        match code_of(&v) {
            200 => {}
            // Privacy-gated playlists require a logged-in cookie.
            20001 => return Err(ApiError::NeedLogin),
            _ => return Err(ApiError::PlaylistNotFound),
        }

        let playlist = v.get("playlist").ok_or(ApiError::PlaylistNotFound)?;
        let name = playlist
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let track_ids: Vec<String> = playlist
            .get("trackIds")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(|t| t.get("id").and_then(Value::as_i64))
                    .map(|id| id.to_string())
                    .collect()
            })
            .unwrap_or_default();

        // Track order comes from trackIds; detail responses don't keep it.
        let songs = self.fetch_songs(&track_ids).await?;
        let entries = track_ids
            .iter()
            .filter_map(|id| songs.get(id).and_then(|r| r.as_ref().ok()))
            .map(|s| SimpleSong {
                id: s.id.clone(),
                display_id: s.display_id.clone(),
                name: s.name.clone(),
                singer: s.singer.clone(),
            })
            .collect();

        Ok(Playlist { name, songs: entries })
    }

    async fn fetch_album(&self, album_id: &str) -> ApiResult<Album> {
        let url = format!("{BASE}/api/v1/album/{album_id}");
        let v: Value = self.get(&url).send().await?.json().await?;
        if code_of(&v) != 200 {
            return Err(ApiError::AlbumNotFound);
        }

        let name = v
            .pointer("/album/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let songs = v
            .get("songs")
            .and_then(Value::as_array)
            .map(|songs| {
                songs
                    .iter()
                    .filter_map(map_song)
                    .map(|s| SimpleSong {
                        id: s.id,
                        display_id: s.display_id,
                        name: s.name,
                        singer: s.singer,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Album { name, songs })
    }

    async fn fetch_songs(&self, song_ids: &[String]) -> ApiResult<HashMap<String, ApiResult<Song>>> {
        let mut out = HashMap::new();

        for chunk in util::batch(song_ids.iter().cloned(), DETAIL_BATCH) {
            let v = self.song_detail(&chunk).await?;
            if code_of(&v) != 200 {
                debug!(code = code_of(&v), "song detail rejected");
                for id in chunk {
                    out.insert(id, Err(ApiError::SongNotFound));
                }
                continue;
            }

            let mut found: HashMap<String, Song> = v
                .get("songs")
                .and_then(Value::as_array)
                .map(|songs| {
                    songs
                        .iter()
                        .filter_map(map_song)
                        .map(|s| (s.id.clone(), s))
                        .collect()
                })
                .unwrap_or_default();

            for id in chunk {
                match found.remove(&id) {
                    Some(song) => out.insert(id, Ok(song)),
                    None => out.insert(id, Err(ApiError::SongNotFound)),
                };
            }
        }

        Ok(out)
    }

    async fn fetch_lyric(&self, id: &str, _verbatim: bool) -> ApiResult<Lyric> {
        let url = format!("{BASE}/api/song/lyric?id={id}&lv=-1&tv=-1&rv=-1");
        let v: Value = self.get(&url).send().await?.json().await?;
        if code_of(&v) != 200 {
            return Err(ApiError::LyricNotFound);
        }

        let lyric = v
            .pointer("/lrc/lyric")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if lyric.trim().is_empty() {
            return Err(ApiError::LyricNotFound);
        }

        let pick = |ptr: &str| {
            v.pointer(ptr)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        Ok(Lyric {
            source: SearchSource::Netease,
            lyric,
            translate: pick("/tlyric/lyric"),
            transliteration: pick("/romalrc/lyric"),
            duration_ms: 0,
        })
    }

    async fn fetch_link(&self, song_id: &str) -> ApiResult<String> {
        let url = format!("{BASE}/api/song/enhance/player/url?ids=[{song_id}]&br=999000");
        let v: Value = self.get(&url).send().await?.json().await?;

        v.pointer("/data/0/url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::LinkNotFound)
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> ApiResult<SearchResult> {
        // Only song search is wired up; album/playlist hits come back in a
        // shape the canonical records don't model.
        let type_code = match search_type {
            SearchType::Song => "1",
            _ => return Err(ApiError::FunctionNotSupported),
        };

        let v: Value = self
            .http
            .post(format!("{BASE}/api/search/get/web"))
            .header("Referer", format!("{BASE}/"))
            .form(&[
                ("s", keyword),
                ("type", type_code),
                ("offset", "0"),
                ("total", "true"),
                ("limit", "20"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let songs: Vec<SongSummary> = v
            .pointer("/result/songs")
            .and_then(Value::as_array)
            .map(|songs| {
                songs
                    .iter()
                    .filter_map(|s| {
                        let id = s.get("id")?.as_i64()?.to_string();
                        Some(SongSummary {
                            display_id: id,
                            title: s
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            author: artist_names(s),
                            album: album_name(s),
                            duration_ms: duration_ms(s),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if songs.is_empty() {
            return Err(ApiError::SearchEmpty);
        }

        let mut result = SearchResult::new(SearchSource::Netease, SearchType::Song);
        result.songs = songs;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_song_long_and_short_field_names() {
        let long: Value = serde_json::json!({
            "id": 1001,
            "name": "Song",
            "artists": [{"name": "A"}, {"name": "B"}],
            "album": {"name": "Al"},
            "duration": 180000
        });
        let s = map_song(&long).expect("map");
        assert_eq!(s.id, "1001");
        assert_eq!(s.singer, vec!["A", "B"]);
        assert_eq!(s.album, "Al");
        assert_eq!(s.duration_ms, 180_000);

        let short: Value = serde_json::json!({
            "id": 2, "name": "S", "ar": [{"name": "C"}], "al": {"name": "X"}, "dt": 1000
        });
        let s = map_song(&short).expect("map");
        assert_eq!(s.singer, vec!["C"]);
        assert_eq!(s.album, "X");
        assert_eq!(s.duration_ms, 1000);
    }

    #[test]
    fn test_map_song_requires_id() {
        let v: Value = serde_json::json!({"name": "no id"});
        assert!(map_song(&v).is_none());
    }
}
