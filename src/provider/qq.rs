//! QQ Music resolver.
//!
//! Uses the unauthenticated web endpoints on `c.y.qq.com` / `u.y.qq.com`.
//! Every request needs a `Referer: https://y.qq.com/` header; the endpoints
//! reject referer-less clients. Ids are alphanumeric `songmid` values. No
//! bulk detail endpoint exists, so batches resolve one song per request.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::MusicApi;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Album, Lyric, Playlist, SearchResult, SearchSource, SearchType, SimpleSong, Song, SongSummary,
};

const REFERER: &str = "https://y.qq.com/";

pub struct QqMusicApi {
    http: reqwest::Client,
    cookie: Option<String>,
}

impl QqMusicApi {
    pub fn new(http: reqwest::Client, cookie: Option<String>) -> Self {
        Self { http, cookie }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut rb = self.http.get(url).header("Referer", REFERER);
        if let Some(cookie) = &self.cookie {
            rb = rb.header("Cookie", cookie.clone());
        }
        rb
    }

    async fn get_json(&self, url: &str) -> ApiResult<Value> {
        let v = self
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Network(e.to_string()))?
            .json()
            .await?;
        Ok(v)
    }

    async fn single_song(&self, songmid: &str) -> ApiResult<Song> {
        let url = format!(
            "https://c.y.qq.com/v8/fcg-bin/fcg_play_single_song.fcg?songmid={songmid}&format=json&platform=yqq"
        );
        let v = self.get_json(&url).await?;
        if code_of(&v) != 0 {
            return Err(ApiError::SongNotFound);
        }

        let song = v
            .pointer("/data/0")
            .filter(|s| !s.is_null())
            .ok_or(ApiError::SongNotFound)?;
        Ok(Song {
            id: song
                .get("id")
                .and_then(Value::as_i64)
                .map(|id| id.to_string())
                .unwrap_or_else(|| songmid.to_string()),
            display_id: songmid.to_string(),
            name: song
                .get("title")
                .or_else(|| song.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            singer: singer_names(song),
            album: song
                .pointer("/album/name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            // `interval` is in seconds.
            duration_ms: song.get("interval").and_then(Value::as_i64).unwrap_or(0) * 1000,
            link: None,
        })
    }
}

fn singer_names(song: &Value) -> Vec<String> {
    song.get("singer")
        .and_then(Value::as_array)
        .map(|singers| {
            singers
                .iter()
                .filter_map(|s| s.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn code_of(v: &Value) -> i64 {
    v.get("code")
        .or_else(|| v.get("retcode"))
        .and_then(Value::as_i64)
        .unwrap_or(-1)
}

#[async_trait]
impl MusicApi for QqMusicApi {
    fn source(&self) -> SearchSource {
        SearchSource::QqMusic
    }

    async fn fetch_playlist(&self, _playlist_id: &str) -> ApiResult<Playlist> {
        // Playlists are not reachable through the unauthenticated web surface
        // this resolver targets.
        Err(ApiError::FunctionNotSupported)
    }

    async fn fetch_album(&self, album_id: &str) -> ApiResult<Album> {
        let url = format!(
            "https://c.y.qq.com/v8/fcg-bin/fcg_v8_album_info_cp.fcg?albummid={album_id}&format=json"
        );
        let v = self.get_json(&url).await?;
        if code_of(&v) != 0 {
            return Err(ApiError::AlbumNotFound);
        }

        let data = v.get("data").ok_or(ApiError::AlbumNotFound)?;
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let songs = data
            .get("list")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|s| {
                        let mid = s.get("songmid").and_then(Value::as_str)?;
                        Some(SimpleSong {
                            id: mid.to_string(),
                            display_id: mid.to_string(),
                            name: s
                                .get("songname")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            singer: singer_names(s),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Album { name, songs })
    }

    async fn fetch_songs(&self, song_ids: &[String]) -> ApiResult<HashMap<String, ApiResult<Song>>> {
        let mut out = HashMap::new();
        for mid in song_ids {
            out.insert(mid.clone(), self.single_song(mid).await);
        }
        Ok(out)
    }

    async fn fetch_lyric(&self, id: &str, _verbatim: bool) -> ApiResult<Lyric> {
        let url = format!(
            "https://c.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg?songmid={id}&format=json&nobase64=1&g_tk=5381"
        );
        let v = self.get_json(&url).await?;
        if code_of(&v) != 0 {
            return Err(ApiError::LyricNotFound);
        }

        let pick = |key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        let lyric = pick("lyric").ok_or(ApiError::LyricNotFound)?;
        Ok(Lyric {
            source: SearchSource::QqMusic,
            lyric,
            translate: pick("trans"),
            transliteration: pick("roma"),
            duration_ms: 0,
        })
    }

    async fn fetch_link(&self, song_id: &str) -> ApiResult<String> {
        let req = json!({
            "req_0": {
                "module": "vkey.GetVkeyServer",
                "method": "CgiGetVkey",
                "param": {
                    "guid": "0",
                    "songmid": [song_id],
                    "uin": "0",
                    "platform": "20"
                }
            }
        });
        let url = format!(
            "https://u.y.qq.com/cgi-bin/musicu.fcg?format=json&data={}",
            urlencoding::encode(&req.to_string())
        );
        let v = self.get_json(&url).await?;

        let purl = v
            .pointer("/req_0/data/midurlinfo/0/purl")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::LinkNotFound)?;
        let host = v
            .pointer("/req_0/data/sip/0")
            .and_then(Value::as_str)
            .unwrap_or("https://dl.stream.qqmusic.qq.com/");
        Ok(format!("{host}{purl}"))
    }

    async fn search(&self, keyword: &str, search_type: SearchType) -> ApiResult<SearchResult> {
        if search_type != SearchType::Song {
            return Err(ApiError::FunctionNotSupported);
        }

        let url = format!(
            "https://c.y.qq.com/soso/fcgi-bin/client_search_cp?w={}&format=json&p=1&n=20",
            urlencoding::encode(keyword)
        );
        let v = self.get_json(&url).await?;

        let songs: Vec<SongSummary> = v
            .pointer("/data/song/list")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|s| {
                        let mid = s.get("songmid").and_then(Value::as_str)?;
                        Some(SongSummary {
                            display_id: mid.to_string(),
                            title: s
                                .get("songname")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            author: singer_names(s),
                            album: s
                                .get("albumname")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            duration_ms: s.get("interval").and_then(Value::as_i64).unwrap_or(0)
                                * 1000,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if songs.is_empty() {
            return Err(ApiError::SearchEmpty);
        }

        let mut result = SearchResult::new(SearchSource::QqMusic, SearchType::Song);
        result.songs = songs;
        Ok(result)
    }
}
