//! Soda Music share-link resolver.
//!
//! Soda exposes no stable API; everything comes from the share page's
//! embedded state assignment:
//!
//! ```text
//! <script>window._ROUTER_DATA = {"loaderData":{"track_page":{...}}};</script>
//! ```
//!
//! The payload is a reverse-engineered, versionless page format. Extraction
//! runs an ordered chain of strategies and stops at the first that yields a
//! parseable object. The canonical id of a Soda track is the share URL
//! itself; the provider surfaces no usable track id through this page.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::MusicApi;
use crate::error::{ApiError, ApiResult};
use crate::lrc;
use crate::model::{
    Album, Lyric, Playlist, SearchResult, SearchSource, SearchType, Song, SongSummary,
};

const ROUTER_DATA_MARKER: &str = "_ROUTER_DATA";
const TRACK_POINTER: &str = "/loaderData/track_page/audioWithLyricsOption";

pub struct SodaApi {
    http: reqwest::Client,
}

impl SodaApi {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Resolve a share link into its song and lyric in one fetch.
    pub async fn resolve_share(&self, share_url: &str) -> ApiResult<(Song, Lyric)> {
        if reqwest::Url::parse(share_url).is_err() {
            return Err(ApiError::InvalidInput);
        }

        let html = self
            .http
            .get(share_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::Network(e.to_string()))?
            .text()
            .await?;

        parse_share_page(&html, share_url)
    }
}

/// Extract and map the embedded track data. Split from the fetch so the
/// parsing contract is testable against page fixtures.
fn parse_share_page(html: &str, share_url: &str) -> ApiResult<(Song, Lyric)> {
    let raw = extract_router_data(html)
        .ok_or_else(|| ApiError::Parse("page has no _ROUTER_DATA assignment".into()))?;
    let root: Value = serde_json::from_str(&raw)
        .map_err(|e| ApiError::Parse(format!("_ROUTER_DATA is not valid JSON: {e}")))?;

    // The page loaded but does not describe a track: not a parse failure.
    let option = root.pointer(TRACK_POINTER).ok_or(ApiError::SongNotFound)?;

    let name = option
        .get("trackName")
        .or_else(|| option.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let singer: Vec<String> = option
        .get("artistName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| vec![s.to_string()])
        .unwrap_or_default();
    let duration_ms = option
        .get("duration")
        .and_then(Value::as_f64)
        .map(|secs| (secs * 1000.0) as i64)
        .unwrap_or(0);
    let link = option
        .get("url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let lyric_text = match option.pointer("/lyrics/sentences").and_then(Value::as_array) {
        Some(sentences) => lrc::join_timed_lines(sentences.iter().map(|s| {
            (
                s.get("startMs").and_then(Value::as_i64).unwrap_or(0),
                s.get("text").and_then(Value::as_str).unwrap_or_default(),
            )
        })),
        // No timing available; fall back to the plain text blob.
        None => option
            .pointer("/lyrics/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };

    let song = Song {
        id: share_url.to_string(),
        display_id: share_url.to_string(),
        name,
        singer,
        album: String::new(),
        duration_ms,
        link,
    };
    let lyric = Lyric {
        source: SearchSource::Soda,
        lyric: lyric_text,
        translate: None,
        transliteration: None,
        duration_ms,
    };

    Ok((song, lyric))
}

/// Ordered extraction strategies for the `_ROUTER_DATA = {...};` payload.
///
/// The object routinely contains literal `};` sequences inside nested string
/// values, so a brace-depth scan that understands JSON strings is the
/// primary strategy; the marker-to-first-semicolon cut stays as a last
/// resort for pages where the scan fails.
fn extract_router_data(html: &str) -> Option<String> {
    if let Some(obj) = scan_balanced_object(html, ROUTER_DATA_MARKER) {
        return Some(obj);
    }
    debug!("balanced-object scan failed, trying substring cut");
    cut_to_semicolon(html, ROUTER_DATA_MARKER)
}

/// Find `marker ... = {` and return the balanced object, honoring string
/// literals and escapes.
fn scan_balanced_object(text: &str, marker: &str) -> Option<String> {
    let at = text.find(marker)? + marker.len();
    let rest = &text[at..];
    let eq = rest.find('=')?;
    let rest = &rest[eq + 1..];
    let open = rest.find('{')?;
    let body = &rest[open..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(body[..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Everything from the first `{` after the marker up to the next bare `;`.
/// Only correct when the object closes before the first `;`, which holds for
/// the pages this fallback has been seen on.
fn cut_to_semicolon(text: &str, marker: &str) -> Option<String> {
    let at = text.find(marker)? + marker.len();
    let rest = &text[at..];
    let end = rest.find(';')?;
    let chunk = rest[..end].trim().trim_end_matches([';', '\n', '\r']);
    let open = chunk.find('{')?;
    Some(chunk[open..].to_string())
}

#[async_trait]
impl MusicApi for SodaApi {
    fn source(&self) -> SearchSource {
        SearchSource::Soda
    }

    async fn fetch_playlist(&self, _playlist_id: &str) -> ApiResult<Playlist> {
        Err(ApiError::FunctionNotSupported)
    }

    async fn fetch_album(&self, _album_id: &str) -> ApiResult<Album> {
        Err(ApiError::FunctionNotSupported)
    }

    async fn fetch_songs(&self, song_ids: &[String]) -> ApiResult<HashMap<String, ApiResult<Song>>> {
        // Single-track only; every id is a share link resolved on its own.
        let mut out = HashMap::new();
        for id in song_ids {
            let res = self.resolve_share(id).await.map(|(song, _)| song);
            out.insert(id.clone(), res);
        }
        Ok(out)
    }

    async fn fetch_lyric(&self, id: &str, _verbatim: bool) -> ApiResult<Lyric> {
        self.resolve_share(id).await.map(|(_, lyric)| lyric)
    }

    async fn fetch_link(&self, song_id: &str) -> ApiResult<String> {
        let (song, _) = self.resolve_share(song_id).await?;
        song.link.ok_or(ApiError::LinkNotFound)
    }

    async fn search(&self, keyword: &str, _search_type: SearchType) -> ApiResult<SearchResult> {
        // Only share links are searchable; resolve the keyword as one.
        let (song, _) = self
            .resolve_share(keyword)
            .await
            .map_err(|_| ApiError::SearchEmpty)?;

        let mut result = SearchResult::new(SearchSource::Soda, SearchType::Song);
        result.songs.push(SongSummary {
            display_id: keyword.to_string(),
            title: song.name,
            author: song.singer,
            album: song.album,
            duration_ms: song.duration_ms,
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARE_URL: &str = "https://qishui.douyin.com/s/imf2hxgy/";

    fn fixture(payload: &str) -> String {
        format!("<html><head></head><body><script>window._ROUTER_DATA = {payload};</script></body></html>")
    }

    #[test]
    fn test_share_page_mapping() {
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"T","artistName":"A","duration":180.5,"lyrics":{"sentences":[{"startMs":0,"text":"la"},{"startMs":1000,"text":"la la"}]}}}}}"#,
        );
        let (song, lyric) = parse_share_page(&html, SHARE_URL).expect("parse");

        assert_eq!(song.name, "T");
        assert_eq!(song.singer, vec!["A"]);
        assert_eq!(song.duration_ms, 180_500);
        assert_eq!(song.id, SHARE_URL);
        assert_eq!(song.display_id, SHARE_URL);
        assert_eq!(lyric.lyric, "[00:00.000]la\n[00:01.000]la la");
        assert_eq!(lyric.duration_ms, 180_500);
    }

    #[test]
    fn test_missing_track_option_is_not_found_not_parse() {
        let html = fixture(r#"{"loaderData":{"other_page":{}}}"#);
        let err = parse_share_page(&html, SHARE_URL).unwrap_err();
        assert!(matches!(err, ApiError::SongNotFound));
    }

    #[test]
    fn test_garbage_payload_is_parse_error() {
        let html = "<script>window._ROUTER_DATA = {broken;</script>";
        let err = parse_share_page(html, SHARE_URL).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn test_extraction_survives_nested_brace_semicolon_in_strings() {
        // A "};" inside a string value must not terminate the scan early.
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"weird }; name","artistName":"A","duration":1.0}}}}"#,
        );
        let (song, _) = parse_share_page(&html, SHARE_URL).expect("parse");
        assert_eq!(song.name, "weird }; name");
    }

    #[test]
    fn test_extraction_survives_escaped_quotes() {
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"say \"hi\" {ok};","duration":2.0}}}}"#,
        );
        let (song, _) = parse_share_page(&html, SHARE_URL).expect("parse");
        assert_eq!(song.name, "say \"hi\" {ok};");
    }

    #[test]
    fn test_plain_text_lyric_fallback() {
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"T","lyrics":{"text":"just words"}}}}}"#,
        );
        let (_, lyric) = parse_share_page(&html, SHARE_URL).expect("parse");
        assert_eq!(lyric.lyric, "just words");
    }

    #[test]
    fn test_empty_sentences_are_dropped() {
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"T","lyrics":{"sentences":[{"startMs":0,"text":"  "},{"startMs":65432,"text":"keep"}]}}}}}"#,
        );
        let (_, lyric) = parse_share_page(&html, SHARE_URL).expect("parse");
        assert_eq!(lyric.lyric, "[01:05.432]keep");
    }

    #[test]
    fn test_missing_artist_yields_empty_singer_list() {
        let html = fixture(
            r#"{"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"T"}}}}"#,
        );
        let (song, _) = parse_share_page(&html, SHARE_URL).expect("parse");
        assert!(song.singer.is_empty());
        assert_eq!(song.duration_ms, 0);
    }

    #[test]
    fn test_cut_to_semicolon_fallback() {
        // No "=" between marker and object defeats the balanced scan but not
        // the substring cut.
        let html = r#"_ROUTER_DATA {"loaderData":{"track_page":{"audioWithLyricsOption":{"trackName":"T"}}}};"#;
        assert!(scan_balanced_object(html, ROUTER_DATA_MARKER).is_none());
        let raw = extract_router_data(html).expect("fallback");
        assert!(serde_json::from_str::<Value>(&raw).is_ok());
    }
}
