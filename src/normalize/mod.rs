//! Identifier normalization.
//!
//! Turns whatever the user pasted (a bare id, a provider URL, a share link,
//! a short link) into the `(source, type, canonical id)` triple a resolver
//! needs. Rules run strictly in order; a later rule never fires once an
//! earlier one matched. The ordering is load-bearing: the Soda share-link
//! host is also a substring match for the generic keyword table and would
//! be mis-sliced by the generic extraction rule.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::model::{InputSongId, SearchSource, SearchType};

/// Domain keyword → provider. Checked as plain substring matches.
static SOURCE_KEYWORDS: Lazy<Vec<(SearchSource, &'static str)>> = Lazy::new(|| {
    vec![
        (SearchSource::Netease, "163.com"),
        (SearchSource::QqMusic, "qq.com"),
        (SearchSource::Soda, "qishui.douyin.com"),
    ]
});

/// URL keyword → resource type, per provider. The id follows the keyword in
/// the provider's canonical URLs.
static TYPE_KEYWORDS: Lazy<Vec<(SearchSource, Vec<(SearchType, &'static str)>)>> =
    Lazy::new(|| {
        vec![
            (
                SearchSource::Netease,
                vec![
                    (SearchType::Song, "song?id="),
                    (SearchType::Album, "album?id="),
                    (SearchType::Playlist, "playlist?id="),
                ],
            ),
            (
                SearchSource::QqMusic,
                vec![
                    (SearchType::Song, "songDetail/"),
                    (SearchType::Album, "albumDetail/"),
                    (SearchType::Playlist, "playlist/"),
                ],
            ),
            (
                SearchSource::Soda,
                // Single-track share links only.
                vec![(SearchType::Song, "qishui.douyin.com/s/")],
            ),
        ]
    });

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("numeric regex"));
static ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]*$").expect("alnum regex"));
static SODA_SHARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://qishui\.douyin\.com/s/[a-zA-Z0-9]+/?").expect("soda share regex")
});

/// Marker preceding the embedded first-page JSON on QQ short-link pages.
const QQ_FIRST_PAGE_MARKER: &str = "window.__ssrFirstPageData__";
const QQ_SHORT_LINK_FRAGMENT: &str = "fcgi-bin/u";

fn type_keyword(source: SearchSource, search_type: SearchType) -> Option<&'static str> {
    TYPE_KEYWORDS
        .iter()
        .find(|(s, _)| *s == source)
        .and_then(|(_, kws)| kws.iter().find(|(t, _)| *t == search_type))
        .map(|(_, kw)| *kw)
}

/// Normalize a raw input string into a canonical identifier.
///
/// `hint_source` and `hint_type` seed the classification and are overridden
/// by anything the input itself reveals. Async because the QQ short-link
/// fallback has to fetch the share page; every other rule is pure.
pub async fn normalize(
    http: &reqwest::Client,
    input: &str,
    hint_source: SearchSource,
    hint_type: SearchType,
) -> ApiResult<InputSongId> {
    if input.trim().is_empty() {
        return Err(ApiError::InvalidInput);
    }

    let mut source = hint_source;
    let mut search_type = hint_type;

    for (s, kw) in SOURCE_KEYWORDS.iter() {
        if input.contains(kw) {
            source = *s;
        }
    }
    if let Some((_, kws)) = TYPE_KEYWORDS.iter().find(|(s, _)| *s == source) {
        for (t, kw) in kws {
            if input.contains(kw) {
                search_type = *t;
            }
        }
    }

    // NetEase ids are all-numeric; accept bare ids verbatim.
    if source == SearchSource::Netease && NUMERIC_RE.is_match(input) {
        return Ok(InputSongId::new(input, source, search_type));
    }

    // QQ mids are alphanumeric; accept bare ids verbatim.
    if source == SearchSource::QqMusic && ALNUM_RE.is_match(input) {
        return Ok(InputSongId::new(input, source, search_type));
    }

    // Soda share links keep the whole URL as the canonical id; the resolver
    // needs it intact. Must run before the generic keyword extraction, which
    // would slice out just the short code.
    if input.contains("qishui.douyin.com/s/")
        && let Some(m) = SODA_SHARE_RE.find(input)
    {
        return Ok(InputSongId::new(
            m.as_str(),
            SearchSource::Soda,
            SearchType::Song,
        ));
    }

    // Generic URL extraction: the id is the alphanumeric run right after the
    // (provider, type) keyword.
    if let Some(kw) = type_keyword(source, search_type)
        && let Some(idx) = input.find(kw)
    {
        let id: String = input[idx + kw.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        return Ok(InputSongId::new(id, source, search_type));
    }

    // QQ song short links redirect to a page embedding the first-page data;
    // the first song entry carries the real mid.
    if source == SearchSource::QqMusic && input.contains(QQ_SHORT_LINK_FRAGMENT) {
        if let Some(id) = resolve_qq_short_link(http, input).await? {
            return Ok(InputSongId::new(id, source, search_type));
        }
        debug!(input, "qq short link page had no song list");
    }

    Err(ApiError::InvalidInput)
}

async fn resolve_qq_short_link(http: &reqwest::Client, url: &str) -> ApiResult<Option<String>> {
    let html = http
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| ApiError::Network(e.to_string()))?
        .text()
        .await?;

    Ok(first_song_id_from_page(&html))
}

/// Pull the first song id out of the `window.__ssrFirstPageData__ = {...}`
/// blob on a QQ share page.
fn first_song_id_from_page(html: &str) -> Option<String> {
    let start = html.find(QQ_FIRST_PAGE_MARKER)? + QQ_FIRST_PAGE_MARKER.len();
    let end = html[start..].find("</script>")? + start;

    // The marker is followed by "=", then the JSON object.
    let data = html[start..end].trim();
    let data = data.get(1..)?.trim();

    let v: serde_json::Value = serde_json::from_str(data).ok()?;
    let first = v.get("songList")?.as_array()?.first()?;
    match first.get("id")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        for input in ["", "   "] {
            let err = normalize(&client(), input, SearchSource::Netease, SearchType::Song)
                .await
                .unwrap_err();
            assert_eq!(err, ApiError::InvalidInput);
        }
    }

    #[tokio::test]
    async fn test_netease_numeric_passthrough() {
        let id = normalize(&client(), "1234567", SearchSource::Netease, SearchType::Song)
            .await
            .unwrap();
        assert_eq!(id.id, "1234567");
        assert_eq!(id.source, SearchSource::Netease);
    }

    #[tokio::test]
    async fn test_qq_alnum_passthrough() {
        let id = normalize(&client(), "001yS7Vt2Ic5WG", SearchSource::QqMusic, SearchType::Song)
            .await
            .unwrap();
        assert_eq!(id.id, "001yS7Vt2Ic5WG");
        assert_eq!(id.source, SearchSource::QqMusic);
    }

    #[tokio::test]
    async fn test_netease_url_extraction() {
        let id = normalize(
            &client(),
            "https://music.163.com/#/song?id=1824045033&userid=42",
            SearchSource::QqMusic,
            SearchType::Playlist,
        )
        .await
        .unwrap();
        // Domain keyword overrides the hinted provider, URL keyword the type.
        assert_eq!(id.source, SearchSource::Netease);
        assert_eq!(id.search_type, SearchType::Song);
        assert_eq!(id.id, "1824045033");
    }

    #[tokio::test]
    async fn test_netease_playlist_url() {
        let id = normalize(
            &client(),
            "https://music.163.com/#/playlist?id=24381616",
            SearchSource::Netease,
            SearchType::Song,
        )
        .await
        .unwrap();
        assert_eq!(id.search_type, SearchType::Playlist);
        assert_eq!(id.id, "24381616");
    }

    #[tokio::test]
    async fn test_soda_share_link_keeps_full_url() {
        let id = normalize(
            &client(),
            "listen! https://qishui.douyin.com/s/imf2hxgy/ great song",
            SearchSource::Netease,
            SearchType::Album,
        )
        .await
        .unwrap();
        assert_eq!(id.source, SearchSource::Soda);
        assert_eq!(id.search_type, SearchType::Song);
        assert_eq!(id.id, "https://qishui.douyin.com/s/imf2hxgy/");
    }

    #[tokio::test]
    async fn test_soda_share_link_without_trailing_slash() {
        let id = normalize(
            &client(),
            "https://qishui.douyin.com/s/ABC123",
            SearchSource::Netease,
            SearchType::Song,
        )
        .await
        .unwrap();
        assert_eq!(id.id, "https://qishui.douyin.com/s/ABC123");
    }

    #[tokio::test]
    async fn test_qq_song_detail_url() {
        let id = normalize(
            &client(),
            "https://y.qq.com/n/ryqq/songDetail/0039MnYb0qxYhV",
            SearchSource::Netease,
            SearchType::Song,
        )
        .await
        .unwrap();
        assert_eq!(id.source, SearchSource::QqMusic);
        assert_eq!(id.id, "0039MnYb0qxYhV");
    }

    #[test]
    fn test_first_song_id_from_page() {
        let html = r#"<html><script>window.__ssrFirstPageData__ ={"songList":[{"id":"003a1tnv0RYfN9","name":"x"}]}</script></html>"#;
        assert_eq!(
            first_song_id_from_page(html).as_deref(),
            Some("003a1tnv0RYfN9")
        );
    }

    #[test]
    fn test_first_song_id_numeric() {
        let html = r#"<script>window.__ssrFirstPageData__= {"songList":[{"id":12345}]}</script>"#;
        assert_eq!(first_song_id_from_page(html).as_deref(), Some("12345"));
    }

    #[test]
    fn test_first_song_id_missing_marker() {
        assert_eq!(first_song_id_from_page("<html></html>"), None);
    }
}
