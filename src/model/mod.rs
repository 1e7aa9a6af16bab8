//! Canonical records produced by the provider resolvers.
//!
//! All of these are plain owned value types; resolvers build them, callers
//! own them, and the cache facade stores immutable copies. Nothing here holds
//! a back-reference to the resolver that produced it.

use serde::{Deserialize, Serialize};

/// Music provider a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchSource {
    Netease,
    QqMusic,
    Soda,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Netease => "netease",
            SearchSource::QqMusic => "qq",
            SearchSource::Soda => "soda",
        }
    }
}

/// Kind of resource being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchType {
    Song,
    Album,
    Playlist,
}

/// The normalized identifier: whatever free-form string the user supplied,
/// reduced to the id a resolver actually needs. Created once per resolution
/// request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSongId {
    pub id: String,
    pub source: SearchSource,
    pub search_type: SearchType,
}

impl InputSongId {
    pub fn new(id: impl Into<String>, source: SearchSource, search_type: SearchType) -> Self {
        Self {
            id: id.into(),
            source,
            search_type,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Song {
    /// Provider-local id.
    pub id: String,
    /// Human-facing identifier, e.g. the original share URL for providers
    /// that expose no stable id.
    pub display_id: String,
    pub name: String,
    pub singer: Vec<String>,
    pub album: String,
    /// Duration in milliseconds.
    pub duration_ms: i64,
    /// Direct playable media URL, when the provider exposes one.
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lyric {
    pub source: SearchSource,
    /// Newline-joined lines, `[mm:ss.mmm]`-prefixed when timing is available.
    /// Lines stay in provider emission order; they are never re-sorted.
    pub lyric: String,
    pub translate: Option<String>,
    pub transliteration: Option<String>,
    /// Mirrors the owning song's duration, in milliseconds.
    pub duration_ms: i64,
}

/// Lightweight constituent entry of an album or playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleSong {
    pub id: String,
    pub display_id: String,
    pub name: String,
    pub singer: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    pub songs: Vec<SimpleSong>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub songs: Vec<SimpleSong>,
}

/// One row of a keyword search, in provider-reported relevance order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongSummary {
    pub display_id: String,
    pub title: String,
    pub author: Vec<String>,
    pub album: String,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub source: SearchSource,
    pub search_type: SearchType,
    pub songs: Vec<SongSummary>,
}

impl SearchResult {
    pub fn new(source: SearchSource, search_type: SearchType) -> Self {
        Self {
            source,
            search_type,
            songs: Vec::new(),
        }
    }
}
