//! Error taxonomy shared by the normalizer, the provider resolvers and the
//! caching facade.
//!
//! Every failure a resolver can produce is one of these variants; callers
//! match on the variant, not on the message text. Results (failures included)
//! are memoized by the cache facade, hence `Clone`.

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input id")]
    InvalidInput,

    #[error("function not supported")]
    FunctionNotSupported,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("song not found")]
    SongNotFound,

    #[error("lyric not found")]
    LyricNotFound,

    #[error("album not found")]
    AlbumNotFound,

    #[error("playlist not found")]
    PlaylistNotFound,

    #[error("search result empty")]
    SearchEmpty,

    #[error("song url not available")]
    LinkNotFound,

    #[error("login required, check the configured cookie")]
    NeedLogin,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Parse(e.to_string())
    }
}
