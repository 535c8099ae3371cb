//! Domain errors shared by every provider.
//!
//! Only two kinds ever reach the caller: the query was valid but the source
//! had nothing (`NoResults`), or the source itself failed (`Provider`).
//! Anything unexpected is funneled into `Provider` at each public method
//! boundary so transport/parse failure modes never leak raw.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source answered but had no matching track.
    #[error("no results: {0}")]
    NoResults(String),

    /// The source was unreachable, or reachable but misbehaving.
    #[error("provider error: {0}")]
    Provider(String),
}

impl Error {
    pub fn no_results(msg: impl Into<String>) -> Self {
        Self::NoResults(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Provider(format!("http error: {e}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Provider(format!("json parse error: {e}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Provider(format!("io error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
