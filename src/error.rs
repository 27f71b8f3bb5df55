use thiserror::Error;

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Everything that can go wrong between a route and the upstream catalog.
///
/// `Network`, `NotFound` and `EmptyResult` are the three outcomes a viewer
/// distinguishes; the rest are narrower flavours of a failed fetch.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    EmptyResult(String),

    #[error("{url} -> {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON parse failed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

impl CatalogError {
    /// Short text meant for the person looking at the page.
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::NotFound(_) => "Movie not found.".to_string(),
            CatalogError::EmptyResult(msg) => msg.clone(),
            CatalogError::InvalidRequest(msg) => msg.clone(),
            CatalogError::Network(_) | CatalogError::Status { .. } | CatalogError::Decode(_) => {
                "Failed to load data. Please try again later.".to_string()
            }
            CatalogError::MissingCredential(_) => "This listing is not configured.".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Network(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Decode(err)
    }
}
