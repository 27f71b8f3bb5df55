use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CastMember, Genre, MovieDetail, MovieSummary, Paged, ProductionCompany, TrailerPage, Video,
};
use crate::pagination::validate_page;
use crate::trailer::{select_trailer, NO_TRAILER};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = CatalogError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            other => Err(CatalogError::InvalidRequest(format!(
                "time window must be 'day' or 'week', got '{other}'"
            ))),
        }
    }
}

/// The fixed listing rows served by the `/movie/{list}` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    NowPlaying,
    Popular,
    TopRated,
}

impl Listing {
    pub fn path(self) -> &'static str {
        match self {
            Listing::NowPlaying => "/movie/now_playing",
            Listing::Popular => "/movie/popular",
            Listing::TopRated => "/movie/top_rated",
        }
    }
}

impl FromStr for Listing {
    type Err = CatalogError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "now_playing" => Ok(Listing::NowPlaying),
            "popular" => Ok(Listing::Popular),
            "top_rated" => Ok(Listing::TopRated),
            other => Err(CatalogError::InvalidRequest(format!(
                "unknown listing '{other}'"
            ))),
        }
    }
}

/// Where a request carries its credential.
///
/// The browse endpoints take the v3 key as `api_key`; the listing rows and the
/// trailer page send the v4 read token as a bearer header. Both placements are
/// kept per endpoint family rather than unified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Catalog,
    Listing,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn fetch_trending(&self, window: TimeWindow) -> CatalogResult<Vec<MovieSummary>>;
    async fn fetch_movie_detail(&self, id: u64) -> CatalogResult<MovieDetail>;
    async fn fetch_by_genre(&self, genre_id: u64, page: u32) -> CatalogResult<Paged<MovieSummary>>;
    async fn search(&self, query: &str, page: u32) -> CatalogResult<Paged<MovieSummary>>;
    async fn fetch_genres(&self) -> CatalogResult<Vec<Genre>>;
    async fn fetch_videos(&self, movie_id: u64) -> CatalogResult<Vec<Video>>;
    async fn fetch_listing(&self, listing: Listing, page: u32)
        -> CatalogResult<Paged<MovieSummary>>;
    async fn fetch_trailer_page(&self, movie_id: u64) -> CatalogResult<TrailerPage>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    read_token: Option<String>,
}

impl TmdbClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> CatalogResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            read_token: None,
        })
    }

    pub fn with_read_token(mut self, token: impl Into<String>) -> Self {
        self.read_token = Some(token.into());
        self
    }

    pub fn from_config(config: &Config) -> CatalogResult<Self> {
        let client = Self::new(&config.tmdb_base_url, &config.tmdb_api_key)?;
        Ok(match &config.tmdb_read_token {
            Some(token) => client.with_read_token(token),
            None => client,
        })
    }

    fn request(&self, family: Family, path: &str) -> CatalogResult<RequestBuilder> {
        let url = format!("{}{path}", self.base_url);
        let builder = self.client.get(url);
        match family {
            Family::Catalog => Ok(builder.query(&[("api_key", self.api_key.as_str())])),
            Family::Listing => {
                let token = self
                    .read_token
                    .as_deref()
                    .ok_or(CatalogError::MissingCredential("TMDB_READ_TOKEN"))?;
                Ok(builder
                    .bearer_auth(token)
                    .header(header::CONTENT_TYPE, "application/json"))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        family: Family,
        path: &str,
        params: &[(&str, String)],
    ) -> CatalogResult<T> {
        let res = self.request(family, path)?.query(params).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(path, "TMDB returned 404");
            return Err(CatalogError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            warn!(path, status = status.as_u16(), "TMDB request failed");
            return Err(CatalogError::Status {
                url: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn fetch_plain_detail(&self, id: u64) -> CatalogResult<MovieDetail> {
        let detail: DetailResponse = self
            .get_json(
                Family::Listing,
                &format!("/movie/{id}"),
                &[("language", "en-US".to_string())],
            )
            .await?;
        Ok(detail.into())
    }

    async fn fetch_listing_videos(&self, id: u64) -> CatalogResult<Vec<Video>> {
        let data: ResultsResponse<Video> = self
            .get_json(
                Family::Listing,
                &format!("/movie/{id}/videos"),
                &[("language", "en-US".to_string())],
            )
            .await?;
        Ok(data.results)
    }
}

fn check_movie_id(id: u64) -> CatalogResult<u64> {
    if id == 0 {
        return Err(CatalogError::InvalidRequest(
            "movie id must be positive".to_string(),
        ));
    }
    Ok(id)
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn fetch_trending(&self, window: TimeWindow) -> CatalogResult<Vec<MovieSummary>> {
        let data: ResultsResponse<MovieSummary> = self
            .get_json(Family::Catalog, &format!("/trending/movie/{window}"), &[])
            .await?;
        Ok(data.results)
    }

    async fn fetch_movie_detail(&self, id: u64) -> CatalogResult<MovieDetail> {
        let id = check_movie_id(id)?;
        let detail: DetailResponse = self
            .get_json(
                Family::Catalog,
                &format!("/movie/{id}"),
                &[("append_to_response", "credits,videos,similar".to_string())],
            )
            .await?;
        Ok(detail.into())
    }

    async fn fetch_by_genre(&self, genre_id: u64, page: u32) -> CatalogResult<Paged<MovieSummary>> {
        let page = validate_page(page)?;
        self.get_json(
            Family::Catalog,
            "/discover/movie",
            &[
                ("with_genres", genre_id.to_string()),
                ("page", page.to_string()),
                ("sort_by", "popularity.desc".to_string()),
            ],
        )
        .await
    }

    async fn search(&self, query: &str, page: u32) -> CatalogResult<Paged<MovieSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Paged::empty(1));
        }
        let page = validate_page(page)?;
        self.get_json(
            Family::Catalog,
            "/search/movie",
            &[("query", query.to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn fetch_genres(&self) -> CatalogResult<Vec<Genre>> {
        let data: GenreListResponse = self
            .get_json(Family::Catalog, "/genre/movie/list", &[])
            .await?;
        Ok(data.genres)
    }

    async fn fetch_videos(&self, movie_id: u64) -> CatalogResult<Vec<Video>> {
        let id = check_movie_id(movie_id)?;
        let data: ResultsResponse<Video> = self
            .get_json(
                Family::Catalog,
                &format!("/movie/{id}/videos"),
                &[("language", "en-US".to_string())],
            )
            .await?;
        Ok(data.results)
    }

    async fn fetch_listing(
        &self,
        listing: Listing,
        page: u32,
    ) -> CatalogResult<Paged<MovieSummary>> {
        let page = validate_page(page)?;
        self.get_json(
            Family::Listing,
            listing.path(),
            &[("language", "en-US".to_string()), ("page", page.to_string())],
        )
        .await
    }

    async fn fetch_trailer_page(&self, movie_id: u64) -> CatalogResult<TrailerPage> {
        let id = check_movie_id(movie_id)?;
        let (movie, videos) =
            tokio::try_join!(self.fetch_plain_detail(id), self.fetch_listing_videos(id))?;
        let trailer = select_trailer(&videos)
            .cloned()
            .ok_or_else(|| CatalogError::EmptyResult(NO_TRAILER.to_string()))?;
        Ok(TrailerPage { movie, trailer })
    }
}

#[derive(Debug, Deserialize)]
struct ResultsResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct GenreListResponse {
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
}

/// `/movie/{id}` as it arrives, with or without the appended sub-resources.
#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(flatten)]
    summary: MovieSummary,
    runtime: Option<u32>,
    #[serde(default)]
    tagline: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    production_companies: Vec<ProductionCompany>,
    #[serde(default)]
    credits: Option<Credits>,
    #[serde(default)]
    videos: Option<ResultsResponse<Video>>,
    #[serde(default)]
    similar: Option<ResultsResponse<MovieSummary>>,
}

impl From<DetailResponse> for MovieDetail {
    fn from(raw: DetailResponse) -> Self {
        MovieDetail {
            summary: raw.summary,
            runtime: raw.runtime,
            tagline: raw.tagline.unwrap_or_default(),
            genres: raw.genres,
            production_companies: raw.production_companies,
            cast: raw.credits.map(|c| c.cast).unwrap_or_default(),
            similar: raw.similar.map(|s| s.results).unwrap_or_default(),
            videos: raw.videos.map(|v| v.results).unwrap_or_default(),
        }
    }
}
