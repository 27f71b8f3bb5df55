use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::genres::{self, GenreCatalog};
use crate::images;
use crate::models::{Genre, MovieDetail, MovieSummary, Paged, Video};
use crate::pagination::Pager;
use crate::playback::{PlaybackSession, PlaybackState, SessionRegistry};
use crate::tmdb::{Listing, TimeWindow, TmdbApi, TmdbClient};
use crate::trailer::{self, NO_TRAILER};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub genres: &'static GenreCatalog,
    pub sessions: Arc<Mutex<SessionRegistry>>,
}

impl AppState {
    pub fn new(tmdb: Arc<dyn TmdbApi>, genres: &'static GenreCatalog) -> Self {
        Self {
            tmdb,
            genres,
            sessions: Arc::new(Mutex::new(SessionRegistry::default())),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> =
        Arc::new(TmdbClient::from_config(&config).context("Failed to build TMDB client")?);
    if config.tmdb_read_token.is_none() {
        warn!("TMDB_READ_TOKEN not set; listing rows and trailer pages will fail");
    }

    let catalog = GenreCatalog::load(tmdb.as_ref()).await;
    if catalog.is_empty() {
        warn!("Genre catalog is empty; genre pages will show no names");
    }
    genres::install(catalog)?;
    let genres = genres::installed().context("Genre catalog missing after install")?;

    let state = AppState::new(tmdb, genres);
    tokio::spawn(sweep_sessions(state.sessions.clone()));
    let app = build_router(state);

    info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/home", get(home))
        .route("/api/trending/:window", get(trending))
        .route("/api/listing/:listing", get(listing))
        .route("/api/movie/:id", get(movie_detail))
        .route("/api/movie/:id/trailer", get(trailer_page))
        .route("/api/movie/:id/trailers", get(movie_trailers))
        .route("/api/search", get(search))
        .route("/api/genres", get(genre_list))
        .route("/api/genre/:id", get(genre_movies))
        .route("/api/playback", post(open_playback))
        .route(
            "/api/playback/:sid",
            get(playback_state).delete(close_playback),
        )
        .route("/api/playback/:sid/toggle", post(toggle_playback))
        .route("/api/playback/:sid/fullscreen", post(fullscreen_playback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

const SWEEP_EVERY: Duration = Duration::from_secs(30);

/// Releases abandoned playback sessions for the life of the server.
async fn sweep_sessions(sessions: Arc<Mutex<SessionRegistry>>) {
    let mut interval = tokio::time::interval(SWEEP_EVERY);
    loop {
        interval.tick().await;
        let mut registry = sessions.lock().await;
        let released = registry.sweep();
        if released > 0 {
            info!(released, open = registry.len(), "Released stale playback sessions");
        }
    }
}

pub enum ApiError {
    Catalog(CatalogError),
    UnknownSession(u64),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Catalog(CatalogError::InvalidRequest(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Catalog(CatalogError::InvalidRequest(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Catalog(CatalogError::InvalidRequest(rejection.body_text()))
    }
}

// The stock extractors answer bad input with plain text; these keep the JSON error body.

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct Path<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
struct Query<T>(T);

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct JsonBody<T>(T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSession(sid) => {
                warn!("Unknown playback session {}", sid);
                (
                    StatusCode::NOT_FOUND,
                    "Playback session not found.".to_string(),
                )
            }
            ApiError::Catalog(err) => {
                let status = match &err {
                    CatalogError::NotFound(_) | CatalogError::EmptyResult(_) => {
                        StatusCode::NOT_FOUND
                    }
                    CatalogError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    CatalogError::MissingCredential(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    CatalogError::Network(_)
                    | CatalogError::Status { .. }
                    | CatalogError::Decode(_) => StatusCode::BAD_GATEWAY,
                };
                if status.is_server_error() {
                    error!("Catalog request failed: {}", err);
                } else {
                    warn!("Catalog request rejected: {}", err);
                }
                (status, err.user_message())
            }
        };
        (
            status,
            Json(json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// A summary with its image URLs resolved, ready for a card.
#[derive(Debug, Serialize)]
pub struct MovieCard {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub poster_url: String,
    pub backdrop_url: String,
    pub rating: String,
    pub year: Option<String>,
}

impl From<MovieSummary> for MovieCard {
    fn from(movie: MovieSummary) -> Self {
        Self {
            poster_url: images::poster(movie.poster_path.as_deref()),
            // The home hero shows the backdrop at card size, not full resolution.
            backdrop_url: images::image_url(movie.backdrop_path.as_deref(), images::POSTER_SIZE),
            rating: movie.rating_label(),
            year: movie.year().map(str::to_string),
            movie,
        }
    }
}

fn cards(movies: Vec<MovieSummary>) -> Vec<MovieCard> {
    movies.into_iter().map(MovieCard::from).collect()
}

#[derive(Debug, Serialize)]
pub struct PagedCards {
    pub results: Vec<MovieCard>,
    pub total_results: u32,
    pub pager: Pager,
}

impl PagedCards {
    /// Rejects a requested page past the total the response reports.
    fn checked(requested: u32, paged: Paged<MovieSummary>) -> CatalogResult<Self> {
        let pager = Pager::of(&paged);
        pager.check(requested)?;
        Ok(Self {
            results: cards(paged.results),
            total_results: paged.total_results,
            pager,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct HomeView {
    featured: Option<MovieCard>,
    rest: Vec<MovieCard>,
}

async fn home(State(state): State<AppState>) -> ApiResult<HomeView> {
    let mut movies = cards(state.tmdb.fetch_trending(TimeWindow::Week).await?).into_iter();
    let featured = movies.next();
    Ok(Json(HomeView {
        featured,
        rest: movies.collect(),
    }))
}

async fn trending(
    State(state): State<AppState>,
    Path(window): Path<String>,
) -> ApiResult<Vec<MovieCard>> {
    let window: TimeWindow = window.parse()?;
    Ok(Json(cards(state.tmdb.fetch_trending(window).await?)))
}

async fn listing(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<PagedCards> {
    let listing: Listing = name.parse()?;
    let page = query.page.unwrap_or(1);
    let results = state.tmdb.fetch_listing(listing, page).await?;
    Ok(Json(PagedCards::checked(page, results)?))
}

#[derive(Debug, Serialize)]
struct DetailView {
    #[serde(flatten)]
    detail: MovieDetail,
    poster_url: String,
    backdrop_url: String,
    rating: String,
    trailer_embed_url: Option<String>,
}

const CAST_SHOWN: usize = 8;
const SIMILAR_SHOWN: usize = 4;

async fn movie_detail(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<DetailView> {
    let mut detail = state.tmdb.fetch_movie_detail(id).await?;
    detail.cast = detail.top_cast(CAST_SHOWN).to_vec();
    detail.similar = detail.top_similar(SIMILAR_SHOWN).to_vec();
    let trailer_embed_url = trailer::select_trailer(&detail.videos).map(|v| images::embed_url(&v.key));
    Ok(Json(DetailView {
        poster_url: images::poster(detail.summary.poster_path.as_deref()),
        backdrop_url: images::backdrop(detail.summary.backdrop_path.as_deref()),
        rating: detail.summary.rating_label(),
        trailer_embed_url,
        detail,
    }))
}

#[derive(Debug, Serialize)]
struct TrailerPageView {
    movie: MovieDetail,
    trailer: Video,
    embed_url: String,
}

async fn trailer_page(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<TrailerPageView> {
    let page = state.tmdb.fetch_trailer_page(id).await?;
    Ok(Json(TrailerPageView {
        embed_url: images::embed_url(&page.trailer.key),
        movie: page.movie,
        trailer: page.trailer,
    }))
}

#[derive(Debug, Serialize)]
struct TrailersView {
    embed_url: String,
    trailers: Vec<Video>,
}

async fn movie_trailers(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<TrailersView> {
    let videos = state.tmdb.fetch_videos(id).await?;
    let found: Vec<Video> = trailer::trailers(&videos).into_iter().cloned().collect();
    let first = found
        .first()
        .ok_or_else(|| CatalogError::EmptyResult(NO_TRAILER.to_string()))?;
    Ok(Json(TrailersView {
        embed_url: images::embed_url(&first.key),
        trailers: found,
    }))
}

#[derive(Debug, Serialize)]
struct SearchView {
    query: String,
    #[serde(flatten)]
    page: PagedCards,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchView> {
    let q = query.q.unwrap_or_default().trim().to_string();
    let page = query.page.unwrap_or(1);
    let results = state.tmdb.search(&q, page).await?;
    Ok(Json(SearchView {
        query: q,
        page: PagedCards::checked(page, results)?,
    }))
}

async fn genre_list(State(state): State<AppState>) -> Json<Vec<Genre>> {
    Json(state.genres.all().to_vec())
}

#[derive(Debug, Serialize)]
struct GenreView {
    genre_id: u64,
    genre: Option<String>,
    #[serde(flatten)]
    page: PagedCards,
}

async fn genre_movies(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<GenreView> {
    let page = query.page.unwrap_or(1);
    let results = state.tmdb.fetch_by_genre(id, page).await?;
    Ok(Json(GenreView {
        genre_id: id,
        genre: state.genres.name_of(id).map(str::to_string),
        page: PagedCards::checked(page, results)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OpenPlayback {
    pub movie_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct FullscreenChange {
    pub fullscreen: bool,
}

#[derive(Debug, Serialize)]
struct PlaybackView {
    session_id: u64,
    clock: String,
    #[serde(flatten)]
    state: PlaybackState,
}

impl PlaybackView {
    fn new(session_id: u64, state: PlaybackState) -> Self {
        Self {
            session_id,
            clock: state.clock_label(),
            state,
        }
    }
}

async fn open_playback(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OpenPlayback>,
) -> Result<(StatusCode, Json<PlaybackView>), ApiError> {
    let session = PlaybackSession::open(state.tmdb.as_ref(), req.movie_id).await;
    let snapshot = session.snapshot();
    let sid = {
        let mut sessions = state.sessions.lock().await;
        sessions.sweep();
        sessions.insert(session)
    };
    info!(session_id = sid, movie_id = req.movie_id, phase = ?snapshot.phase, "Opened playback overlay");
    Ok((StatusCode::CREATED, Json(PlaybackView::new(sid, snapshot))))
}

async fn playback_state(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
) -> ApiResult<PlaybackView> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions.get_mut(sid).ok_or(ApiError::UnknownSession(sid))?;
    Ok(Json(PlaybackView::new(sid, session.snapshot())))
}

async fn toggle_playback(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
) -> ApiResult<PlaybackView> {
    let mut sessions = state.sessions.lock().await;
    let session = sessions.get_mut(sid).ok_or(ApiError::UnknownSession(sid))?;
    Ok(Json(PlaybackView::new(sid, session.toggle_play())))
}

async fn fullscreen_playback(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
    body: Bytes,
) -> ApiResult<PlaybackView> {
    // No body toggles; a body must be a valid resync.
    let change = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let change: FullscreenChange = serde_json::from_slice(&body).map_err(|e| {
            CatalogError::InvalidRequest(format!("invalid fullscreen body: {e}"))
        })?;
        Some(change)
    };
    let mut sessions = state.sessions.lock().await;
    let session = sessions.get_mut(sid).ok_or(ApiError::UnknownSession(sid))?;
    let snapshot = match change {
        Some(change) => session.sync_fullscreen(change.fullscreen),
        None => session.toggle_fullscreen(),
    };
    Ok(Json(PlaybackView::new(sid, snapshot)))
}

async fn close_playback(
    State(state): State<AppState>,
    Path(sid): Path<u64>,
) -> ApiResult<PlaybackView> {
    let mut session = state
        .sessions
        .lock()
        .await
        .remove(sid)
        .ok_or(ApiError::UnknownSession(sid))?;
    let snapshot = session.close();
    info!(session_id = sid, "Closed playback overlay");
    Ok(Json(PlaybackView::new(sid, snapshot)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
