//! Query the movie catalog from a terminal and print what the server would serve.
//! Usage:
//!   cargo run --bin catalog_probe -- trending <day|week>
//!   cargo run --bin catalog_probe -- movie <tmdb_id>
//!   cargo run --bin catalog_probe -- search <query> [page]
//!   cargo run --bin catalog_probe -- genre <genre_id> [page]
//!   cargo run --bin catalog_probe -- genres
//!   cargo run --bin catalog_probe -- trailer <tmdb_id>
//!   cargo run --bin catalog_probe -- play <tmdb_id> [seconds]
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use moviedeck::config::Config;
use moviedeck::images;
use moviedeck::models::MovieSummary;
use moviedeck::pagination::Pager;
use moviedeck::playback::PlaybackSession;
use moviedeck::tmdb::{TimeWindow, TmdbApi, TmdbClient};
use moviedeck::trailer::{select_trailer, NO_TRAILER};
use serde_json::json;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Trending,
    Movie,
    Search,
    Genre,
    Genres,
    Trailer,
    Play,
}

impl FromStr for Command {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trending" => Ok(Command::Trending),
            "movie" => Ok(Command::Movie),
            "search" => Ok(Command::Search),
            "genre" => Ok(Command::Genre),
            "genres" => Ok(Command::Genres),
            "trailer" => Ok(Command::Trailer),
            "play" => Ok(Command::Play),
            other => Err(anyhow!("unknown command '{}'", other)),
        }
    }
}

fn arg<T: FromStr>(args: &[String], idx: usize, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(idx)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))?;
    raw.parse()
        .map_err(|e| anyhow!("invalid <{}> '{}': {}", name, raw, e))
}

fn titles(movies: &[MovieSummary]) -> Vec<&str> {
    movies.iter().map(|m| m.title.as_str()).collect()
}

fn opt_arg<T: FromStr>(args: &[String], idx: usize, default: T) -> T {
    args.get(idx).and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;
    let client = TmdbClient::from_config(&config).context("building TMDB client")?;

    let args: Vec<String> = env::args().skip(1).collect();
    let command: Command = arg(&args, 0, "command")?;

    let output = match command {
        Command::Trending => {
            let window: TimeWindow = opt_arg(&args, 1, TimeWindow::Week);
            let movies = client.fetch_trending(window).await?;
            json!(movies
                .iter()
                .map(|m| json!({
                    "id": m.id,
                    "title": m.title,
                    "rating": m.rating_label(),
                    "year": m.year(),
                    "poster": images::poster(m.poster_path.as_deref()),
                }))
                .collect::<Vec<_>>())
        }
        Command::Movie => {
            let id: u64 = arg(&args, 1, "tmdb_id")?;
            let detail = client.fetch_movie_detail(id).await?;
            json!({
                "id": detail.summary.id,
                "title": detail.summary.title,
                "runtime": detail.runtime,
                "duration_seconds": detail.duration_seconds(),
                "genres": detail.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
                "cast": detail.top_cast(8).iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "similar": detail.top_similar(4).iter().map(|m| m.title.as_str()).collect::<Vec<_>>(),
                "backdrop": images::backdrop(detail.summary.backdrop_path.as_deref()),
                "trailer": select_trailer(&detail.videos).map(|v| images::embed_url(&v.key)),
            })
        }
        Command::Search => {
            let query: String = arg(&args, 1, "query")?;
            let page = opt_arg(&args, 2, 1u32);
            let results = client.search(&query, page).await?;
            let pager = Pager::of(&results);
            json!({
                "pager": pager,
                "titles": titles(&results.results),
                "prev": pager.prev().map(|p| format!("search {query} {}", p.page)),
                "next": pager.next().map(|p| format!("search {query} {}", p.page)),
            })
        }
        Command::Genre => {
            let id: u64 = arg(&args, 1, "genre_id")?;
            let page = opt_arg(&args, 2, 1u32);
            let results = client.fetch_by_genre(id, page).await?;
            let pager = Pager::of(&results);
            json!({
                "pager": pager,
                "titles": titles(&results.results),
                "prev": pager.prev().map(|p| format!("genre {id} {}", p.page)),
                "next": pager.next().map(|p| format!("genre {id} {}", p.page)),
            })
        }
        Command::Genres => json!(client.fetch_genres().await?),
        Command::Trailer => {
            let id: u64 = arg(&args, 1, "tmdb_id")?;
            let videos = client.fetch_videos(id).await?;
            match select_trailer(&videos) {
                Some(v) => json!({ "name": v.name, "embed": images::embed_url(&v.key) }),
                None => json!({ "message": NO_TRAILER }),
            }
        }
        Command::Play => {
            let id: u64 = arg(&args, 1, "tmdb_id")?;
            let seconds = opt_arg(&args, 2, 5u64);
            let session = PlaybackSession::open(&client, id).await;
            let mut rx = session.subscribe();
            let deadline = tokio::time::sleep(Duration::from_secs(seconds));
            tokio::pin!(deadline);
            while session.snapshot().is_ticking() {
                tokio::select! {
                    _ = &mut deadline => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow_and_update().clone();
                        println!("{} {:>6.2}% {:?}", state.clock_label(), state.progress, state.phase);
                    }
                }
            }
            json!(session.snapshot())
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
