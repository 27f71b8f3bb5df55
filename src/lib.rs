pub mod app;
pub mod config;
pub mod error;
pub mod genres;
pub mod images;
pub mod models;
pub mod pagination;
pub mod playback;
pub mod tmdb;
pub mod trailer;
