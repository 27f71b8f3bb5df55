//! URL builders for the image CDN and the embedded trailer player.

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
pub const POSTER_SIZE: &str = "w500";
pub const BACKDROP_SIZE: &str = "original";
pub const POSTER_PLACEHOLDER: &str = "https://via.placeholder.com/500x750?text=No+Image";
pub const BACKDROP_PLACEHOLDER: &str = "https://via.placeholder.com/1920x1080?text=No+Image";
const EMBED_BASE: &str = "https://www.youtube.com/embed";

pub fn image_url(path: Option<&str>, size: &str) -> String {
    cdn_url(path, size).unwrap_or_else(|| POSTER_PLACEHOLDER.to_string())
}

pub fn backdrop_url(path: Option<&str>, size: &str) -> String {
    cdn_url(path, size).unwrap_or_else(|| BACKDROP_PLACEHOLDER.to_string())
}

pub fn poster(path: Option<&str>) -> String {
    image_url(path, POSTER_SIZE)
}

pub fn backdrop(path: Option<&str>) -> String {
    backdrop_url(path, BACKDROP_SIZE)
}

/// Player URL for a YouTube video key, autoplay on.
pub fn embed_url(key: &str) -> String {
    format!("{EMBED_BASE}/{key}?autoplay=1")
}

fn cdn_url(path: Option<&str>, size: &str) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE}/{size}{p}"))
}
