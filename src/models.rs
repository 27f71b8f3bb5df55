use serde::{Deserialize, Serialize};

/// One entry of a list, search or discover response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub release_date: String,
}

impl MovieSummary {
    /// Vote average the way cards print it, one decimal.
    pub fn rating_label(&self) -> String {
        format!("{:.1}", self.vote_average)
    }

    pub fn year(&self) -> Option<&str> {
        self.release_date
            .split('-')
            .next()
            .filter(|y| y.len() == 4)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub character: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionCompany {
    pub id: u64,
    pub name: String,
    pub logo_path: Option<String>,
}

/// Paginated response shape shared by discover, search and the listing rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Paged<T> {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            results: Vec::new(),
            total_pages: 0,
            total_results: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub summary: MovieSummary,
    /// Minutes. TMDB leaves this null for unreleased titles.
    pub runtime: Option<u32>,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_companies: Vec<ProductionCompany>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub similar: Vec<MovieSummary>,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl MovieDetail {
    pub fn runtime_minutes(&self) -> u32 {
        self.runtime.unwrap_or(0)
    }

    /// Runtime in seconds, `None` when the minutes do not fit.
    pub fn duration_seconds(&self) -> Option<u32> {
        self.runtime_minutes().checked_mul(60)
    }

    pub fn top_cast(&self, n: usize) -> &[CastMember] {
        &self.cast[..self.cast.len().min(n)]
    }

    pub fn top_similar(&self, n: usize) -> &[MovieSummary] {
        &self.similar[..self.similar.len().min(n)]
    }
}

/// What the standalone trailer page shows: the movie plus the picked trailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailerPage {
    pub movie: MovieDetail,
    pub trailer: Video,
}
