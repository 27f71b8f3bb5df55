//! Genre reference data, loaded once and read for the rest of the process.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::models::Genre;
use crate::tmdb::TmdbApi;

static GENRES: OnceCell<GenreCatalog> = OnceCell::new();

#[derive(Debug, Clone, Default)]
pub struct GenreCatalog {
    genres: Vec<Genre>,
}

impl GenreCatalog {
    pub fn new(genres: Vec<Genre>) -> Self {
        Self { genres }
    }

    /// Fetches the list; on failure the catalog is empty and the app carries on.
    pub async fn load(tmdb: &dyn TmdbApi) -> Self {
        match tmdb.fetch_genres().await {
            Ok(genres) => {
                info!("Loaded {} genres", genres.len());
                Self::new(genres)
            }
            Err(e) => {
                warn!("Failed to fetch genres, continuing without them: {}", e);
                Self::default()
            }
        }
    }

    pub fn all(&self) -> &[Genre] {
        &self.genres
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.genres
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }
}

/// Makes `catalog` the process-wide genre list. Only the first call succeeds.
pub fn install(catalog: GenreCatalog) -> Result<()> {
    GENRES
        .set(catalog)
        .map_err(|_| anyhow!("genre catalog already installed"))
}

pub fn installed() -> Option<&'static GenreCatalog> {
    GENRES.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> GenreCatalog {
        GenreCatalog::new(vec![
            Genre {
                id: 28,
                name: "Action".into(),
            },
            Genre {
                id: 35,
                name: "Comedy".into(),
            },
        ])
    }

    #[test]
    fn looks_up_names_by_id() {
        let c = catalog();
        assert_eq!(c.name_of(35), Some("Comedy"));
        assert_eq!(c.name_of(99), None);
        assert_eq!(c.all()[0].name, "Action");
        assert!(!c.is_empty());
        assert!(GenreCatalog::default().is_empty());
    }

    #[test]
    fn installs_only_once() {
        install(catalog()).unwrap();
        assert!(install(GenreCatalog::default()).is_err());
        assert_eq!(installed().map(|c| c.all().len()), Some(2));
    }
}
