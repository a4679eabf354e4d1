use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl Artist {
    /// Genres joined for a one-line display, or a placeholder.
    pub fn genre_line(&self) -> String {
        if self.genres.is_empty() {
            "Unknown genre".to_string()
        } else {
            self.genres.join(", ")
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistSearchResponse {
    #[serde(default)]
    pub artists: Vec<Artist>,
}

/// One track or artist the summary says the artist is listening to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "artistName")]
    pub artist_name: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Recommendation {
    pub fn title(&self) -> String {
        match self.track {
            Some(ref track) => format!("{} - {}", self.artist_name, track),
            None => self.artist_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSummary {
    #[serde(rename = "artistId")]
    pub artist_id: String,
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(rename = "generatedAt", default)]
    pub generated_at: Option<DateTime<Utc>>,
}
