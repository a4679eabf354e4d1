use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{Artist, RecommendationSummary};

/// Consider cache stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// The last search the user ran, restored on the search page at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSearch {
    pub query: String,
    pub artists: Vec<Artist>,
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.cache_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove cache file: {}", name)),
        }
    }

    /// Hex keeps the file name one-to-one with the id and free of separators.
    fn recommendations_name(artist_id: &str) -> String {
        format!("recs_{}", hex::encode(artist_id))
    }

    // ===== Recommendations =====

    pub fn load_recommendations(
        &self,
        artist_id: &str,
    ) -> Result<Option<CachedData<RecommendationSummary>>> {
        let cached: Option<CachedData<RecommendationSummary>> =
            self.load(&Self::recommendations_name(artist_id))?;
        match cached {
            Some(cached) if cached.data.artist_id != artist_id => {
                debug!(
                    artist_id,
                    cached_for = %cached.data.artist_id,
                    "Ignoring cached recommendations for another artist"
                );
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn save_recommendations(&self, summary: &RecommendationSummary) -> Result<()> {
        self.save(&Self::recommendations_name(&summary.artist_id), summary)
    }

    // ===== Last search =====

    pub fn load_last_search(&self) -> Result<Option<CachedData<LastSearch>>> {
        self.load("last_search")
    }

    pub fn save_last_search(&self, query: &str, artists: &[Artist]) -> Result<()> {
        let search = LastSearch {
            query: query.to_string(),
            artists: artists.to_vec(),
        };
        self.save("last_search", &search)
    }

    /// Drop every cached summary, e.g. after logout.
    pub fn clear_recommendations(&self) -> Result<()> {
        let entries = std::fs::read_dir(&self.cache_dir)
            .with_context(|| format!("Failed to list cache dir: {}", self.cache_dir.display()))?;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_prefix("recs_").and_then(|n| n.strip_suffix(".json")) {
                self.remove(&format!("recs_{}", stem))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(artist_id: &str) -> RecommendationSummary {
        RecommendationSummary {
            artist_id: artist_id.to_string(),
            summary: "Lately deep in 70s soul.".to_string(),
            recommendations: Vec::new(),
            generated_at: None,
        }
    }

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_age_display_rounding() {
        let mut cached = CachedData::new(());
        cached.cached_at = Utc::now() - Duration::minutes(15);
        assert_eq!(cached.age_display(), "15m ago");

        cached.cached_at = Utc::now() - Duration::minutes(95);
        assert_eq!(cached.age_display(), "2h ago");

        cached.cached_at = Utc::now() - Duration::hours(25);
        assert_eq!(cached.age_display(), "1d ago");

        cached.cached_at = Utc::now() + Duration::minutes(10);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_cached_data_is_stale() {
        let fresh = CachedData::new(vec![1]);
        assert!(!fresh.is_stale());

        let mut old = CachedData::new(vec![1]);
        old.cached_at = Utc::now() - Duration::minutes(61);
        assert!(old.is_stale());
    }

    #[test]
    fn test_recommendations_per_artist() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();

        assert!(cache.load_recommendations("42").unwrap().is_none());

        cache.save_recommendations(&summary("42")).unwrap();
        let cached = cache.load_recommendations("42").unwrap().unwrap();
        assert_eq!(cached.data, summary("42"));
        assert!(cache.load_recommendations("7").unwrap().is_none());
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_artist_id_cannot_escape_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();

        cache.save_recommendations(&summary("../../etc/x")).unwrap();
        assert!(cache.load_recommendations("../../etc/x").unwrap().is_some());

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec![format!("recs_{}.json", hex::encode("../../etc/x"))]);
    }

    #[test]
    fn test_similar_ids_do_not_share_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache.save_recommendations(&summary("spotify:artist:1")).unwrap();

        assert!(cache.load_recommendations("spotify_artist_1").unwrap().is_none());
        let cached = cache.load_recommendations("spotify:artist:1").unwrap().unwrap();
        assert_eq!(cached.data.artist_id, "spotify:artist:1");
    }

    #[test]
    fn test_entry_for_another_artist_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache.save_recommendations(&summary("7")).unwrap();
        std::fs::rename(
            dir.path().join(format!("{}.json", CacheManager::recommendations_name("7"))),
            dir.path().join(format!("{}.json", CacheManager::recommendations_name("42"))),
        )
        .unwrap();

        assert!(cache.load_recommendations("42").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        let name = format!("{}.json", CacheManager::recommendations_name("42"));
        std::fs::write(dir.path().join(name), "garbage").unwrap();

        assert!(cache.load_recommendations("42").is_err());
    }

    #[test]
    fn test_clear_recommendations_keeps_last_search() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path().to_path_buf()).unwrap();
        cache.save_recommendations(&summary("1")).unwrap();
        cache.save_recommendations(&summary("2")).unwrap();
        cache.save_last_search("phoebe", &[]).unwrap();

        cache.clear_recommendations().unwrap();
        assert!(cache.load_recommendations("1").unwrap().is_none());
        assert!(cache.load_recommendations("2").unwrap().is_none());
        assert_eq!(cache.load_last_search().unwrap().unwrap().data.query, "phoebe");
    }
}
