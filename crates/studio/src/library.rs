use project::MediaCache;
use providers::{AudioSearch, GeneratedVideo, ProviderError, SoundSearchResult};
use std::sync::Arc;
use std::time::Duration;
use timeline::{MediaType, Seconds, TimelineItem, TrackId};

pub const SEARCH_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_SEARCH_LIMIT: usize = 15;
const FALLBACK_CLIP_SECS: Seconds = 5.0;

/// Audio search with results cached on disk.
pub struct MediaLibrary {
    search: Arc<dyn AudioSearch>,
    cache: Option<Arc<MediaCache>>,
    limit: usize,
}

impl MediaLibrary {
    pub fn new(search: Arc<dyn AudioSearch>) -> Self {
        Self {
            search,
            cache: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_cache(mut self, cache: Arc<MediaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SoundSearchResult>, ProviderError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let key = format!("search:{normalized}");

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get::<Vec<SoundSearchResult>>(&key) {
                tracing::debug!(target: "library", query = %normalized, "search cache hit");
                return Ok(hit);
            }
        }

        let results = self.search.search(&normalized, self.limit).await?;
        tracing::info!(
            target: "library",
            provider = self.search.name(),
            query = %normalized,
            results = results.len(),
            "audio search"
        );
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put_with_ttl(&key, &results, SEARCH_CACHE_TTL) {
                tracing::warn!(target: "library", error = %err, "could not cache search results");
            }
        }
        Ok(results)
    }
}

fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn search_result_to_item(
    result: &SoundSearchResult,
    track: impl Into<TrackId>,
    start: Seconds,
) -> TimelineItem {
    let duration = if result.duration > 0.0 {
        result.duration
    } else {
        FALLBACK_CLIP_SECS
    };
    let item = TimelineItem::new(track, MediaType::Audio, result.name.clone(), start, duration);
    match &result.preview_url {
        Some(url) => item.with_src(url.clone()),
        None => item,
    }
}

pub fn generated_video_item(
    video: &GeneratedVideo,
    name: impl Into<String>,
    track: impl Into<TrackId>,
    start: Seconds,
) -> TimelineItem {
    let duration = if video.duration_secs > 0.0 {
        video.duration_secs
    } else {
        FALLBACK_CLIP_SECS
    };
    TimelineItem::new(track, MediaType::Video, name, start, duration).with_src(video.url.clone())
}
