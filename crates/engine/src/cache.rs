use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::subtitle::SubtitleChunk;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubtitleCacheKey {
    dialogue: String,
    total_duration_frames: i64,
}

/// LRU cache of segmented dialogue keyed by text and scene length in frames.
///
/// Entries are only valid for one segmenter configuration; call
/// [`SubtitleCache::clear`] when it changes.
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use engine::cache::SubtitleCache;
/// use engine::segment;
///
/// let mut cache = SubtitleCache::new(8);
/// cache.insert("こんにちは。", 90, Arc::from(segment("こんにちは。", 90)));
///
/// assert!(cache.get("こんにちは。", 90).is_some());
/// assert!(cache.get("こんにちは。", 120).is_none());
/// ```
#[derive(Debug)]
pub struct SubtitleCache {
    capacity: usize,
    entries: HashMap<SubtitleCacheKey, Arc<[SubtitleChunk]>>,
    lru_order: VecDeque<SubtitleCacheKey>,
}

impl SubtitleCache {
    /// Creates a subtitle cache.
    ///
    /// `capacity` must be positive.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "subtitle cache capacity must be positive");
        Self {
            capacity,
            entries: HashMap::new(),
            lru_order: VecDeque::new(),
        }
    }

    /// Clears all cached chunk lists.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru_order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns one cached chunk list and marks it as recently used.
    pub fn get(&mut self, dialogue: &str, total_duration_frames: i64) -> Option<Arc<[SubtitleChunk]>> {
        let key = make_key(dialogue, total_duration_frames);
        let chunks = Arc::clone(self.entries.get(&key)?);
        self.touch(&key);
        Some(chunks)
    }

    /// Inserts or updates one cached chunk list.
    pub fn insert(
        &mut self,
        dialogue: &str,
        total_duration_frames: i64,
        chunks: Arc<[SubtitleChunk]>,
    ) {
        let key = make_key(dialogue, total_duration_frames);
        self.entries.insert(key.clone(), chunks);
        self.touch(&key);
        self.evict_if_needed();
    }

    fn touch(&mut self, key: &SubtitleCacheKey) {
        if let Some(index) = self.lru_order.iter().position(|existing| existing == key) {
            let _ = self.lru_order.remove(index);
        }
        self.lru_order.push_back(key.clone());
    }

    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.lru_order.pop_front() else {
                break;
            };
            let _ = self.entries.remove(&oldest);
        }
    }
}

fn make_key(dialogue: &str, total_duration_frames: i64) -> SubtitleCacheKey {
    SubtitleCacheKey {
        dialogue: dialogue.to_string(),
        total_duration_frames,
    }
}
