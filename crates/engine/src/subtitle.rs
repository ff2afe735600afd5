//! Splits scene dialogue into timed subtitle chunks.
//!
//! Dialogue is cut into sentences, long sentences are regrouped at clause
//! marks, and the scene's frames (minus an end buffer) are shared between
//! chunks in proportion to their weight.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::speaker::SpeakerTags;

pub const DEFAULT_SHORT_SENTENCE_CHARS: usize = 25;
pub const DEFAULT_LONG_CHUNK_CHARS: usize = 30;
pub const DEFAULT_END_BUFFER_FRAMES: i64 = 15;
pub const DEFAULT_MIN_WEIGHT: f64 = 5.0;

/// Tuning for sentence splitting and chunk timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmenterConfig {
    pub speakers: SpeakerTags,
    pub sentence_terminals: Vec<char>,
    pub clause_separators: Vec<char>,
    /// Sentences shorter than this many chars are emitted whole.
    pub short_sentence_chars: usize,
    /// Upper bound for regrouped clause chunks.
    pub long_chunk_chars: usize,
    /// Frames left without subtitles at the end of each scene.
    pub end_buffer_frames: i64,
    pub min_weight: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            speakers: SpeakerTags::default(),
            sentence_terminals: vec!['。', '！', '？', '!', '?', '.'],
            clause_separators: vec!['、', '，', ','],
            short_sentence_chars: DEFAULT_SHORT_SENTENCE_CHARS,
            long_chunk_chars: DEFAULT_LONG_CHUNK_CHARS,
            end_buffer_frames: DEFAULT_END_BUFFER_FRAMES,
            min_weight: DEFAULT_MIN_WEIGHT,
        }
    }
}

/// One timed subtitle fragment, in frames local to its scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleChunk {
    pub text: String,
    pub start_frame: f64,
    pub end_frame: f64,
}

impl SubtitleChunk {
    pub fn duration_frames(&self) -> f64 {
        (self.end_frame - self.start_frame).max(0.0)
    }

    /// Returns true when `local_frame` falls in `[start_frame, end_frame)`.
    pub fn is_active_at(&self, local_frame: f64) -> bool {
        self.start_frame <= local_frame && local_frame < self.end_frame
    }

    /// Zero-length chunks are never displayed.
    pub fn is_degenerate(&self) -> bool {
        self.end_frame <= self.start_frame
    }
}

/// Finds the chunk displayed at `local_frame`.
///
/// `chunks` must be contiguous and ordered, as produced by the segmenter.
pub fn active_chunk(chunks: &[SubtitleChunk], local_frame: f64) -> Option<&SubtitleChunk> {
    let index = chunks.partition_point(|chunk| chunk.end_frame <= local_frame);
    chunks
        .get(index)
        .filter(|chunk| chunk.is_active_at(local_frame))
}

/// Weight of one chunk when sharing a scene's frames.
pub trait ChunkWeighting {
    fn weight(&self, text: &str) -> f64;
}

/// Weights chunks by character count with a floor for very short chunks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharCountWeighting {
    pub min_weight: f64,
}

impl Default for CharCountWeighting {
    fn default() -> Self {
        Self {
            min_weight: DEFAULT_MIN_WEIGHT,
        }
    }
}

impl ChunkWeighting for CharCountWeighting {
    fn weight(&self, text: &str) -> f64 {
        (text.chars().count() as f64).max(self.min_weight)
    }
}

/// Dialogue to subtitle chunk splitter.
#[derive(Debug, Clone)]
pub struct SubtitleSegmenter<W = CharCountWeighting> {
    config: SegmenterConfig,
    weighting: W,
}

impl SubtitleSegmenter {
    /// Creates a segmenter using character-count weighting.
    pub fn new(config: SegmenterConfig) -> Self {
        let weighting = CharCountWeighting {
            min_weight: config.min_weight,
        };
        Self { config, weighting }
    }
}

impl Default for SubtitleSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

impl<W> SubtitleSegmenter<W>
where
    W: ChunkWeighting,
{
    /// Creates a segmenter with a custom weighting function.
    pub fn with_weighting(config: SegmenterConfig, weighting: W) -> Self {
        Self { config, weighting }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Splits dialogue into chunk texts without timing.
    pub fn split_text(&self, dialogue: &str) -> Vec<String> {
        let body = self.config.speakers.strip(dialogue);
        let mut chunks = Vec::new();

        for sentence in split_after_marks(body, &self.config.sentence_terminals) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if sentence.chars().count() < self.config.short_sentence_chars {
                chunks.push(sentence.to_string());
                continue;
            }
            self.pack_clauses(sentence, &mut chunks);
        }

        chunks
    }

    /// Splits `dialogue` and times the chunks over `total_duration_frames`.
    ///
    /// # Example
    /// ```
    /// use engine::SubtitleSegmenter;
    ///
    /// let chunks = SubtitleSegmenter::default()
    ///     .segment("じぇんば:こんにちは。今日はいい天気ですね。", 300);
    ///
    /// assert_eq!(chunks.len(), 2);
    /// assert_eq!(chunks[0].text, "こんにちは。");
    /// assert_eq!(chunks[0].start_frame, 0.0);
    /// assert_eq!(chunks[0].end_frame, chunks[1].start_frame);
    /// assert!((chunks[1].end_frame - 285.0).abs() < 1e-9);
    /// ```
    pub fn segment(&self, dialogue: &str, total_duration_frames: i64) -> Vec<SubtitleChunk> {
        let texts = self.split_text(dialogue);
        if texts.is_empty() {
            return Vec::new();
        }

        let available = (total_duration_frames - self.config.end_buffer_frames).max(0);
        if available == 0 {
            warn!(
                total_duration_frames,
                end_buffer_frames = self.config.end_buffer_frames,
                chunk_count = texts.len(),
                "scene shorter than subtitle end buffer; chunks will not be shown"
            );
        }

        let chunks = self.assign_timing(texts, available as f64);
        debug!(
            total_duration_frames,
            available,
            chunk_count = chunks.len(),
            "dialogue segmented"
        );
        chunks
    }

    fn pack_clauses(&self, sentence: &str, chunks: &mut Vec<String>) {
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for fragment in split_after_marks(sentence, &self.config.clause_separators) {
            let fragment_chars = fragment.chars().count();
            if buffer_chars > 0 && buffer_chars + fragment_chars > self.config.long_chunk_chars {
                flush_chunk(&mut buffer, chunks);
                buffer_chars = 0;
            }
            buffer.push_str(fragment);
            buffer_chars += fragment_chars;
        }

        flush_chunk(&mut buffer, chunks);
    }

    fn assign_timing(&self, texts: Vec<String>, available: f64) -> Vec<SubtitleChunk> {
        let weights: Vec<f64> = texts
            .iter()
            .map(|text| {
                let weight = self.weighting.weight(text);
                if weight.is_finite() { weight.max(0.0) } else { 0.0 }
            })
            .collect();
        let total_weight = weights.iter().sum::<f64>().max(1.0);

        let mut cumulative = 0.0;
        let mut start_frame = 0.0;
        texts
            .into_iter()
            .zip(weights)
            .map(|(text, weight)| {
                cumulative += weight;
                let end_frame = (available * cumulative / total_weight).clamp(start_frame, available);
                let chunk = SubtitleChunk {
                    text,
                    start_frame,
                    end_frame,
                };
                start_frame = end_frame;
                chunk
            })
            .collect()
    }
}

/// Segments `dialogue` with the default configuration.
pub fn segment(dialogue: &str, total_duration_frames: i64) -> Vec<SubtitleChunk> {
    SubtitleSegmenter::default().segment(dialogue, total_duration_frames)
}

fn flush_chunk(buffer: &mut String, chunks: &mut Vec<String>) {
    let text = buffer.trim();
    if !text.is_empty() {
        chunks.push(text.to_string());
    }
    buffer.clear();
}

/// Splits after every run of `marks`, keeping the marks with the left piece.
///
/// A `.` between two ASCII digits is a decimal point, not a mark.
fn split_after_marks<'a>(text: &'a str, marks: &[char]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut previous = None;
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        let after_digit = previous.is_some_and(|prev: char| prev.is_ascii_digit());
        previous = Some(ch);
        if !marks.contains(&ch) {
            continue;
        }
        let before_digit = chars.peek().is_some_and(|&(_, next)| next.is_ascii_digit());
        if ch == '.' && after_digit && before_digit {
            continue;
        }
        let mut end = index + ch.len_utf8();
        while let Some(&(next_index, next)) = chars.peek() {
            if !marks.contains(&next) {
                break;
            }
            end = next_index + next.len_utf8();
            chars.next();
        }
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::{
        ChunkWeighting, SegmenterConfig, SubtitleChunk, SubtitleSegmenter, active_chunk, segment,
    };

    const EPS: f64 = 1e-9;

    #[test]
    fn greeting_dialogue_splits_into_two_proportional_chunks() {
        let chunks = segment("じぇんば:こんにちは。今日はいい天気ですね。", 300);

        assert_eq!(texts(&chunks), vec!["こんにちは。", "今日はいい天気ですね。"]);
        assert_eq!(chunks[0].start_frame, 0.0);
        assert!((chunks[0].end_frame - 285.0 * 6.0 / 17.0).abs() < EPS);
        assert_eq!(chunks[0].end_frame, chunks[1].start_frame);
        assert!((chunks[1].end_frame - 285.0).abs() < EPS);
        assert!(chunks[0].duration_frames() < chunks[1].duration_frames());
    }

    #[test]
    fn empty_or_prefix_only_dialogue_has_no_chunks() {
        assert!(segment("", 300).is_empty());
        assert!(segment("   ", 300).is_empty());
        assert!(segment("ずんだもん：", 300).is_empty());
    }

    #[test]
    fn long_sentence_is_regrouped_at_clause_marks() {
        let dialogue = "今日は朝から雨が降っていたので、傘を持って駅まで歩いていきましたが、途中で晴れてきたので、結局傘は使いませんでした。";

        let chunks = segment(dialogue, 600);

        assert_eq!(
            texts(&chunks),
            vec![
                "今日は朝から雨が降っていたので、",
                "傘を持って駅まで歩いていきましたが、途中で晴れてきたので、",
                "結局傘は使いませんでした。",
            ]
        );
        assert_eq!(texts(&chunks).concat(), dialogue);
    }

    #[test]
    fn text_without_terminal_punctuation_is_one_sentence() {
        let chunks = segment("句読点のない短い台詞", 90);

        assert_eq!(texts(&chunks), vec!["句読点のない短い台詞"]);
        assert!((chunks[0].end_frame - 75.0).abs() < EPS);
    }

    #[test]
    fn runs_of_terminal_marks_stay_with_their_sentence() {
        let chunks = segment("本当？！すごい。", 120);

        assert_eq!(texts(&chunks), vec!["本当？！", "すごい。"]);
    }

    #[test]
    fn whitespace_between_sentences_is_dropped_at_boundaries() {
        let chunks = segment("Host: Hello there. How are you?", 200);

        assert_eq!(texts(&chunks), vec!["Host: Hello there.", "How are you?"]);

        let mut config = SegmenterConfig::default();
        config.speakers = crate::SpeakerTags::new(["Host"]);
        let chunks = SubtitleSegmenter::new(config).segment("Host: Hello there. How are you?", 200);
        assert_eq!(texts(&chunks), vec!["Hello there.", "How are you?"]);
    }

    #[test]
    fn latin_dialogue_splits_at_periods_before_clause_packing() {
        let chunks = segment("Hello there. How are you doing today, my friend. Fine.", 300);

        assert_eq!(
            texts(&chunks),
            vec!["Hello there.", "How are you doing today,", "my friend.", "Fine."]
        );
        assert!((chunks[3].end_frame - 285.0).abs() < EPS);
    }

    #[test]
    fn decimal_points_and_ellipses_do_not_end_sentences() {
        let chunks = segment("売上は3.5倍です。Well... maybe.", 300);

        assert_eq!(texts(&chunks), vec!["売上は3.5倍です。", "Well...", "maybe."]);
    }

    #[test]
    fn last_chunk_ends_at_available_frames_when_min_weight_applies() {
        let chunks = segment("はい。ええ。そう。", 300);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!((chunk.duration_frames() - 95.0).abs() < EPS);
        }
        assert!((chunks[2].end_frame - 285.0).abs() < EPS);
        assert!(chunks.iter().all(|chunk| chunk.end_frame <= 285.0));
    }

    #[test]
    fn short_chunks_are_weighted_with_the_minimum_weight() {
        let chunks = segment("はい。そうですね、本当にそう思います。", 300);

        assert_eq!(texts(&chunks), vec!["はい。", "そうですね、本当にそう思います。"]);
        assert!((chunks[0].duration_frames() - 285.0 * 5.0 / 21.0).abs() < EPS);
        assert!((chunks[1].end_frame - 285.0).abs() < EPS);
    }

    #[test]
    fn chunks_are_contiguous_and_stay_inside_the_available_window() {
        let samples = [
            "じぇんば:まず最初に、今回のデータの概要を説明します。売上は前年比で十二パーセント増加し、特に第三四半期の伸びが顕著でした。",
            "ずんだもん：なるほど！それはすごいのだ。",
            "一文だけ",
        ];

        for dialogue in samples {
            let chunks = segment(dialogue, 240);
            assert!(!chunks.is_empty());
            assert_eq!(chunks[0].start_frame, 0.0);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end_frame, pair[1].start_frame);
            }
            let last = chunks.last().expect("at least one chunk");
            assert!(last.end_frame <= 225.0 + EPS);
            assert!(chunks.iter().all(|chunk| !chunk.text.is_empty()));
        }
    }

    #[test]
    fn concatenated_chunks_reproduce_stripped_dialogue() {
        let dialogue = "じぇんば:まず最初に、今回のデータの概要を説明します。売上は前年比で十二パーセント増加し、特に第三四半期の伸びが顕著でした。";

        let chunks = segment(dialogue, 400);

        assert_eq!(
            texts(&chunks).concat(),
            "まず最初に、今回のデータの概要を説明します。売上は前年比で十二パーセント増加し、特に第三四半期の伸びが顕著でした。"
        );
    }

    #[test]
    fn scene_shorter_than_end_buffer_yields_never_active_chunks() {
        let chunks = segment("こんにちは。さようなら。", 10);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(SubtitleChunk::is_degenerate));
        assert!(active_chunk(&chunks, 0.0).is_none());
        assert!(active_chunk(&chunks, 5.0).is_none());
    }

    #[test]
    fn active_chunk_uses_half_open_windows() {
        let chunks = segment("こんにちは。今日はいい天気ですね。", 300);
        let boundary = chunks[0].end_frame;

        assert_eq!(active_chunk(&chunks, 0.0).map(|c| c.text.as_str()), Some("こんにちは。"));
        assert_eq!(
            active_chunk(&chunks, boundary).map(|c| c.text.as_str()),
            Some("今日はいい天気ですね。")
        );
        assert!(active_chunk(&chunks, -1.0).is_none());
        assert!(active_chunk(&chunks, 285.0).is_none());
    }

    #[test]
    fn custom_weighting_replaces_character_counts() {
        struct Uniform;

        impl ChunkWeighting for Uniform {
            fn weight(&self, _text: &str) -> f64 {
                1.0
            }
        }

        let segmenter = SubtitleSegmenter::with_weighting(SegmenterConfig::default(), Uniform);
        let chunks = segmenter.segment("こんにちは。今日はいい天気ですね。", 215);

        assert!((chunks[0].duration_frames() - 100.0).abs() < EPS);
        assert!((chunks[1].duration_frames() - 100.0).abs() < EPS);
    }

    fn texts(chunks: &[SubtitleChunk]) -> Vec<&str> {
        chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }
}
