use serde::{Deserialize, Serialize};

const SPEAKER_SEPARATORS: [char; 2] = [':', '：'];

/// Speaker tags recognized at the start of dialogue lines.
///
/// The default set holds the two roles the script generator writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeakerTags(Vec<String>);

impl SpeakerTags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            tags.into_iter()
                .map(Into::into)
                .filter(|tag: &String| !tag.trim().is_empty())
                .collect(),
        )
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    /// Splits a leading `tag:` prefix off `dialogue`.
    ///
    /// Returns the matched tag and the remaining text with surrounding
    /// whitespace removed. Text without a recognized prefix is returned
    /// unchanged with no tag.
    ///
    /// # Example
    /// ```
    /// use engine::SpeakerTags;
    ///
    /// let speakers = SpeakerTags::default();
    /// let (tag, body) = speakers.split("じぇんば：こんにちは。");
    /// assert_eq!(tag, Some("じぇんば"));
    /// assert_eq!(body, "こんにちは。");
    /// ```
    pub fn split<'s, 'd>(&'s self, dialogue: &'d str) -> (Option<&'s str>, &'d str) {
        let trimmed = dialogue.trim_start();
        for tag in &self.0 {
            let Some(rest) = trimmed.strip_prefix(tag.as_str()) else {
                continue;
            };
            let Some(body) = rest.trim_start().strip_prefix(SPEAKER_SEPARATORS) else {
                continue;
            };
            return (Some(tag.as_str()), body.trim());
        }
        (None, dialogue)
    }

    /// Returns `dialogue` without its speaker prefix.
    pub fn strip<'d>(&self, dialogue: &'d str) -> &'d str {
        self.split(dialogue).1
    }
}

impl Default for SpeakerTags {
    fn default() -> Self {
        Self::new(["じぇんば", "ずんだもん"])
    }
}
