use serde::{Deserialize, Serialize};

pub const DEFAULT_SONG_TITLE: &str = "Unknown Title";
pub const DEFAULT_SONG_TRANSLATION: &str = "No translation available.";

/// One system instruction plus one piece of user content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_input: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_input: user_input.into(),
        }
    }
}

/// Unparsed message body returned by a completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletionPayload {
    pub text: String,
}

impl RawCompletionPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Which response shape the caller asked the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    TopicQa,
    SongTranslation,
}

impl Schema {
    pub fn label(&self) -> &'static str {
        match self {
            Schema::TopicQa => "topic",
            Schema::SongTranslation => "song",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicQa {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub technical_terms: Vec<String>,
    pub descriptions: Vec<String>,
}

impl TopicQa {
    pub fn has_questions_and_answers(&self) -> bool {
        !self.questions.is_empty() && !self.answers.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabEntry {
    #[serde(rename = "Original Word", alias = "original_word", default)]
    pub original_word: String,
    #[serde(rename = "English Translation", alias = "english_translation", default)]
    pub english_translation: String,
    #[serde(rename = "Synonym (Japanese)", alias = "synonym_japanese", default)]
    pub synonym_japanese: String,
    #[serde(rename = "Description (Japanese)", alias = "description_japanese", default)]
    pub description_japanese: String,
    #[serde(rename = "Description (English)", alias = "description_english", default)]
    pub description_english: String,
}

impl VocabEntry {
    /// Column headers in display order, matching the serialized keys.
    pub const COLUMNS: [&'static str; 5] = [
        "Original Word",
        "English Translation",
        "Synonym (Japanese)",
        "Description (Japanese)",
        "Description (English)",
    ];

    pub fn cells(&self) -> [&str; 5] {
        [
            &self.original_word,
            &self.english_translation,
            &self.synonym_japanese,
            &self.description_japanese,
            &self.description_english,
        ]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SongTranslation {
    pub song_title: String,
    pub song_translation: String,
    pub vocabulary: Vec<VocabEntry>,
}

impl Default for SongTranslation {
    fn default() -> Self {
        Self {
            song_title: DEFAULT_SONG_TITLE.to_string(),
            song_translation: DEFAULT_SONG_TRANSLATION.to_string(),
            vocabulary: Vec::new(),
        }
    }
}

/// Serializes to the same JSON shape the prompts ask the model for.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NormalizedResult {
    TopicQa(TopicQa),
    SongTranslation(SongTranslation),
}

impl NormalizedResult {
    pub fn schema(&self) -> Schema {
        match self {
            NormalizedResult::TopicQa(_) => Schema::TopicQa,
            NormalizedResult::SongTranslation(_) => Schema::SongTranslation,
        }
    }

    pub fn into_topic(self) -> Option<TopicQa> {
        match self {
            NormalizedResult::TopicQa(topic) => Some(topic),
            NormalizedResult::SongTranslation(_) => None,
        }
    }

    pub fn into_song(self) -> Option<SongTranslation> {
        match self {
            NormalizedResult::SongTranslation(song) => Some(song),
            NormalizedResult::TopicQa(_) => None,
        }
    }
}

/// Result of the per-term description call for one technical term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDescription {
    pub term: String,
    pub outcome: Result<String, String>,
}

impl TermDescription {
    /// Text for the description column; failures are shown in place.
    pub fn display_text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(reason) => format!("(lookup failed: {})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_default_uses_documented_strings() {
        let song = SongTranslation::default();
        assert_eq!(song.song_title, "Unknown Title");
        assert_eq!(song.song_translation, "No translation available.");
        assert!(song.vocabulary.is_empty());
    }

    #[test]
    fn vocab_entry_serializes_with_prompt_keys() {
        let entry = VocabEntry {
            original_word: "花".to_string(),
            english_translation: "flower".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["Original Word"], "花");
        assert_eq!(json["English Translation"], "flower");
        assert_eq!(json["Description (English)"], "");
    }

    #[test]
    fn normalized_result_serializes_untagged() {
        let result = NormalizedResult::TopicQa(TopicQa {
            questions: vec!["Q?".to_string()],
            ..Default::default()
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["questions"][0], "Q?");
        assert!(json.get("TopicQa").is_none());
    }

    #[test]
    fn failed_term_lookup_display_text() {
        let desc = TermDescription {
            term: "Rust".to_string(),
            outcome: Err("HTTP 500".to_string()),
        };
        assert_eq!(desc.display_text(), "(lookup failed: HTTP 500)");
    }
}
