use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::types::llm_data::{
    NormalizedResult, RawCompletionPayload, Schema, SongTranslation, TopicQa, VocabEntry,
    DEFAULT_SONG_TITLE, DEFAULT_SONG_TRANSLATION,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("response is not valid JSON: {0}")]
    Malformed(String),
}

/// Capitalized word followed by zero or more lowercase letters.
fn capitalized_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]*\b").expect("static regex is valid"))
}

/// Turns a completion body into the structured record for `schema`.
///
/// Only an undecodable body (or one that is not a JSON object) fails. Every
/// missing or mistyped field falls back to its default so that a partially
/// compliant answer still renders.
pub fn normalize(
    raw: &RawCompletionPayload,
    schema: Schema,
) -> Result<NormalizedResult, ParseFailure> {
    Ok(match schema {
        Schema::TopicQa => NormalizedResult::TopicQa(normalize_topic(raw)?),
        Schema::SongTranslation => NormalizedResult::SongTranslation(normalize_song(raw)?),
    })
}

/// [`normalize`] for a topic request, without the schema wrapper.
pub(crate) fn normalize_topic(raw: &RawCompletionPayload) -> Result<TopicQa, ParseFailure> {
    decode_object(raw, Schema::TopicQa).map(|object| topic_from_object(&object))
}

/// [`normalize`] for a song request, without the schema wrapper.
pub(crate) fn normalize_song(raw: &RawCompletionPayload) -> Result<SongTranslation, ParseFailure> {
    decode_object(raw, Schema::SongTranslation).map(|object| song_from_object(&object))
}

fn decode_object(
    raw: &RawCompletionPayload,
    schema: Schema,
) -> Result<Map<String, Value>, ParseFailure> {
    tracing::debug!(
        schema = schema.label(),
        bytes = raw.text.len(),
        "normalizing completion payload"
    );

    let body = strip_code_fence(&raw.text);
    let document: Value =
        serde_json::from_str(body).map_err(|e| ParseFailure::Malformed(e.to_string()))?;

    match document {
        Value::Object(map) => Ok(map),
        other => Err(ParseFailure::Malformed(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Scans the texts for capitalized tokens, returning them deduplicated and
/// sorted. A lexical heuristic, not an entity extractor.
pub fn extract_capitalized_terms<I, S>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let re = capitalized_word_re();
    let mut terms = BTreeSet::new();
    for text in texts {
        for m in re.find_iter(text.as_ref()) {
            terms.insert(m.as_str().to_string());
        }
    }
    terms.into_iter().collect()
}

fn topic_from_object(object: &Map<String, Value>) -> TopicQa {
    let questions = string_list(object, "questions");
    let answers = string_list(object, "answers");
    let model_terms = string_list(object, "technical_terms");
    let model_descriptions = string_list(object, "descriptions");

    if model_terms.len() != model_descriptions.len() {
        tracing::warn!(
            terms = model_terms.len(),
            descriptions = model_descriptions.len(),
            "technical term and description counts differ; padding with empty descriptions"
        );
    }

    // First description wins when the model repeats a term.
    let mut described: BTreeMap<String, String> = BTreeMap::new();
    for (idx, term) in model_terms.iter().enumerate() {
        if term.trim().is_empty() {
            continue;
        }
        let description = model_descriptions.get(idx).cloned().unwrap_or_default();
        described.entry(term.clone()).or_insert(description);
    }

    let (technical_terms, descriptions) = if !questions.is_empty() && !answers.is_empty() {
        // The heuristic set replaces whatever list the model returned.
        let terms = extract_capitalized_terms(questions.iter().chain(answers.iter()));
        let descriptions: Vec<String> = terms
            .iter()
            .map(|term| described.get(term).cloned().unwrap_or_default())
            .collect();
        (terms, descriptions)
    } else {
        described.into_iter().unzip()
    };

    TopicQa {
        questions,
        answers,
        technical_terms,
        descriptions,
    }
}

fn song_from_object(object: &Map<String, Value>) -> SongTranslation {
    let vocabulary = match object.get("vocabulary") {
        Some(Value::Array(items)) => items.iter().filter_map(vocab_entry).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(found = json_kind(other), "vocabulary is not an array; ignoring it");
            Vec::new()
        }
    };

    SongTranslation {
        song_title: scalar_string(object, "song_title", DEFAULT_SONG_TITLE),
        song_translation: scalar_string(object, "song_translation", DEFAULT_SONG_TRANSLATION),
        vocabulary,
    }
}

fn vocab_entry(value: &Value) -> Option<VocabEntry> {
    match value {
        Value::Object(map) => Some(VocabEntry {
            original_word: vocab_field(map, "Original Word", "original_word"),
            english_translation: vocab_field(map, "English Translation", "english_translation"),
            synonym_japanese: vocab_field(map, "Synonym (Japanese)", "synonym_japanese"),
            description_japanese: vocab_field(map, "Description (Japanese)", "description_japanese"),
            description_english: vocab_field(map, "Description (English)", "description_english"),
        }),
        Value::String(word) => Some(VocabEntry {
            original_word: word.clone(),
            ..Default::default()
        }),
        other => {
            tracing::warn!(found = json_kind(other), "skipping vocabulary entry that is not an object");
            None
        }
    }
}

fn vocab_field(map: &Map<String, Value>, key: &str, alias: &str) -> String {
    map.get(key)
        .or_else(|| map.get(alias))
        .map(value_text)
        .unwrap_or_default()
}

fn string_list(object: &Map<String, Value>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items.iter().map(value_text).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(key, found = json_kind(other), "expected an array; using an empty list");
            Vec::new()
        }
    }
}

fn scalar_string(object: &Map<String, Value>, key: &str, default: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(value @ (Value::Bool(_) | Value::Number(_))) => value.to_string(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => {
            tracing::warn!(key, found = json_kind(other), "expected a string; using the default");
            default.to_string()
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Removes one enclosing markdown fence (```json ... ```), if present.
///
/// A language tag is only dropped when whitespace separates it from the body,
/// so a body that starts right after the backticks is left intact.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    let tag_len = inner
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(inner.len());
    match inner[tag_len..].chars().next() {
        Some(c) if tag_len > 0 && c.is_whitespace() => inner[tag_len..].trim(),
        _ => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic(text: &str) -> TopicQa {
        normalize(&RawCompletionPayload::new(text), Schema::TopicQa)
            .expect("payload should normalize")
            .into_topic()
            .expect("topic variant")
    }

    fn song(text: &str) -> SongTranslation {
        normalize(&RawCompletionPayload::new(text), Schema::SongTranslation)
            .expect("payload should normalize")
            .into_song()
            .expect("song variant")
    }

    #[test]
    fn capitalized_terms_are_sorted_and_deduplicated() {
        let terms = extract_capitalized_terms(["Is Tokyo big?", "Tokyo is the capital of Japan."]);
        assert_eq!(terms, vec!["Is", "Japan", "Tokyo"]);
    }

    #[test]
    fn capitalized_terms_ignore_mixed_case_words() {
        // "McDonald" and "HTTP" have no word boundary after the lowercase run.
        let terms = extract_capitalized_terms(["McDonald serves HTTP to A user in Tokyo's west"]);
        assert_eq!(terms, vec!["A", "Tokyo"]);
    }

    #[test]
    fn capitalized_terms_empty_for_lowercase_text() {
        let terms = extract_capitalized_terms(["nothing capitalized here"]);
        assert!(terms.is_empty());
    }

    #[test]
    fn heuristic_replaces_model_terms_when_text_present() {
        let payload = json!({
            "questions": ["What is Rust?"],
            "answers": ["A language from Mozilla."],
            "technical_terms": ["ownership", "Rust"],
            "descriptions": ["memory model", "a systems language"]
        });
        let result = topic(&payload.to_string());
        assert_eq!(result.technical_terms, vec!["A", "Mozilla", "Rust", "What"]);
        assert_eq!(result.descriptions, vec!["", "", "a systems language", ""]);
    }

    #[test]
    fn model_terms_used_when_questions_missing() {
        let payload = json!({
            "technical_terms": ["Zeta", "Alpha", "Zeta"],
            "descriptions": ["last", "first", "duplicate"]
        });
        let result = topic(&payload.to_string());
        assert_eq!(result.technical_terms, vec!["Alpha", "Zeta"]);
        assert_eq!(result.descriptions, vec!["first", "last"]);
    }

    #[test]
    fn short_description_list_is_padded() {
        let payload = json!({
            "technical_terms": ["Alpha", "Beta", "Gamma"],
            "descriptions": ["first"]
        });
        let result = topic(&payload.to_string());
        assert_eq!(result.descriptions, vec!["first", "", ""]);
    }

    #[test]
    fn long_description_list_is_truncated() {
        let payload = json!({
            "technical_terms": ["Alpha"],
            "descriptions": ["first", "orphan", "orphan two"]
        });
        let result = topic(&payload.to_string());
        assert_eq!(result.technical_terms.len(), result.descriptions.len());
        assert_eq!(result.descriptions, vec!["first"]);
    }

    #[test]
    fn mistyped_topic_fields_fall_back_to_empty() {
        let result = topic(r#"{"questions": "one big string", "answers": null}"#);
        assert!(result.questions.is_empty());
        assert!(result.answers.is_empty());
        assert!(result.technical_terms.is_empty());
    }

    #[test]
    fn non_string_list_items_keep_their_position() {
        let result = topic(r#"{"questions": ["Why?", 42, null], "answers": ["Because", true, "x"]}"#);
        assert_eq!(result.questions, vec!["Why?", "42", ""]);
        assert_eq!(result.answers, vec!["Because", "true", "x"]);
    }

    #[test]
    fn apology_text_is_malformed() {
        let err = normalize(
            &RawCompletionPayload::new("Sorry, I can't help with that."),
            Schema::TopicQa,
        )
        .unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn json_array_is_malformed() {
        let err = normalize(&RawCompletionPayload::new("[1, 2]"), Schema::SongTranslation)
            .unwrap_err();
        assert_eq!(
            err,
            ParseFailure::Malformed("expected a JSON object, found an array".to_string())
        );
    }

    #[test]
    fn fenced_payload_is_unwrapped() {
        let result = song("```json\n{\"song_title\": \"Lemon\"}\n```");
        assert_eq!(result.song_title, "Lemon");

        let result = song("```{\"song_title\": \"Lemon\"}```");
        assert_eq!(result.song_title, "Lemon");
    }

    #[test]
    fn untagged_fence_keeps_a_body_that_starts_on_the_fence_line() {
        let body = "{\n\"song_title\": \"Lemon\"\n}";
        assert_eq!(song(body).song_title, "Lemon");
        assert_eq!(song(&format!("```{}```", body)).song_title, "Lemon");
    }

    #[test]
    fn tag_on_the_fence_line_is_dropped() {
        let result = song("```json {\"song_title\": \"Lemon\"}```");
        assert_eq!(result.song_title, "Lemon");

        let result = topic("```JSON\t{\"questions\": [\"Why?\"]}\n```");
        assert_eq!(result.questions, vec!["Why?"]);
    }

    #[test]
    fn strip_code_fence_cases() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```{\n}```"), "{\n}");
        assert_eq!(strip_code_fence("```json {}```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn typed_wrappers_match_normalize() {
        let raw = RawCompletionPayload::new(r#"{"questions": ["Is Rome old?"], "answers": ["Yes."]}"#);
        assert_eq!(
            normalize(&raw, Schema::TopicQa).unwrap(),
            NormalizedResult::TopicQa(normalize_topic(&raw).unwrap())
        );

        let raw = RawCompletionPayload::new("[]");
        assert!(matches!(normalize_song(&raw), Err(ParseFailure::Malformed(_))));
    }

    #[test]
    fn unterminated_fence_is_malformed() {
        let err = normalize(
            &RawCompletionPayload::new("```json\n{\"song_title\": \"Lemon\"}"),
            Schema::SongTranslation,
        )
        .unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn song_defaults_apply_to_missing_and_null_fields() {
        let result = song(r#"{"song_translation": null}"#);
        assert_eq!(result.song_title, DEFAULT_SONG_TITLE);
        assert_eq!(result.song_translation, DEFAULT_SONG_TRANSLATION);
        assert!(result.vocabulary.is_empty());
    }

    #[test]
    fn vocabulary_accepts_snake_case_and_bare_strings() {
        let payload = json!({
            "vocabulary": [
                {"original_word": "空", "english_translation": "sky"},
                "夢",
                7
            ]
        });
        let result = song(&payload.to_string());
        assert_eq!(result.vocabulary.len(), 2);
        assert_eq!(result.vocabulary[0].original_word, "空");
        assert_eq!(result.vocabulary[0].english_translation, "sky");
        assert_eq!(result.vocabulary[1].original_word, "夢");
        assert_eq!(result.vocabulary[1].english_translation, "");
    }

    #[test]
    fn display_keys_win_over_aliases() {
        let payload = json!({
            "vocabulary": [{"Original Word": "雨", "original_word": "ignored"}]
        });
        let result = song(&payload.to_string());
        assert_eq!(result.vocabulary[0].original_word, "雨");
    }
}
