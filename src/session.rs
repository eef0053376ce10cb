//! The two end-to-end flows behind each submit action.

use crate::llm::client::{CompletionClient, TransportError};
use crate::llm::term_lookup::{describe_terms, LookupOptions};
use crate::parsing::response_normalizer::{normalize_song, normalize_topic, ParseFailure};
use crate::prompts::system_prompt_for;
use crate::types::llm_data::{
    CompletionRequest, RawCompletionPayload, Schema, SongTranslation, TermDescription, TopicQa,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("please enter some text before submitting")]
    EmptyInput,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("error in parsing the JSON response: {failure}")]
    Parse {
        failure: ParseFailure,
        raw_text: String,
    },
}

impl SessionError {
    /// The undecoded response, kept so prompt or model drift can be diagnosed.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            SessionError::Parse { raw_text, .. } => Some(raw_text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReport {
    pub raw_text: String,
    pub result: TopicQa,
    /// One entry per technical term when the per-term lookup ran.
    pub term_descriptions: Vec<TermDescription>,
}

impl TopicReport {
    /// Rows for the term table: looked-up descriptions when present,
    /// otherwise whatever the model supplied.
    pub fn term_rows(&self) -> Vec<(String, String)> {
        if !self.term_descriptions.is_empty() {
            return self
                .term_descriptions
                .iter()
                .map(|d| (d.term.clone(), d.display_text()))
                .collect();
        }
        self.result
            .technical_terms
            .iter()
            .cloned()
            .zip(self.result.descriptions.iter().cloned())
            .collect()
    }

    /// The normalized result with successful lookups written into
    /// `descriptions`, so it serializes in the usual shape.
    pub fn merged_result(&self) -> TopicQa {
        let mut merged = self.result.clone();
        for lookup in &self.term_descriptions {
            let Ok(text) = &lookup.outcome else { continue };
            if let Some(idx) = merged.technical_terms.iter().position(|t| t == &lookup.term) {
                merged.descriptions[idx] = text.clone();
            }
        }
        merged
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongReport {
    pub raw_text: String,
    pub result: SongTranslation,
}

/// Generates questions and answers for `topic`, then describes each
/// extracted term unless `lookup` is `None`.
pub fn run_topic(
    client: &dyn CompletionClient,
    topic: &str,
    lookup: Option<&LookupOptions>,
) -> Result<TopicReport, SessionError> {
    let (raw_text, result) = request_and_normalize(client, Schema::TopicQa, topic, normalize_topic)?;

    let term_descriptions = match lookup {
        Some(options) if result.has_questions_and_answers() => {
            describe_terms(client, &result.technical_terms, options)
        }
        _ => Vec::new(),
    };

    tracing::info!(
        questions = result.questions.len(),
        answers = result.answers.len(),
        terms = result.technical_terms.len(),
        "topic request complete"
    );

    Ok(TopicReport {
        raw_text,
        result,
        term_descriptions,
    })
}

/// Translates `lyrics` and extracts a vocabulary table.
pub fn run_song(client: &dyn CompletionClient, lyrics: &str) -> Result<SongReport, SessionError> {
    let (raw_text, result) =
        request_and_normalize(client, Schema::SongTranslation, lyrics, normalize_song)?;

    tracing::info!(
        title = %result.song_title,
        vocabulary = result.vocabulary.len(),
        "song request complete"
    );

    Ok(SongReport { raw_text, result })
}

fn request_and_normalize<T>(
    client: &dyn CompletionClient,
    schema: Schema,
    user_input: &str,
    parse: fn(&RawCompletionPayload) -> Result<T, ParseFailure>,
) -> Result<(String, T), SessionError> {
    if user_input.trim().is_empty() {
        return Err(SessionError::EmptyInput);
    }

    let request = CompletionRequest::new(system_prompt_for(schema), user_input);
    let payload: RawCompletionPayload = client.complete(&request)?;

    match parse(&payload) {
        Ok(normalized) => Ok((payload.text, normalized)),
        Err(failure) => {
            tracing::warn!(schema = schema.label(), error = %failure, "could not parse completion");
            Err(SessionError::Parse {
                failure,
                raw_text: payload.text,
            })
        }
    }
}
