//! Fixed system instructions sent with each completion call.

use crate::types::llm_data::Schema;

pub const TOPIC_QA_PROMPT: &str = r#"
You are an AI assistant capable of generating a list of questions based on a topic.
You will receive a random topic. Your task is to:
1. Generate 10 questions about that topic.
2. Generate answers for all questions in a separate list.
3. Extract technical terms (e.g., keywords, important nouns, and domain-specific terms) from the questions and answers.
4. For each technical term, provide a brief description.
Return only a JSON object with four keys:
- "questions": a JSON array of questions.
- "answers": a JSON array of answers, in the same order as the questions.
- "technical_terms": a JSON array of technical terms (e.g., capitalized words, domain-specific terms).
- "descriptions": a JSON array with one description for each technical term, in the same order.
"#;

pub const SONG_TRANSLATION_PROMPT: &str = r#"
You are an AI assistant capable of handling both translation and vocabulary extraction.
You will receive Japanese song lyrics. Your task is to:
1. Identify the song title and translate the entire lyrics into English.
2. Extract interesting vocabulary words from the lyrics and provide the following information for each word:
    - "Original Word": The original Japanese word.
    - "English Translation": The English translation of the word.
    - "Synonym (Japanese)": A synonym for the word in Japanese.
    - "Description (Japanese)": A short description of the word in Japanese.
    - "Description (English)": A short description of the word in English.
Return only a JSON object with three keys:
- "song_title": the song title.
- "song_translation": the full English translation of the lyrics.
- "vocabulary": a JSON array of interesting vocabulary with the fields mentioned above.
"#;

pub const TERM_DESCRIPTION_PROMPT: &str = "Provide a brief description of the technical term.";

/// The instruction that asks the model for `schema`'s JSON shape.
pub fn system_prompt_for(schema: Schema) -> &'static str {
    match schema {
        Schema::TopicQa => TOPIC_QA_PROMPT,
        Schema::SongTranslation => SONG_TRANSLATION_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_name_the_keys_the_normalizer_reads() {
        for key in ["\"questions\"", "\"answers\"", "\"technical_terms\"", "\"descriptions\""] {
            assert!(system_prompt_for(Schema::TopicQa).contains(key), "missing {}", key);
        }
        for key in ["\"song_title\"", "\"song_translation\"", "\"vocabulary\"", "\"Original Word\""] {
            assert!(system_prompt_for(Schema::SongTranslation).contains(key), "missing {}", key);
        }
    }
}
