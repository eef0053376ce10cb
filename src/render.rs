//! Markdown-flavoured text output for the terminal front-end.

use crate::session::{SessionError, SongReport, TopicReport};
use crate::types::llm_data::VocabEntry;

pub const NO_QUESTIONS_WARNING: &str = "No questions or answers found.";
pub const NO_TERMS_WARNING: &str = "No technical terms found.";
pub const NO_VOCABULARY_WARNING: &str = "No vocabulary data found.";

pub fn render_topic_report(report: &TopicReport, show_raw: bool) -> String {
    let mut out = String::new();
    if show_raw {
        out.push_str(&format!("**Raw AI Response:**\n{}\n\n", report.raw_text.trim()));
    }

    let topic = &report.result;
    if !topic.has_questions_and_answers() {
        out.push_str(NO_QUESTIONS_WARNING);
        out.push('\n');
        return out;
    }

    out.push_str("### Questions:\n");
    for (idx, question) in topic.questions.iter().enumerate() {
        out.push_str(&format!("**Q{}:** {}\n", idx + 1, question));
    }
    out.push_str("\n### Answers:\n");
    for (idx, answer) in topic.answers.iter().enumerate() {
        out.push_str(&format!("**A{}:** {}\n", idx + 1, answer));
    }

    let rows = report.term_rows();
    if rows.is_empty() {
        out.push('\n');
        out.push_str(NO_TERMS_WARNING);
        out.push('\n');
    } else {
        out.push_str("\n### Technical Terms with Descriptions:\n");
        let rows: Vec<Vec<&str>> = rows
            .iter()
            .map(|(term, desc)| vec![term.as_str(), desc.as_str()])
            .collect();
        out.push_str(&markdown_table(&["Technical Term", "Description"], &rows));
    }
    out
}

pub fn render_song_report(report: &SongReport, show_raw: bool) -> String {
    let mut out = String::new();
    if show_raw {
        out.push_str(&format!("**Raw AI Response:**\n{}\n\n", report.raw_text.trim()));
    }

    let song = &report.result;
    out.push_str(&format!("**Song Title:** {}\n", song.song_title));
    out.push_str(&format!("**English Translation:** {}\n\n", song.song_translation));

    if song.vocabulary.is_empty() {
        out.push_str(NO_VOCABULARY_WARNING);
        out.push('\n');
    } else {
        let rows: Vec<Vec<&str>> = song.vocabulary.iter().map(|e| e.cells().to_vec()).collect();
        out.push_str(&markdown_table(&VocabEntry::COLUMNS, &rows));
    }
    out
}

/// Error line, followed by the undecoded response for parse failures.
pub fn render_error(error: &SessionError) -> String {
    match error.raw_text() {
        Some(raw) => format!("error: {}\n\n**Raw AI Response:**\n{}\n", error, raw.trim()),
        None => format!("error: {}\n", error),
    }
}

fn markdown_table(headers: &[&str], rows: &[Vec<&str>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| escape_cell(cell)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}
