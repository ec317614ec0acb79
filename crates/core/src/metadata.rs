use crate::models::{Document, DocumentMetadata};
use regex::Regex;
use std::sync::LazyLock;

const COUNTING_WORDS: [&str; 5] = ["number", "count", "counts", "total", "totals"];

static WORD_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word token regex is valid"));

/// Structural nouns, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Page,
    Row,
    Column,
    Slide,
    Line,
    Word,
    Letter,
}

const SUBJECTS: [(&str, Subject); 7] = [
    ("page", Subject::Page),
    ("row", Subject::Row),
    ("column", Subject::Column),
    ("slide", Subject::Slide),
    ("line", Subject::Line),
    ("word", Subject::Word),
    ("letter", Subject::Letter),
];

fn query_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn names_noun(word: &str, noun: &str) -> bool {
    word == noun || word.strip_suffix('s') == Some(noun)
}

/// True for "how many ..." and for whole-word "number", "count" or "total".
pub fn has_counting_intent(query: &str) -> bool {
    let words = query_words(query);
    words.windows(2).any(|pair| pair[0] == "how" && pair[1] == "many")
        || words
            .iter()
            .any(|word| COUNTING_WORDS.contains(&word.as_str()))
}

/// Answers "how many pages/rows/columns/..." straight from extraction metadata.
///
/// Returns `None` when the query is not a structural count, or when the
/// metadata field it needs is missing; the router then moves on instead of
/// answering "zero".
pub fn resolve_metadata_shortcut(query: &str, document: &Document) -> Option<String> {
    if !has_counting_intent(query) {
        return None;
    }

    let words = query_words(query);
    SUBJECTS
        .iter()
        .filter(|(noun, _)| words.iter().any(|word| names_noun(word, noun)))
        .find_map(|(_, subject)| answer_for(*subject, document))
}

fn answer_for(subject: Subject, document: &Document) -> Option<String> {
    let metadata: &DocumentMetadata = &document.metadata;
    match subject {
        Subject::Page => metadata
            .page_count
            .map(|count| format!("The document has {count} {}.", plural(count, "page"))),
        Subject::Row => metadata
            .row_count
            .map(|count| format!("The spreadsheet has {count} data {}.", plural(count, "row"))),
        Subject::Column => metadata
            .column_count
            .map(|count| format!("The spreadsheet has {count} {}.", plural(count, "column"))),
        Subject::Slide => metadata
            .slide_count
            .map(|count| format!("The presentation has {count} {}.", plural(count, "slide"))),
        Subject::Line => metadata
            .line_count
            .map(|count| format!("The document has {count} {}.", plural(count, "line"))),
        Subject::Word => {
            let count = count_words(&document.full_text) as u64;
            Some(format!("The document contains {count} {}.", plural(count, "word")))
        }
        Subject::Letter => {
            let count = count_letters(&document.full_text) as u64;
            Some(format!("The document contains {count} {}.", plural(count, "letter")))
        }
    }
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

pub fn count_words(text: &str) -> usize {
    WORD_TOKEN_RE.find_iter(text).count()
}

pub fn count_letters(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(metadata: DocumentMetadata, text: &str) -> Document {
        Document::new(text, metadata)
    }

    #[test]
    fn page_count_comes_from_metadata() {
        let document = document_with(
            DocumentMetadata {
                page_count: Some(12),
                ..Default::default()
            },
            "irrelevant",
        );

        let answer = resolve_metadata_shortcut("how many pages?", &document)
            .expect("page count should resolve");
        assert!(answer.contains("12"));
    }

    #[test]
    fn missing_field_falls_through() {
        let document = document_with(DocumentMetadata::default(), "some text");
        assert_eq!(resolve_metadata_shortcut("how many pages?", &document), None);
        assert_eq!(resolve_metadata_shortcut("count the slides", &document), None);
    }

    #[test]
    fn noun_without_counting_intent_is_ignored() {
        let document = document_with(
            DocumentMetadata {
                page_count: Some(3),
                ..Default::default()
            },
            "text",
        );
        assert_eq!(resolve_metadata_shortcut("summarize page two", &document), None);
    }

    #[test]
    fn spreadsheet_rows_and_columns() {
        let document = document_with(
            DocumentMetadata {
                row_count: Some(40),
                column_count: Some(1),
                ..Default::default()
            },
            "",
        );

        let rows = resolve_metadata_shortcut("What is the total number of rows", &document);
        assert_eq!(rows.as_deref(), Some("The spreadsheet has 40 data rows."));

        let columns = resolve_metadata_shortcut("How many columns are there?", &document);
        assert_eq!(columns.as_deref(), Some("The spreadsheet has 1 column."));
    }

    #[test]
    fn line_count_answers_and_falls_through_without_it() {
        let document = document_with(
            DocumentMetadata {
                line_count: Some(1),
                ..Default::default()
            },
            "single line",
        );
        let lines = resolve_metadata_shortcut("How many lines does it have?", &document);
        assert_eq!(lines.as_deref(), Some("The document has 1 line."));

        let without = document_with(DocumentMetadata::default(), "single line");
        assert_eq!(resolve_metadata_shortcut("how many lines", &without), None);
    }

    #[test]
    fn nouns_and_intents_match_whole_words_only() {
        let document = document_with(
            DocumentMetadata {
                row_count: Some(3),
                ..Default::default()
            },
            "user password list",
        );

        assert_eq!(resolve_metadata_shortcut("how many will be absent tomorrow", &document), None);
        assert_eq!(resolve_metadata_shortcut("how many passwords are listed", &document), None);
        assert_eq!(resolve_metadata_shortcut("which account has the most rows", &document), None);
        assert!(!has_counting_intent("what country is this from"));
        assert!(has_counting_intent("give me the totals"));
        assert!(has_counting_intent("How many?"));
    }

    #[test]
    fn word_and_letter_counts_are_computed_from_text() {
        let document = document_with(DocumentMetadata::default(), "Hello, world! It's 2024.");

        let words = resolve_metadata_shortcut("How many words?", &document);
        assert_eq!(words.as_deref(), Some("The document contains 5 words."));

        let letters = resolve_metadata_shortcut("count the letters", &document);
        assert_eq!(letters.as_deref(), Some("The document contains 13 letters."));
    }

    #[test]
    fn later_noun_answers_when_earlier_field_is_missing() {
        let document = document_with(
            DocumentMetadata {
                slide_count: Some(8),
                ..Default::default()
            },
            "",
        );
        let answer = resolve_metadata_shortcut("how many rows or slides", &document);
        assert_eq!(answer.as_deref(), Some("The presentation has 8 slides."));
    }
}
