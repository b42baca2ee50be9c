//! Context Assembler - Builds budgeted prompt context from articles
//!
//! Provides:
//! - Greedy, order-preserving inclusion under a character budget
//! - Word-boundary truncation of the first document that does not fit
//! - Optional full text ("deep" context)

use serde::{Deserialize, Serialize};

use crate::models::SearchHit;

/// Placeholder rendered for documents without an abstract
pub const NO_ABSTRACT: &str = "No abstract available";

const ENTRY_SEPARATOR: &str = "\n\n";
const FULL_TEXT_LABEL: &str = "\nFull text: ";

/// A document offered for inclusion in a prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub title: String,

    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub full_text: Option<String>,
}

impl From<&SearchHit> for ContextDocument {
    fn from(hit: &SearchHit) -> Self {
        Self {
            title: hit.title.clone(),
            abstract_text: hit.abstract_text.clone(),
            full_text: hit.full_text.clone(),
        }
    }
}

/// A document as it was included, after any truncation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    pub truncated: bool,
}

/// Assembled context: the included entries and their rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptContext {
    pub entries: Vec<ContextEntry>,
    /// Budget in characters
    pub budget: usize,
    /// Characters used by `rendered`
    pub used: usize,
    /// Documents offered but not included
    pub dropped: usize,
    #[serde(skip)]
    pub rendered: String,
}

impl PromptContext {
    pub fn empty(budget: usize, dropped: usize) -> Self {
        Self {
            entries: Vec::new(),
            budget,
            used: 0,
            dropped,
            rendered: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.rendered
    }

    pub fn truncated(&self) -> bool {
        self.entries.iter().any(|e| e.truncated)
    }
}

/// Context assembler
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler {
    deep: bool,
}

impl ContextAssembler {
    /// `deep` includes each document's full text after its abstract
    pub fn new(deep: bool) -> Self {
        Self { deep }
    }

    /// Assemble documents, in order, into at most `budget` characters.
    ///
    /// Documents are included whole while they fit. The first one that does
    /// not fit is cut at a word boundary to the remaining budget and assembly
    /// stops there. Until something has been included, documents whose
    /// header alone exceeds the budget are skipped.
    pub fn assemble(&self, documents: &[ContextDocument], budget: usize) -> PromptContext {
        let mut entries: Vec<ContextEntry> = Vec::new();
        let mut rendered = String::new();
        let mut used = 0usize;
        let mut dropped = 0usize;
        let mut stopped = false;

        for doc in documents {
            if stopped {
                dropped += 1;
                continue;
            }

            let separator = if entries.is_empty() { 0 } else { ENTRY_SEPARATOR.len() };
            let remaining = budget.saturating_sub(used + separator);
            let number = entries.len() + 1;

            let entry = ContextEntry {
                title: doc.title.trim().to_string(),
                abstract_text: doc
                    .abstract_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or(NO_ABSTRACT)
                    .to_string(),
                full_text: if self.deep {
                    doc.full_text
                        .as_deref()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                } else {
                    None
                },
                truncated: false,
            };

            let whole = render_entry(number, &entry);
            let (entry, text) = if char_len(&whole) <= remaining {
                (entry, whole)
            } else {
                let header = render_header(number, &entry.title);
                if used + separator > budget || char_len(&header) > remaining {
                    dropped += 1;
                    if !entries.is_empty() {
                        stopped = true;
                    }
                    continue;
                }

                stopped = true;
                let entry = truncate_entry(entry, remaining - char_len(&header));
                let text = render_entry(number, &entry);
                (entry, text)
            };

            if separator > 0 {
                rendered.push_str(ENTRY_SEPARATOR);
            }
            used += separator + char_len(&text);
            rendered.push_str(&text);
            entries.push(entry);
        }

        debug_assert_eq!(char_len(&rendered), used);

        PromptContext {
            entries,
            budget,
            used,
            dropped,
            rendered,
        }
    }
}

fn render_header(number: usize, title: &str) -> String {
    format!("Document {}: {}\nAbstract: ", number, title)
}

fn render_entry(number: usize, entry: &ContextEntry) -> String {
    let mut text = render_header(number, &entry.title);
    text.push_str(&entry.abstract_text);
    if let Some(full_text) = &entry.full_text {
        text.push_str(FULL_TEXT_LABEL);
        text.push_str(full_text);
    }
    text
}

/// Fit the body of an entry into `available` characters, abstract first
fn truncate_entry(mut entry: ContextEntry, available: usize) -> ContextEntry {
    entry.truncated = true;

    let abstract_len = char_len(&entry.abstract_text);
    if abstract_len > available {
        entry.abstract_text = truncate_at_word(&entry.abstract_text, available).to_string();
        entry.full_text = None;
        return entry;
    }

    let left = available - abstract_len;
    entry.full_text = entry.full_text.and_then(|full_text| {
        let room = left.checked_sub(FULL_TEXT_LABEL.len())?;
        let cut = truncate_at_word(&full_text, room);
        (!cut.is_empty()).then(|| cut.to_string())
    });
    entry
}

/// Longest prefix of `text` of at most `max_chars` characters that ends on a
/// word boundary. Trailing whitespace is dropped.
pub fn truncate_at_word(text: &str, max_chars: usize) -> &str {
    let cut = match text.char_indices().nth(max_chars) {
        None => return text,
        Some((idx, _)) => idx,
    };

    let next_is_space = text[cut..].starts_with(char::is_whitespace);
    let prefix = &text[..cut];
    if next_is_space {
        return prefix.trim_end();
    }

    match prefix.rfind(char::is_whitespace) {
        Some(pos) => prefix[..pos].trim_end(),
        None => "",
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
