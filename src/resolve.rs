//! Answer-label resolution: from marker-annotated free text to exact
//! `(doc, start, end)` character spans.
//!
//! Answers are annotated as substrings of the supporting paragraph, which
//! is itself annotated as substrings of the document, neither precisely.
//! Resolution is therefore two locate phases:
//!
//! ```text
//! supporting_paragraph ──locate──▶ spans in document content
//!                                   │ (absolute offsets kept)
//! answer fragment ──locate──▶ span inside best supporting paragraph
//!                                   │
//!                                   ▼ shift by the paragraph's start
//!                          AnswerLabel(doc, start, end)
//! ```
//!
//! Searching the answer inside the supporting paragraphs instead of the
//! whole document both narrows the search and keeps labels anchored to
//! text a human marked as justifying the answer.
//!
//! Every failure below the sample level is soft: an unlocatable fragment
//! is dropped, a marker referencing a missing document contributes
//! nothing, and a sample where nothing resolves comes out with empty
//! labels and a zero ceiling: a valid (if unusable for span
//! supervision) record, never an error.

use std::collections::HashMap;

use crate::locate::locate;
use crate::markers;
use crate::rouge::RougeL;
use crate::sample::{AnswerLabel, Sample};

/// A supporting-paragraph fragment anchored in a document.
#[derive(Debug, Clone)]
pub struct SupportedParagraph {
    /// The matched document text (not the raw annotation).
    pub chars: Vec<char>,
    /// Absolute start offset in the document content (inclusive).
    pub start: usize,
    /// Absolute end offset (inclusive).
    pub end: usize,
}

/// The outcome of answer-label resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved labels, in fragment encounter order across all documents.
    pub labels: Vec<AnswerLabel>,
    /// Document text sliced by each label.
    pub fake_answers: Vec<String>,
    /// Rouge-L of the concatenated fake answers against the annotated
    /// answer text; the extractive ceiling for this sample.
    pub ceil_rougel: f64,
}

/// Locate every supporting-paragraph fragment inside its document.
///
/// Fragments referencing a document id outside `documents`, and fragments
/// the locator cannot place at all, contribute nothing.
#[must_use]
pub fn collect_supported_paragraphs(
    supporting: &str,
    sample: &Sample,
) -> HashMap<usize, Vec<SupportedParagraph>> {
    let mut content_cache: HashMap<usize, Vec<char>> = HashMap::new();
    let mut supported: HashMap<usize, Vec<SupportedParagraph>> = HashMap::new();

    for frag in markers::fragments(supporting) {
        let Some(doc) = frag.doc_id.checked_sub(1).and_then(|i| sample.documents.get(i)) else {
            log::debug!("supporting fragment references missing document {}", frag.doc_id);
            continue;
        };

        let content = content_cache
            .entry(frag.doc_id)
            .or_insert_with(|| doc.content.chars().collect());
        let frag_chars: Vec<char> = frag.text.chars().collect();

        match locate(&frag_chars, content) {
            Some(hit) => {
                supported.entry(frag.doc_id).or_default().push(SupportedParagraph {
                    chars: content[hit.start..=hit.end].to_vec(),
                    start: hit.start,
                    end: hit.end,
                });
            }
            None => {
                log::debug!(
                    "supporting fragment unlocatable in document {}",
                    frag.doc_id
                );
            }
        }
    }

    supported
}

/// Resolve a sample's answer annotations into labels.
///
/// Expects documents whose `content` is already derived. Labels accumulate
/// across **all** documents carrying answer fragments, in fragment
/// encounter order per ascending document id.
#[must_use]
pub fn resolve(sample: &Sample) -> Resolution {
    let mut resolution = Resolution::default();

    let Some(answer) = sample.answer.as_deref() else {
        return resolution;
    };
    let supported = match sample.supporting_paragraph.as_deref() {
        Some(sp) => collect_supported_paragraphs(sp, sample),
        None => {
            log::warn!("sample has an answer but no supporting_paragraph");
            HashMap::new()
        }
    };

    let mut answer_texts: Vec<String> = Vec::new();

    // Group answer fragments per document, then walk documents in
    // ascending id order for reproducible label order.
    let mut per_doc: HashMap<usize, Vec<String>> = HashMap::new();
    let mut doc_order: Vec<usize> = Vec::new();
    for frag in markers::fragments(answer) {
        let text = frag.text.trim();
        if text.is_empty() {
            continue;
        }
        if !per_doc.contains_key(&frag.doc_id) {
            doc_order.push(frag.doc_id);
        }
        per_doc.entry(frag.doc_id).or_default().push(text.to_string());
    }
    doc_order.sort_unstable();

    for doc_id in doc_order {
        let fragments = &per_doc[&doc_id];
        let doc_supported = supported.get(&doc_id);

        for text in fragments {
            answer_texts.push(text.clone());

            let Some(sup_paras) = doc_supported else {
                log::debug!("answer references document {doc_id} with no supporting paragraph");
                continue;
            };

            let answer_chars: Vec<char> = text.chars().collect();
            let mut best: Option<(usize, crate::locate::Located)> = None;
            for (i, sup) in sup_paras.iter().enumerate() {
                if let Some(hit) = locate(&answer_chars, &sup.chars) {
                    if best.map_or(true, |(_, b)| hit.score > b.score) {
                        best = Some((i, hit));
                    }
                }
            }

            if let Some((i, hit)) = best {
                let sup = &sup_paras[i];
                let start = sup.start + hit.start;
                let end = start + (hit.end - hit.start);
                resolution.labels.push(AnswerLabel(doc_id - 1, start, end));
            }
        }
    }

    resolution.fake_answers = resolution
        .labels
        .iter()
        .map(|label| sample.documents[label.doc()].char_slice(label.start(), label.end()))
        .collect();

    resolution.ceil_rougel = if resolution.fake_answers.is_empty() {
        0.0
    } else {
        RougeL::default().score_str(&resolution.fake_answers.concat(), &answer_texts.concat())
    };

    resolution
}

/// Label-generation stage: collapse paragraphs into content, then resolve
/// answer labels for training records.
pub fn gen_mrc_dataset(sample: &mut Sample) {
    for doc in &mut sample.documents {
        doc.concat_paragraphs();
    }

    if !sample.has_answer() {
        return;
    }

    let resolution = resolve(sample);
    sample.answer_labels = resolution.labels;
    sample.fake_answers = resolution.fake_answers;
    sample.ceil_rougel = Some(resolution.ceil_rougel);
}
