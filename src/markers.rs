//! Parser for `@content<N>@` document markers.
//!
//! Answers and supporting paragraphs are annotated as free text with
//! ad-hoc markers tying each fragment to a document:
//!
//! ```text
//! @content1@北京是中国的首都。@content1@@content2@上海是经济中心。@content2@
//! ```
//!
//! The marker pairs are an ad-hoc serialization, not a principled format,
//! so the parser is a small explicit state machine: walk the marker
//! occurrences in order, tracking the id of the last marker seen; every
//! text segment between markers belongs to that id. Text before the first
//! marker has no owner and is dropped. Annotation typos sometimes leave a
//! stray partial marker (`content1@` without the leading `@`) inside a
//! fragment; those are stripped from the fragment text.

use once_cell::sync::Lazy;
use regex::Regex;

/// A full `@content<N>@` marker. Document ids are a single digit (1-based);
/// the corpus never exceeds single-digit document counts.
static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@content(\d)@").expect("marker pattern is valid"));

/// A stray partial marker left inside fragment text by annotation typos.
static STRAY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"content\d@").expect("stray pattern is valid"));

/// One marker-delimited fragment and the document it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 1-based document id from the owning marker.
    pub doc_id: usize,
    /// Fragment text with stray partial markers removed. Not trimmed;
    /// callers decide whether surrounding whitespace is significant.
    pub text: String,
}

/// Distinct document ids referenced by markers, ascending, so that label
/// emission order is reproducible across runs.
#[must_use]
pub fn doc_ids(marked: &str) -> Vec<usize> {
    let mut ids: Vec<usize> = MARKER
        .captures_iter(marked)
        .map(|c| c[1].parse().unwrap_or(0))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Split marker-annotated text into owned fragments.
///
/// Each non-empty segment between markers is attributed to the most
/// recently opened marker id. Close markers are indistinguishable from
/// open markers, so "last seen id" is the whole state.
///
/// # Examples
///
/// ```
/// use mrcprep::markers::fragments;
///
/// let frags = fragments("@content1@北京@content1@@content2@上海@content2@");
/// assert_eq!(frags.len(), 2);
/// assert_eq!(frags[0].doc_id, 1);
/// assert_eq!(frags[0].text, "北京");
/// assert_eq!(frags[1].doc_id, 2);
/// ```
#[must_use]
pub fn fragments(marked: &str) -> Vec<Fragment> {
    let mut out = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    for caps in MARKER.captures_iter(marked) {
        let whole = caps.get(0).expect("capture 0 is the whole match");
        push_fragment(&mut out, current, &marked[pos..whole.start()]);
        current = Some(caps[1].parse().unwrap_or(0));
        pos = whole.end();
    }
    push_fragment(&mut out, current, &marked[pos..]);

    out
}

fn push_fragment(out: &mut Vec<Fragment>, current: Option<usize>, segment: &str) {
    let Some(doc_id) = current else { return };
    if segment.is_empty() {
        return;
    }

    let text = STRAY_MARKER.replace_all(segment, "");
    if text.is_empty() {
        return;
    }

    out.push(Fragment {
        doc_id,
        text: text.into_owned(),
    });
}
