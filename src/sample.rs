//! Data model for QA records flowing through the pipeline.
//!
//! One newline-delimited JSON object per record. The structs here mirror
//! the wire schema and stay deliberately permissive: unknown fields
//! round-trip through a flattened `extra` map so each pipeline stage can
//! be run in isolation without destroying the fields it does not
//! understand.
//!
//! Lifecycle invariants:
//!
//! - `Document.paragraphs` is read-once: [`Document::concat_paragraphs`]
//!   collapses it into `content` exactly once and empties the source
//!   fields (storage reclamation; documents are large).
//! - `Sample.answer_labels` is populated at most once, and only for
//!   training records carrying an `answer`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A resolved answer span: `(doc_index, start, end)`.
///
/// `doc_index` is the zero-based position in `Sample.documents`; `start`
/// and `end` are inclusive char offsets into that document's `content`.
/// Serialized as a 3-element JSON array. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLabel(pub usize, pub usize, pub usize);

impl AnswerLabel {
    /// Zero-based document index.
    #[must_use]
    pub const fn doc(&self) -> usize {
        self.0
    }

    /// Start offset (inclusive).
    #[must_use]
    pub const fn start(&self) -> usize {
        self.1
    }

    /// End offset (inclusive).
    #[must_use]
    pub const fn end(&self) -> usize {
        self.2
    }

    /// Check the label against the documents it indexes into.
    #[must_use]
    pub fn is_valid(&self, documents: &[Document]) -> bool {
        documents
            .get(self.0)
            .is_some_and(|d| self.1 <= self.2 && self.2 < d.content.chars().count())
    }
}

/// Sentence-level match features against the question, broadcast to
/// char-level arrays (one value per content char).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchFeatures {
    /// Normalized Levenshtein distance per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levenshtein_dist: Vec<f32>,
    /// Char-set Jaccard coefficient per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jaccard_coef: Vec<f32>,
    /// Char-set Dice coefficient per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dice_dist: Vec<f32>,
    /// Longest-common-substring ratio per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub longest_match_ratio: Vec<f32>,
    /// Char-level F1 against the question per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub f1_score: Vec<f32>,
}

impl MatchFeatures {
    /// True when no feature columns have been computed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levenshtein_dist.is_empty()
    }
}

/// One retrieved document. Identity is its 1-based position in
/// `Sample.documents`, referenced by `@content<N>@` markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Document title, cleared once `content` is derived.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// Pre-trim paragraphs; collapsed into `content` by
    /// [`Document::concat_paragraphs`] and emptied afterwards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<String>,

    /// Post-trim concatenated document text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    // --- optional pre-segmented inputs (token-level, from an upstream
    // segmentation stage); the ranker prefers these over re-segmenting ---
    /// Title tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segmented_title: Vec<String>,
    /// Paragraph tokens, one list per paragraph.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segmented_paragraphs: Vec<Vec<String>>,
    /// POS tags aligned with `segmented_title`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pos_title: Vec<String>,
    /// POS tags aligned with `segmented_paragraphs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pos_paragraphs: Vec<Vec<String>>,
    /// Keyword flags aligned with `segmented_title`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_title: Vec<u8>,
    /// Keyword flags aligned with `segmented_paragraphs`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_paragraphs: Vec<Vec<u8>>,
    /// Question-membership flags for title tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_word_in_question: Vec<u8>,
    /// Question-membership flags for paragraph tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs_word_in_question: Vec<Vec<u8>>,

    // --- derived by the paragraph ranker ---
    /// Index of the highest-scoring segment in the selected passage
    /// (title is segment 0). Weak supervision signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_related_para_id: Option<usize>,
    /// Selected passage tokens, `<splitter>`-separated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segmented_passage: Vec<String>,
    /// POS column aligned with `segmented_passage`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pos_passage: Vec<String>,
    /// Keyword column aligned with `segmented_passage`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_passage: Vec<u8>,
    /// Question-membership column aligned with `segmented_passage`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passage_word_in_question: Vec<u8>,
    /// Match score per selected segment (title first).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraph_match_scores: Vec<f64>,
    /// Title token count, recorded before the title fields are cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_len: Option<usize>,

    // --- derived by paragraph filtering ---
    /// Ids of paragraphs that support the answer, ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_para_ids: Vec<usize>,

    // --- derived by the feature aligner (one entry per content char) ---
    /// POS tag per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub char_pos: Vec<String>,
    /// Keyword flag per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub char_kw: Vec<u8>,
    /// Question-membership flag per char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub char_in_que: Vec<u8>,
    /// Compressed entity tag per char (empty string = no entity).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub char_entity: Vec<String>,
    /// Sentence-level distance features, broadcast per char.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_features: Option<MatchFeatures>,

    /// Fields this pipeline does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Collapse `paragraphs` into `content` and reclaim the source fields.
    ///
    /// Idempotent: a document whose `content` is already set is left
    /// untouched.
    pub fn concat_paragraphs(&mut self) {
        if !self.content.is_empty() {
            return;
        }
        self.content = self.paragraphs.concat();
        self.paragraphs = Vec::new();
        self.title = String::new();
    }

    /// Slice `content` by an inclusive char range.
    #[must_use]
    pub fn char_slice(&self, start: usize, end: usize) -> String {
        self.content
            .chars()
            .skip(start)
            .take(end + 1 - start)
            .collect()
    }
}

/// One QA instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sample {
    /// The question text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub question: String,

    /// Query keyword accompanying the question.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keyword: String,

    /// Question tokens from an upstream segmentation stage, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segmented_question: Vec<String>,

    /// Retrieved documents, in rank order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,

    /// Training-only: marker-annotated supporting paragraph text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_paragraph: Option<String>,

    /// Training-only: marker-annotated answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    /// Resolved answer spans. Populated once, only for training records.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer_labels: Vec<AnswerLabel>,

    /// Document text sliced by `answer_labels`, in emission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fake_answers: Vec<String>,

    /// Achievability ceiling: Rouge-L of the concatenated fake answers
    /// against the annotated answer text. An extractive model can never
    /// exceed this on the sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceil_rougel: Option<f64>,

    // --- derived by the feature aligner for the question text ---
    /// POS tag per question char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ques_char_pos: Vec<String>,
    /// Keyword flag per question char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ques_char_kw: Vec<u8>,
    /// Entity tag per question char.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ques_char_entity: Vec<String>,

    /// Fields this pipeline does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sample {
    /// Whether this record carries training-time answer annotations.
    #[must_use]
    pub fn has_answer(&self) -> bool {
        self.answer.is_some()
    }
}
