//! # mrcprep
//!
//! Preprocessing pipeline for Chinese extractive machine reading
//! comprehension: from raw question/document JSON records to exact
//! `(document, start, end)` answer-span labels a BERT-style span model
//! can train on.
//!
//! - **Cleaning**: Unicode space, HTML, URL, and repeat-spam removal
//! - **Paragraph selection**: relevance-ranked greedy fill of a token
//!   budget, original order restored
//! - **Span localization**: exact-match cascade plus Rouge-L-guided fuzzy
//!   search over character offsets
//! - **Label resolution**: marker-annotated answers anchored through
//!   supporting paragraphs to absolute document offsets
//! - **Feature alignment**: token-level POS/keyword/entity annotations
//!   projected onto char-level arrays
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌──────────────┐   ┌────────────────┐
//! │  clean  │──▶│   rank   │──▶│    label     │──▶│    features    │
//! │ (text)  │   │ (budget) │   │ (span locate)│   │ (char arrays)  │
//! └─────────┘   └──────────┘   └──────────────┘   └────────────────┘
//!      one NDJSON record in ──▶ one NDJSON record out, streaming
//! ```
//!
//! The hard part is not the model; it is recovering exact character
//! offsets from noisy human annotations. Answers are annotated as
//! substrings of a "supporting paragraph", itself annotated as substrings
//! of the document, both referencing documents only through ad-hoc
//! `@content<N>@` markers and both imprecise (trailing punctuation, stray
//! whitespace, paraphrase). See [`locate`] and [`resolve`].
//!
//! ## Quick start
//!
//! ```rust
//! use mrcprep::{gen_mrc_dataset, Sample};
//!
//! let line = r#"{
//!     "question": "首都是哪里？",
//!     "documents": [{"paragraphs": ["北京是中国的首都。"]}],
//!     "supporting_paragraph": "@content1@北京是中国的首都。@content1@",
//!     "answer": "@content1@北京@content1@"
//! }"#;
//! let mut sample: Sample = serde_json::from_str(line).unwrap();
//! gen_mrc_dataset(&mut sample);
//! assert_eq!(sample.answer_labels[0].start(), 0);
//! assert_eq!(sample.answer_labels[0].end(), 1);
//! assert_eq!(sample.fake_answers, vec!["北京".to_string()]);
//! ```
//!
//! ## Design notes
//!
//! - **All offsets are char offsets**, end-inclusive. The corpus is
//!   Chinese; byte offsets disagree on every CJK character.
//! - **Soft failure everywhere**: unresolvable fragments are dropped,
//!   unknown document ids skipped, oversized budgets degrade. A sample
//!   with no usable supervision is a valid output, not an error.
//! - **Per-sample purity**: samples share no state, so the stream driver
//!   fans out over stateless workers with no locking.
//! - **Injectable collaborators**: the segmenter/NER handle is a trait
//!   ([`features::Annotator`]) and the paragraph relevance scorer a plain
//!   function parameter; tests inject stubs.

#![warn(missing_docs)]

pub mod clean;
pub mod distance;
pub mod error;
pub mod features;
pub mod filter;
pub mod locate;
pub mod markers;
pub mod metrics;
pub mod paragraph;
pub mod pipeline;
pub mod resolve;
pub mod rouge;
pub mod sample;

pub use clean::{clean_sample, clean_text};
pub use error::{Error, Result};
pub use features::{gen_text_features, Annotator, CharAnnotator};
pub use filter::{remove_unrelated_paras, FilterConfig};
pub use locate::{locate, Located};
pub use paragraph::{extract_paragraphs, RankConfig, SPLITTER};
pub use pipeline::{process_stream, process_stream_parallel, Stage, StageContext, StreamStats};
pub use resolve::{gen_mrc_dataset, resolve, Resolution};
pub use rouge::RougeL;
pub use sample::{AnswerLabel, Document, Sample};
