//! Character-level feature alignment.
//!
//! The downstream model consumes one feature value per *character*, while
//! linguistic annotations (segmentation, POS, keywords, entities) arrive
//! per *token* or per *span*. This module projects token-level
//! annotations down to aligned char arrays:
//!
//! ```text
//! tokens:    [北京  ] [是] [首都 ]        pos: ns  v  n
//!                 │      │      │
//! chars:      北   京   是   首   都
//! char_pos:   ns   ns   v    n    n
//! ```
//!
//! The segmenter/POS/keyword/NER collaborator sits behind the
//! [`Annotator`] trait: a lazily-initialized, explicitly-scoped resource
//! handle passed into the pipeline by reference (one handle per worker,
//! never ambient global state), so tests inject a stub and parallel
//! workers initialize independently. [`CharAnnotator`] is the
//! deterministic in-crate stub.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::distance;
use crate::sample::{MatchFeatures, Sample};

/// One segmented token with its token-level annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Surface form.
    pub text: String,
    /// POS tag.
    pub pos: String,
    /// Whether the segmenter considers this token a keyword.
    pub keyword: bool,
}

/// A named-entity span in char offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    /// Start char offset (inclusive).
    pub start: usize,
    /// Number of chars covered.
    pub len: usize,
    /// Entity tag (e.g. `time`, `location`, `person`).
    pub tag: String,
}

/// Segmentation/POS/keyword/NER collaborator.
///
/// Contract: the tokens returned by `segment` must tile the input (their
/// surface forms concatenate back to the full text) so that char-level
/// projections line up. Implementations must be `Send + Sync`; the
/// pipeline shares one handle across worker threads.
pub trait Annotator: Send + Sync {
    /// Segment `text` into annotated tokens.
    fn segment(&self, text: &str) -> Vec<Token>;

    /// Named-entity spans of `text`, non-overlapping, ascending by start.
    fn entities(&self, text: &str) -> Vec<EntitySpan>;
}

/// Deterministic fallback annotator: every char is its own token.
///
/// POS tags are coarse character classes in the segmenter's tag alphabet
/// (`n` CJK, `m` digits, `eng` latin, `w` punctuation/space, `x` other);
/// nothing is a keyword and no entities are produced. Used when no real
/// segmenter handle is supplied, and as the test stub.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharAnnotator;

impl Annotator for CharAnnotator {
    fn segment(&self, text: &str) -> Vec<Token> {
        text.chars()
            .map(|c| Token {
                text: c.to_string(),
                pos: char_pos_tag(c).to_string(),
                keyword: false,
            })
            .collect()
    }

    fn entities(&self, _text: &str) -> Vec<EntitySpan> {
        Vec::new()
    }
}

fn char_pos_tag(c: char) -> &'static str {
    if ('\u{4e00}'..='\u{9fa5}').contains(&c) {
        "n"
    } else if c.is_ascii_digit() {
        "m"
    } else if c.is_ascii_alphabetic() {
        "eng"
    } else if c.is_whitespace() || c.is_ascii_punctuation() {
        "w"
    } else {
        "x"
    }
}

/// Shared default annotator handle, initialized on first use.
#[must_use]
pub fn default_annotator() -> &'static CharAnnotator {
    static HANDLE: Lazy<CharAnnotator> = Lazy::new(CharAnnotator::default);
    &HANDLE
}

/// Project token annotations onto char arrays.
///
/// Returns `(char_pos, char_kw, char_in_question)`, each with one entry
/// per char of the concatenated token surface forms.
#[must_use]
pub fn align_token_features(
    tokens: &[Token],
    question_vocab: &HashSet<String>,
) -> (Vec<String>, Vec<u8>, Vec<u8>) {
    let mut pos = Vec::new();
    let mut kw = Vec::new();
    let mut in_que = Vec::new();

    for token in tokens {
        let n = token.text.chars().count();
        let member = u8::from(question_vocab.contains(&token.text));
        for _ in 0..n {
            pos.push(token.pos.clone());
            kw.push(u8::from(token.keyword));
            in_que.push(member);
        }
    }

    (pos, kw, in_que)
}

/// Paint entity tags onto a char array; chars outside every span get an
/// empty tag. Tags of the common entity kinds are compressed to single
/// letters; unknown tags pass through unchanged.
#[must_use]
pub fn align_entities(char_len: usize, entities: &[EntitySpan]) -> Vec<String> {
    let mut out = vec![String::new(); char_len];
    for entity in entities {
        let tag = compress_tag(&entity.tag);
        for slot in out.iter_mut().skip(entity.start).take(entity.len) {
            *slot = tag.clone();
        }
    }
    out
}

fn compress_tag(tag: &str) -> String {
    match tag {
        "time" => "T".to_string(),
        "location" => "L".to_string(),
        "org" => "O".to_string(),
        "job" => "J".to_string(),
        "person" => "P".to_string(),
        "company" => "C".to_string(),
        other => other.to_string(),
    }
}

/// Sentence delimiters for the match-feature split.
const SENT_DELIMS: [char; 3] = ['，', '。', '！'];

/// Per-sentence distance features against the question, broadcast to one
/// value per content char (each sentence's score covers its chars plus
/// its trailing delimiter, when present).
#[must_use]
pub fn sentence_match_features(content: &[char], question: &[char]) -> MatchFeatures {
    let mut features = MatchFeatures::default();
    let mut sent_start = 0usize;

    let flush = |features: &mut MatchFeatures, sentence: &[char], span_len: usize| {
        let lev = distance::levenshtein_norm(sentence, question) as f32;
        let jac = distance::jaccard(sentence, question) as f32;
        let dic = distance::dice(sentence, question) as f32;
        let lmr = distance::longest_match_ratio(sentence, question) as f32;
        let f1 = distance::char_f1(sentence, question) as f32;
        for _ in 0..span_len {
            features.levenshtein_dist.push(lev);
            features.jaccard_coef.push(jac);
            features.dice_dist.push(dic);
            features.longest_match_ratio.push(lmr);
            features.f1_score.push(f1);
        }
    };

    for (i, &c) in content.iter().enumerate() {
        if SENT_DELIMS.contains(&c) {
            let sentence = &content[sent_start..i];
            flush(&mut features, sentence, sentence.len() + 1);
            sent_start = i + 1;
        }
    }
    if sent_start < content.len() {
        let sentence = &content[sent_start..];
        flush(&mut features, sentence, sentence.len());
    }

    features
}

/// Compute char-level features for a sample in place.
///
/// The question gets POS/keyword/entity arrays; every document with
/// content gets POS/keyword/in-question/entity arrays plus sentence-level
/// match features. Every produced array has exactly one entry per char.
pub fn gen_text_features(sample: &mut Sample, annotator: &dyn Annotator) {
    let question = sample.question.clone();
    let q_tokens = annotator.segment(&question);
    let question_vocab: HashSet<String> = q_tokens.iter().map(|t| t.text.clone()).collect();
    let q_chars: Vec<char> = question.chars().collect();

    let (pos, kw, _) = align_token_features(&q_tokens, &HashSet::new());
    sample.ques_char_pos = fit(pos, q_chars.len(), String::from("x"));
    sample.ques_char_kw = fit(kw, q_chars.len(), 0);
    sample.ques_char_entity = align_entities(q_chars.len(), &annotator.entities(&question));

    for doc in &mut sample.documents {
        if doc.content.is_empty() {
            continue;
        }
        let content_chars: Vec<char> = doc.content.chars().collect();
        let tokens = annotator.segment(&doc.content);

        let (pos, kw, in_que) = align_token_features(&tokens, &question_vocab);
        doc.char_pos = fit(pos, content_chars.len(), String::from("x"));
        doc.char_kw = fit(kw, content_chars.len(), 0);
        doc.char_in_que = fit(in_que, content_chars.len(), 0);
        doc.char_entity = align_entities(content_chars.len(), &annotator.entities(&doc.content));
        doc.match_features = Some(sentence_match_features(&content_chars, &q_chars));
    }
}

/// Pin an array to the expected char length. A tiling annotator already
/// produces the right length; this guards against one that drops or
/// merges characters.
fn fit<T: Clone>(mut values: Vec<T>, len: usize, pad: T) -> Vec<T> {
    if values.len() != len {
        log::warn!(
            "annotator produced {} char slots for {} chars; repairing",
            values.len(),
            len
        );
        values.resize(len, pad);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Document;

    #[test]
    fn test_char_annotator_tiles_text() {
        let text = "北京2024ok。";
        let tokens = CharAnnotator.segment(text);
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined, text);
        assert_eq!(tokens[0].pos, "n");
        assert_eq!(tokens[2].pos, "m");
        assert_eq!(tokens[6].pos, "eng");
    }

    #[test]
    fn test_align_token_features_broadcast() {
        let tokens = vec![
            Token {
                text: "北京".to_string(),
                pos: "ns".to_string(),
                keyword: true,
            },
            Token {
                text: "是".to_string(),
                pos: "v".to_string(),
                keyword: false,
            },
        ];
        let vocab: HashSet<String> = ["北京".to_string()].into_iter().collect();
        let (pos, kw, in_que) = align_token_features(&tokens, &vocab);
        assert_eq!(pos, vec!["ns", "ns", "v"]);
        assert_eq!(kw, vec![1, 1, 0]);
        assert_eq!(in_que, vec![1, 1, 0]);
    }

    #[test]
    fn test_align_entities_paint_and_compress() {
        let entities = vec![
            EntitySpan {
                start: 0,
                len: 2,
                tag: "location".to_string(),
            },
            EntitySpan {
                start: 3,
                len: 1,
                tag: "gene".to_string(),
            },
        ];
        let tags = align_entities(5, &entities);
        assert_eq!(tags, vec!["L", "L", "", "gene", ""]);
    }

    #[test]
    fn test_entity_span_clamped_to_len() {
        let entities = vec![EntitySpan {
            start: 3,
            len: 10,
            tag: "person".to_string(),
        }];
        let tags = align_entities(5, &entities);
        assert_eq!(tags, vec!["", "", "", "P", "P"]);
    }

    #[test]
    fn test_sentence_features_cover_every_char() {
        let content: Vec<char> = "北京是首都，上海是中心。结尾".chars().collect();
        let question: Vec<char> = "首都是哪里".chars().collect();
        let features = sentence_match_features(&content, &question);
        assert_eq!(features.levenshtein_dist.len(), content.len());
        assert_eq!(features.f1_score.len(), content.len());
        // Chars of one sentence share one broadcast value.
        assert_eq!(features.jaccard_coef[0], features.jaccard_coef[4]);
    }

    #[test]
    fn test_trailing_delimiter_covered() {
        let content: Vec<char> = "好。".chars().collect();
        let question: Vec<char> = "好".chars().collect();
        let features = sentence_match_features(&content, &question);
        assert_eq!(features.dice_dist.len(), 2);
    }

    #[test]
    fn test_gen_text_features_lengths() {
        let mut sample = Sample {
            question: "首都是哪里？".to_string(),
            documents: vec![Document {
                content: "北京是中国的首都。".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        gen_text_features(&mut sample, &CharAnnotator);

        assert_eq!(sample.ques_char_pos.len(), 6);
        let doc = &sample.documents[0];
        let n = doc.content.chars().count();
        assert_eq!(doc.char_pos.len(), n);
        assert_eq!(doc.char_kw.len(), n);
        assert_eq!(doc.char_in_que.len(), n);
        assert_eq!(doc.char_entity.len(), n);
        let mf = doc.match_features.as_ref().unwrap();
        assert_eq!(mf.levenshtein_dist.len(), n);
        // "首" and "都" occur in the question.
        let chars: Vec<char> = doc.content.chars().collect();
        let shou = chars.iter().position(|&c| c == '首').unwrap();
        assert_eq!(doc.char_in_que[shou], 1);
        assert_eq!(doc.char_in_que[0], 0);
    }
}
