//! Paragraph selection under a token budget.
//!
//! Retrieved documents are far longer than a transformer's input window.
//! This stage scores every paragraph (and the title) against the query,
//! keeps the most relevant ones that fit a total length budget, truncates
//! the first paragraph that would overflow so the budget is filled
//! exactly, and restores the survivors to original document order.
//! Relevance ordering is a *selection* device only; the passage must read
//! in document order or downstream offsets become meaningless.
//!
//! ```text
//! paragraphs  p0(0.1)  p1(0.9)  p2(0.4)  p3(0.7)
//!             sort by (-score, len):  p1 p3 p2 p0
//!             budget fill:            p1 p3 [p2 truncated]    p0 dropped
//!             restore order:          p1 p3 (ascending id)
//!             passage: title <splitter> p1 <splitter> p3 <splitter> p2'
//! ```
//!
//! The truncated paragraph is always appended after the fully-kept ones;
//! order restoration applies to the fully-kept set.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::features::Annotator;
use crate::metrics;
use crate::sample::Sample;

/// Token separating passage segments.
pub const SPLITTER: &str = "<splitter>";

/// Paragraph selection configuration.
#[derive(Debug, Clone)]
pub struct RankConfig {
    /// Token budget for the whole passage, title and splitters included.
    pub max_len: usize,
    /// Separator token between segments.
    pub splitter: String,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            max_len: 1024,
            splitter: SPLITTER.to_string(),
        }
    }
}

/// Sort key for one paragraph: higher score first, shorter first on ties
/// (shorter paragraphs economize the budget). The sort is stable, so
/// fully tied paragraphs keep document order.
#[derive(Debug, Clone, Copy)]
struct ParaInfo {
    score: f64,
    len: usize,
    index: usize,
}

/// Which paragraphs survive selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPlan {
    /// Fully kept paragraph ids, ascending (original document order).
    pub kept: Vec<usize>,
    /// `(paragraph id, kept token count)` for the overflow paragraph,
    /// appended after the kept ones. `None` when everything fit or the
    /// budget was already exhausted.
    pub truncated: Option<(usize, usize)>,
}

/// Plan the greedy budget fill.
///
/// Every segment costs its token length plus one splitter; the title is
/// always charged first. Paragraphs are taken in `(-score, len)` order
/// until one would overflow; that one is cut to exactly fill the
/// remaining budget and everything after it is discarded. When
/// `max_len` is smaller than the title alone, the plan is empty and the
/// passage degrades to the bare title; the minimum passage is always
/// the title, never an error.
#[must_use]
pub fn plan_selection(
    title_len: usize,
    para_lens: &[usize],
    scores: &[f64],
    max_len: usize,
) -> SelectionPlan {
    let mut infos: Vec<ParaInfo> = para_lens
        .iter()
        .zip(scores)
        .enumerate()
        .map(|(index, (&len, &score))| ParaInfo { score, len, index })
        .collect();
    infos.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.len.cmp(&b.len))
    });

    let mut kept = Vec::new();
    let mut truncated = None;
    let mut used = title_len + 1;

    for info in &infos {
        if used + info.len + 1 <= max_len {
            used += info.len + 1;
            kept.push(info.index);
        } else {
            // The final segment's trailing splitter is removed at
            // concatenation, so a cut of (max_len - used) tokens lands the
            // passage exactly on the budget.
            let keep = max_len.saturating_sub(used);
            if keep > 0 {
                truncated = Some((info.index, keep.min(info.len)));
            }
            break;
        }
    }

    kept.sort_unstable();
    SelectionPlan { kept, truncated }
}

/// Concatenate one feature column according to a plan: title column, kept
/// paragraph columns in order, then the truncated paragraph's prefix,
/// each followed by `pad`; the trailing pad is dropped.
#[must_use]
pub fn project_column<T: Clone>(
    title: &[T],
    paras: &[Vec<T>],
    plan: &SelectionPlan,
    pad: &T,
) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();

    out.extend_from_slice(title);
    out.push(pad.clone());

    for &id in &plan.kept {
        if let Some(col) = paras.get(id) {
            out.extend_from_slice(col);
            out.push(pad.clone());
        }
    }
    if let Some((id, cut)) = plan.truncated {
        if let Some(col) = paras.get(id) {
            out.extend_from_slice(&col[..cut.min(col.len())]);
            out.push(pad.clone());
        }
    }

    out.pop();
    out
}

/// Run paragraph selection over every document of a sample, with the
/// default relevance scorer (mean of token F1 and BLEU-4).
pub fn extract_paragraphs(sample: &mut Sample, annotator: &dyn Annotator, cfg: &RankConfig) {
    extract_paragraphs_with(sample, annotator, cfg, metrics::para_match_score);
}

/// Run paragraph selection with a caller-supplied relevance scorer
/// `(candidate_tokens, query_tokens) -> score`.
///
/// Pre-segmented fields (`segmented_question`, `segmented_paragraphs`,
/// aligned POS/keyword columns) are used when present; otherwise the
/// annotator segments on the fly. After selection each document's
/// `paragraphs` is rewritten to the kept texts (truncation applied), so
/// the later label stage concatenates trimmed content.
pub fn extract_paragraphs_with<F>(
    sample: &mut Sample,
    annotator: &dyn Annotator,
    cfg: &RankConfig,
    score: F,
) where
    F: Fn(&[String], &[String]) -> f64,
{
    let question_tokens: Vec<String> = if sample.segmented_question.is_empty() {
        annotator
            .segment(&sample.question)
            .into_iter()
            .map(|t| t.text)
            .collect()
    } else {
        sample.segmented_question.clone()
    };
    let question_vocab: HashSet<&str> = question_tokens.iter().map(String::as_str).collect();

    for doc in &mut sample.documents {
        // Token views of title and paragraphs, derived once.
        let (seg_title, pos_title, kw_title) = if doc.segmented_title.is_empty() {
            let tokens = annotator.segment(&doc.title);
            let pos: Vec<String> = tokens.iter().map(|t| t.pos.clone()).collect();
            let kw: Vec<u8> = tokens.iter().map(|t| u8::from(t.keyword)).collect();
            (
                tokens.into_iter().map(|t| t.text).collect::<Vec<_>>(),
                pos,
                kw,
            )
        } else {
            let seg = doc.segmented_title.clone();
            let pos = column_or(&doc.pos_title, seg.len(), "x");
            let kw = flags_or(&doc.keyword_title, seg.len());
            (seg, pos, kw)
        };

        let (seg_paras, pos_paras, kw_paras) = if doc.segmented_paragraphs.is_empty() {
            let mut seg = Vec::with_capacity(doc.paragraphs.len());
            let mut pos = Vec::with_capacity(doc.paragraphs.len());
            let mut kw = Vec::with_capacity(doc.paragraphs.len());
            for para in &doc.paragraphs {
                let tokens = annotator.segment(para);
                pos.push(tokens.iter().map(|t| t.pos.clone()).collect::<Vec<_>>());
                kw.push(tokens.iter().map(|t| u8::from(t.keyword)).collect::<Vec<_>>());
                seg.push(tokens.into_iter().map(|t| t.text).collect::<Vec<_>>());
            }
            (seg, pos, kw)
        } else {
            let seg = doc.segmented_paragraphs.clone();
            let pos: Vec<Vec<String>> = seg
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    column_or(
                        doc.pos_paragraphs.get(i).map_or(&[][..], Vec::as_slice),
                        s.len(),
                        "x",
                    )
                })
                .collect();
            let kw: Vec<Vec<u8>> = seg
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    flags_or(
                        doc.keyword_paragraphs.get(i).map_or(&[][..], Vec::as_slice),
                        s.len(),
                    )
                })
                .collect();
            (seg, pos, kw)
        };

        let wiq_title: Vec<u8> = if doc.title_word_in_question.len() == seg_title.len() {
            doc.title_word_in_question.clone()
        } else {
            membership(&seg_title, &question_vocab)
        };
        let wiq_paras: Vec<Vec<u8>> = seg_paras
            .iter()
            .enumerate()
            .map(|(i, s)| {
                match doc.paragraphs_word_in_question.get(i) {
                    Some(col) if col.len() == s.len() => col.clone(),
                    _ => membership(s, &question_vocab),
                }
            })
            .collect();

        // Score, plan, project.
        let title_score = score(&seg_title, &question_tokens);
        let para_scores: Vec<f64> = seg_paras.iter().map(|p| score(p, &question_tokens)).collect();
        let para_lens: Vec<usize> = seg_paras.iter().map(Vec::len).collect();

        let plan = plan_selection(seg_title.len(), &para_lens, &para_scores, cfg.max_len);

        doc.segmented_passage = project_column(&seg_title, &seg_paras, &plan, &cfg.splitter);
        doc.pos_passage = project_column(&pos_title, &pos_paras, &plan, &cfg.splitter);
        doc.keyword_passage = project_column(&kw_title, &kw_paras, &plan, &0);
        doc.passage_word_in_question = project_column(&wiq_title, &wiq_paras, &plan, &0);

        let mut segment_scores = vec![title_score];
        segment_scores.extend(plan.kept.iter().map(|&id| para_scores[id]));
        if let Some((id, cut)) = plan.truncated {
            segment_scores.push(score(&seg_paras[id][..cut], &question_tokens));
        }

        let most_related = segment_scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .map_or(0, |(i, _)| i);
        doc.most_related_para_id = Some(most_related);
        doc.paragraph_match_scores = segment_scores;
        doc.title_len = Some(seg_title.len());

        // Rewrite paragraphs to the kept texts so the label stage
        // concatenates trimmed content; rebuild from tokens so the text
        // agrees with the token-level cut.
        let mut kept_texts: Vec<String> = plan.kept.iter().map(|&id| seg_paras[id].concat()).collect();
        if let Some((id, cut)) = plan.truncated {
            kept_texts.push(seg_paras[id][..cut].concat());
        }
        doc.paragraphs = kept_texts;

        // Consumed token-level inputs are dropped; the passage carries
        // the surviving information.
        doc.segmented_title = Vec::new();
        doc.segmented_paragraphs = Vec::new();
        doc.pos_title = Vec::new();
        doc.pos_paragraphs = Vec::new();
        doc.keyword_title = Vec::new();
        doc.keyword_paragraphs = Vec::new();
        doc.title_word_in_question = Vec::new();
        doc.paragraphs_word_in_question = Vec::new();
    }
}

fn membership(tokens: &[String], vocab: &HashSet<&str>) -> Vec<u8> {
    tokens
        .iter()
        .map(|t| u8::from(vocab.contains(t.as_str())))
        .collect()
}

fn column_or(col: &[String], len: usize, default: &str) -> Vec<String> {
    if col.len() == len {
        col.to_vec()
    } else {
        vec![default.to_string(); len]
    }
}

fn flags_or(col: &[u8], len: usize) -> Vec<u8> {
    if col.len() == len {
        col.to_vec()
    } else {
        vec![0; len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_plan_keeps_highest_scores() {
        // Budget: title(1) + 1 + two paras of 3 tokens (+1 each) = 10.
        let plan = plan_selection(1, &[3, 3, 3], &[0.1, 0.9, 0.5], 10);
        assert_eq!(plan.kept, vec![1, 2]);
        // Third para (score 0.1) overflows: remaining = 10 - 10 = 0.
        assert_eq!(plan.truncated, None);
    }

    #[test]
    fn test_plan_truncates_overflow() {
        let plan = plan_selection(2, &[4, 6], &[0.9, 0.8], 10);
        // used = 2+1, +4+1 = 8 after p0; p1 would need 7 more.
        assert_eq!(plan.kept, vec![0]);
        assert_eq!(plan.truncated, Some((1, 2)));
    }

    #[test]
    fn test_plan_tie_prefers_shorter() {
        let plan = plan_selection(1, &[5, 2], &[0.5, 0.5], 5);
        // Same score: shorter paragraph ranks first and fits (1+1+2+1=5).
        assert_eq!(plan.kept, vec![1]);
    }

    #[test]
    fn test_plan_restores_original_order() {
        let plan = plan_selection(1, &[2, 2, 2], &[0.2, 0.9, 0.5], 100);
        assert_eq!(plan.kept, vec![0, 1, 2]);
    }

    #[test]
    fn test_oversized_single_paragraph_still_included() {
        let plan = plan_selection(2, &[50], &[0.9], 10);
        assert!(plan.kept.is_empty());
        assert_eq!(plan.truncated, Some((0, 7)));
    }

    #[test]
    fn test_budget_below_title_degrades_to_title() {
        let plan = plan_selection(20, &[5], &[0.9], 10);
        assert!(plan.kept.is_empty());
        assert_eq!(plan.truncated, None);
    }

    #[test]
    fn test_project_column_splitters() {
        let title = toks(&["标题"]);
        let paras = vec![toks(&["甲", "乙"]), toks(&["丙"])];
        let plan = SelectionPlan {
            kept: vec![0, 1],
            truncated: None,
        };
        let pad = SPLITTER.to_string();
        let passage = project_column(&title, &paras, &plan, &pad);
        assert_eq!(passage, toks(&["标题", SPLITTER, "甲", "乙", SPLITTER, "丙"]));
    }

    #[test]
    fn test_project_column_truncated_appended_last() {
        let title = toks(&["t"]);
        let paras = vec![toks(&["a", "b", "c"]), toks(&["d"])];
        let plan = SelectionPlan {
            kept: vec![1],
            truncated: Some((0, 2)),
        };
        let pad = SPLITTER.to_string();
        let passage = project_column(&title, &paras, &plan, &pad);
        assert_eq!(passage, toks(&["t", SPLITTER, "d", SPLITTER, "a", "b"]));
    }

    #[test]
    fn test_passage_len_never_exceeds_budget() {
        for max_len in 3..30 {
            let title = toks(&["t", "i"]);
            let paras = vec![
                toks(&["a", "b", "c", "d", "e"]),
                toks(&["f", "g"]),
                toks(&["h", "i", "j", "k"]),
            ];
            let lens: Vec<usize> = paras.iter().map(Vec::len).collect();
            let plan = plan_selection(title.len(), &lens, &[0.3, 0.9, 0.6], max_len);
            let passage = project_column(&title, &paras, &plan, &SPLITTER.to_string());
            assert!(
                passage.len() <= max_len.max(title.len()),
                "max_len={max_len} produced {} tokens",
                passage.len()
            );
        }
    }
}
