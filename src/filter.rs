//! Paragraph filtering: drop paragraphs unrelated to the query and
//! recover which surviving paragraphs support the answer.
//!
//! Runs between cleaning and ranking. Filtering is deliberately
//! conservative: it sheds paragraphs that share *nothing* with the query
//! before the quadratic span search runs, and leaves relevance ranking
//! to the ranker. After paragraphs move, the annotated supporting
//! fragments are re-anchored: for each fragment, the id of the paragraph
//! maximizing char recall over a two-paragraph window (previous +
//! current, since supporting sentences regularly straddle a paragraph
//! break) is recorded in `supported_para_ids`.

use crate::distance::char_f1;
use crate::markers;
use crate::sample::Sample;

/// Paragraph filtering configuration.
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// Paragraphs scoring at or below this against question + keyword
    /// are dropped. Zero drops only paragraphs with no overlap at all.
    pub threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

/// Char-level recall of `reference` inside `candidate` (clipped counts).
fn char_recall(candidate: &[char], reference: &[char]) -> f64 {
    use std::collections::HashMap;

    if candidate.is_empty() || reference.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<char, usize> = HashMap::new();
    for &c in candidate {
        *counts.entry(c).or_insert(0) += 1;
    }

    let mut same = 0usize;
    for c in reference {
        if let Some(n) = counts.get_mut(c) {
            if *n > 0 {
                *n -= 1;
                same += 1;
            }
        }
    }

    same as f64 / reference.len() as f64
}

/// Drop query-unrelated paragraphs, then re-anchor supporting fragments.
pub fn remove_unrelated_paras(sample: &mut Sample, cfg: &FilterConfig) {
    let query: Vec<char> = sample
        .question
        .chars()
        .chain(sample.keyword.chars())
        .collect();

    for doc in &mut sample.documents {
        doc.paragraphs.retain(|para| {
            let para_chars: Vec<char> = para.chars().collect();
            char_f1(&para_chars, &query) > cfg.threshold
        });
    }

    update_supported_para_ids(sample);
}

/// For each supporting fragment, record the id of the paragraph (within
/// its document) that best recalls the fragment text.
///
/// Uses a two-paragraph context window so a fragment spanning a paragraph
/// break still lands on the paragraph where it ends. Documents the
/// supporting annotation does not reference keep an empty id list.
pub fn update_supported_para_ids(sample: &mut Sample) {
    let Some(supporting) = sample.supporting_paragraph.clone() else {
        return;
    };

    for frag in markers::fragments(&supporting) {
        let Some(doc) = frag
            .doc_id
            .checked_sub(1)
            .and_then(|i| sample.documents.get_mut(i))
        else {
            log::debug!("supporting fragment references missing document {}", frag.doc_id);
            continue;
        };
        if doc.paragraphs.is_empty() {
            continue;
        }

        let frag_chars: Vec<char> = frag.text.chars().collect();
        let mut best_id = 0usize;
        let mut best_recall = -1.0f64;

        for (pid, para) in doc.paragraphs.iter().enumerate() {
            let mut window: Vec<char> = if pid > 0 {
                doc.paragraphs[pid - 1].chars().collect()
            } else {
                Vec::new()
            };
            window.extend(para.chars());

            let recall = char_recall(&window, &frag_chars);
            if recall > best_recall {
                best_recall = recall;
                best_id = pid;
            }
        }

        if !doc.supported_para_ids.contains(&best_id) {
            doc.supported_para_ids.push(best_id);
        }
    }

    for doc in &mut sample.documents {
        doc.supported_para_ids.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Document;

    fn sample_with(paragraphs: &[&str], supporting: Option<&str>) -> Sample {
        Sample {
            question: "北京的首都地位".to_string(),
            documents: vec![Document {
                paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }],
            supporting_paragraph: supporting.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_unrelated_paragraph_dropped() {
        let mut sample = sample_with(
            &["北京是中国的首都。", "abcdefg hijk"],
            None,
        );
        remove_unrelated_paras(&mut sample, &FilterConfig::default());
        assert_eq!(
            sample.documents[0].paragraphs,
            vec!["北京是中国的首都。".to_string()]
        );
    }

    #[test]
    fn test_related_paragraphs_survive() {
        let mut sample = sample_with(&["北京是首都。", "首都地位重要。"], None);
        remove_unrelated_paras(&mut sample, &FilterConfig::default());
        assert_eq!(sample.documents[0].paragraphs.len(), 2);
    }

    #[test]
    fn test_supported_para_id_recovered() {
        let mut sample = sample_with(
            &["无关的开头段落之一。", "北京是中国的首都。"],
            Some("@content1@北京是中国的首都@content1@"),
        );
        update_supported_para_ids(&mut sample);
        assert_eq!(sample.documents[0].supported_para_ids, vec![1]);
    }

    #[test]
    fn test_fragment_straddling_paragraph_break() {
        // The fragment covers the end of para 0 and the start of para 1;
        // the window anchors it on para 1.
        let mut sample = sample_with(
            &["答案的前半部分在这里", "后半部分在此结束。"],
            Some("@content1@在这里后半部分@content1@"),
        );
        update_supported_para_ids(&mut sample);
        assert_eq!(sample.documents[0].supported_para_ids, vec![1]);
    }

    #[test]
    fn test_missing_document_id_ignored() {
        let mut sample = sample_with(
            &["北京是首都。"],
            Some("@content7@北京@content7@"),
        );
        update_supported_para_ids(&mut sample);
        assert!(sample.documents[0].supported_para_ids.is_empty());
    }

    #[test]
    fn test_ids_sorted_and_deduped() {
        let mut sample = sample_with(
            &["甲段北京。", "乙段首都。"],
            Some("@content1@首都@content1@@content1@北京@content1@@content1@首都@content1@"),
        );
        update_supported_para_ids(&mut sample);
        let ids = &sample.documents[0].supported_para_ids;
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
