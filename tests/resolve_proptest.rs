//! Property tests for the resolution pipeline: whatever the annotations
//! look like, emitted labels index real documents and stay inside their
//! content, and ceilings stay bounded.

use proptest::prelude::*;

use mrcprep::resolve::resolve;
use mrcprep::sample::{Document, Sample};

/// Short CJK-ish fragments drawn from a small alphabet so that overlap
/// between documents and annotations actually happens.
fn cjk_text(max: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            Just('北'),
            Just('京'),
            Just('上'),
            Just('海'),
            Just('是'),
            Just('的'),
            Just('首'),
            Just('都'),
            Just('中'),
            Just('心'),
            Just('。'),
        ],
        1..max,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn sample_strategy() -> impl Strategy<Value = Sample> {
    (
        proptest::collection::vec(cjk_text(30), 1..4),
        cjk_text(10),
        cjk_text(6),
        1usize..5,
        1usize..5,
    )
        .prop_map(|(contents, sup_frag, ans_frag, sup_doc, ans_doc)| {
            let documents: Vec<Document> = contents
                .into_iter()
                .map(|content| Document {
                    content,
                    ..Default::default()
                })
                .collect();
            // Marker ids may or may not reference a real document;
            // resolution must tolerate both.
            Sample {
                question: "问".to_string(),
                documents,
                supporting_paragraph: Some(format!(
                    "@content{sup_doc}@{sup_frag}@content{sup_doc}@"
                )),
                answer: Some(format!("@content{ans_doc}@{ans_frag}@content{ans_doc}@")),
                ..Default::default()
            }
        })
}

proptest! {
    #[test]
    fn labels_always_valid(sample in sample_strategy()) {
        let resolution = resolve(&sample);
        for label in &resolution.labels {
            prop_assert!(label.is_valid(&sample.documents), "invalid {label:?}");
        }
        prop_assert_eq!(resolution.labels.len(), resolution.fake_answers.len());
    }

    #[test]
    fn ceiling_bounded(sample in sample_strategy()) {
        let resolution = resolve(&sample);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&resolution.ceil_rougel));
        if resolution.labels.is_empty() {
            prop_assert_eq!(resolution.ceil_rougel, 0.0);
        }
    }

    #[test]
    fn fake_answers_are_document_slices(sample in sample_strategy()) {
        let resolution = resolve(&sample);
        for (label, fake) in resolution.labels.iter().zip(&resolution.fake_answers) {
            let content: Vec<char> = sample.documents[label.doc()].content.chars().collect();
            let sliced: String = content[label.start()..=label.end()].iter().collect();
            prop_assert_eq!(&sliced, fake);
        }
    }

    #[test]
    fn resolution_deterministic(sample in sample_strategy()) {
        let a = resolve(&sample);
        let b = resolve(&sample);
        prop_assert_eq!(a.labels, b.labels);
        prop_assert_eq!(a.ceil_rougel, b.ceil_rougel);
    }
}
