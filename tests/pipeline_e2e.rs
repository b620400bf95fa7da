//! End-to-end pipeline tests: NDJSON in, NDJSON out, through files and
//! in-memory streams.

use std::io::{BufReader, Write};

use mrcprep::features::default_annotator;
use mrcprep::{
    process_stream, process_stream_parallel, AnswerLabel, FilterConfig, RankConfig, Sample, Stage,
    StageContext,
};

fn ctx() -> StageContext<'static> {
    StageContext {
        annotator: default_annotator(),
        rank: RankConfig::default(),
        filter: FilterConfig::default(),
    }
}

const TRAIN_LINE: &str = r#"{"question":"中国的首都是哪里？","documents":[{"title":"城市","paragraphs":["北京是中国的首都。上海是经济中心。"]}],"supporting_paragraph":"@content1@北京是中国的首都。@content1@","answer":"@content1@北京@content1@"}"#;

#[test]
fn reference_scenario_resolves_expected_label() {
    let input = format!("{TRAIN_LINE}\n");
    let mut output = Vec::new();
    let stats = process_stream(
        input.as_bytes(),
        &mut output,
        &[Stage::Label],
        &ctx(),
        |_| {},
    )
    .unwrap();
    assert_eq!(stats.written, 1);

    let sample: Sample = serde_json::from_slice(&output).unwrap();
    assert_eq!(sample.answer_labels, vec![AnswerLabel(0, 0, 1)]);
    assert_eq!(sample.fake_answers, vec!["北京".to_string()]);
    assert!((sample.ceil_rougel.unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn achievability_degrades_to_zero_when_answer_unlocatable() {
    let line = r#"{"question":"q","documents":[{"paragraphs":["北京是中国的首都。"]}],"supporting_paragraph":"@content1@北京是中国的首都。@content1@","answer":"@content1@xyzw@content1@"}"#;
    let mut output = Vec::new();
    process_stream(
        format!("{line}\n").as_bytes(),
        &mut output,
        &[Stage::Label],
        &ctx(),
        |_| {},
    )
    .unwrap();

    let sample: Sample = serde_json::from_slice(&output).unwrap();
    assert!(sample.answer_labels.is_empty());
    assert!(sample.fake_answers.is_empty());
    assert_eq!(sample.ceil_rougel, Some(0.0));
}

#[test]
fn inference_records_pass_through_without_labels() {
    let line = r#"{"question":"中国的首都是哪里？","documents":[{"paragraphs":["北京是中国的首都。"]}]}"#;
    let mut output = Vec::new();
    let stats = process_stream(
        format!("{line}\n").as_bytes(),
        &mut output,
        &Stage::all(),
        &ctx(),
        |_| {},
    )
    .unwrap();
    assert_eq!(stats.written, 1);

    let sample: Sample = serde_json::from_slice(&output).unwrap();
    assert!(sample.answer_labels.is_empty());
    assert!(sample.ceil_rougel.is_none());
    assert!(!sample.documents[0].content.is_empty());
}

#[test]
fn malformed_line_between_valid_records() {
    let input = format!("{TRAIN_LINE}\nnot json at all\n{TRAIN_LINE}\n");
    let mut output = Vec::new();
    let stats = process_stream(
        input.as_bytes(),
        &mut output,
        &[Stage::Label],
        &ctx(),
        |_| {},
    )
    .unwrap();

    assert_eq!(stats.read, 3);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.written, 2);
}

#[test]
fn unknown_fields_survive_the_whole_pipeline() {
    let line = r#"{"question":"中国的首都是哪里？","qid":"train_0007","documents":[{"paragraphs":["北京是中国的首都。"],"url":"http://x"}],"supporting_paragraph":"@content1@北京是中国的首都。@content1@","answer":"@content1@北京@content1@"}"#;
    let mut output = Vec::new();
    process_stream(
        format!("{line}\n").as_bytes(),
        &mut output,
        &Stage::all(),
        &ctx(),
        |_| {},
    )
    .unwrap();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["qid"], "train_0007");
    assert_eq!(value["documents"][0]["url"], "http://x");
}

#[test]
fn file_roundtrip_with_tempfile() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.jsonl");
    let out_path = dir.path().join("out.jsonl");

    let mut file = std::fs::File::create(&in_path).unwrap();
    for _ in 0..3 {
        writeln!(file, "{TRAIN_LINE}").unwrap();
    }
    drop(file);

    let reader = BufReader::new(std::fs::File::open(&in_path).unwrap());
    let writer = std::fs::File::create(&out_path).unwrap();
    let stats = process_stream(reader, writer, &Stage::all(), &ctx(), |_| {}).unwrap();
    assert_eq!(stats.written, 3);

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(contents.lines().count(), 3);
    for line in contents.lines() {
        let sample: Sample = serde_json::from_str(line).unwrap();
        assert_eq!(sample.answer_labels.len(), 1);
        for label in &sample.answer_labels {
            assert!(label.is_valid(&sample.documents));
        }
    }
}

#[test]
fn parallel_output_matches_sequential() {
    let mut input = String::new();
    for _ in 0..20 {
        input.push_str(TRAIN_LINE);
        input.push('\n');
    }

    let mut seq = Vec::new();
    process_stream(input.as_bytes(), &mut seq, &Stage::all(), &ctx(), |_| {}).unwrap();

    let mut par = Vec::new();
    let stats =
        process_stream_parallel(input.as_bytes(), &mut par, &Stage::all(), &ctx(), 4, |_| {})
            .unwrap();

    assert_eq!(stats.written, 20);
    assert_eq!(seq, par);
}

#[test]
fn rank_stage_trims_content_before_labeling() {
    // The relevant paragraph survives a tight budget; the label stage then
    // resolves against trimmed content.
    let line = r#"{"question":"首都是哪里","documents":[{"title":"题","paragraphs":["无关的填充文字很多很长。","北京是首都。"]}],"supporting_paragraph":"@content1@北京是首都。@content1@","answer":"@content1@北京@content1@"}"#;
    let ctx = StageContext {
        annotator: default_annotator(),
        rank: RankConfig {
            max_len: 8,
            ..Default::default()
        },
        filter: FilterConfig::default(),
    };

    let mut output = Vec::new();
    process_stream(
        format!("{line}\n").as_bytes(),
        &mut output,
        &[Stage::Clean, Stage::Rank, Stage::Label],
        &ctx,
        |_| {},
    )
    .unwrap();

    let sample: Sample = serde_json::from_slice(&output).unwrap();
    // The irrelevant paragraph was dropped: content is just the kept text.
    assert_eq!(sample.documents[0].content, "北京是首都。");
    assert_eq!(sample.answer_labels, vec![AnswerLabel(0, 0, 1)]);
}
