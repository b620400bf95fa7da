//! Streaming NDJSON pipeline driver.
//!
//! One JSON record per line in, one per line out. The stream is never
//! buffered whole: each record is parsed, pushed through the requested
//! stages, and written before the next is read, so corpora of any size
//! stream in constant memory.
//!
//! Failure policy mirrors the stage semantics: a line that is not a JSON
//! object (the corpus interleaves progress chatter with records) is
//! skipped; a record that fails to parse is logged and skipped; a record
//! whose annotations do not resolve still comes out the other side with
//! empty labels. Nothing below the I/O layer aborts the stream.
//!
//! Samples are independent, so the driver also offers a bounded-batch
//! parallel mode: read a batch, fan out over a rayon pool of stateless
//! workers, write results in order, repeat. Memory stays bounded by the
//! batch size.

use std::io::{BufRead, Write};

use rayon::prelude::*;

use crate::clean::clean_sample;
use crate::error::{Error, Result};
use crate::features::{gen_text_features, Annotator};
use crate::filter::{remove_unrelated_paras, FilterConfig};
use crate::paragraph::{extract_paragraphs, RankConfig};
use crate::resolve::gen_mrc_dataset;
use crate::sample::Sample;

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Text cleaning.
    Clean,
    /// Unrelated-paragraph removal and supported-paragraph recovery.
    Filter,
    /// Paragraph selection under the token budget.
    Rank,
    /// Content concatenation and answer-label resolution.
    Label,
    /// Char-level feature alignment.
    Features,
}

impl Stage {
    /// All stages, in pipeline order.
    #[must_use]
    pub const fn all() -> [Stage; 5] {
        [
            Stage::Clean,
            Stage::Filter,
            Stage::Rank,
            Stage::Label,
            Stage::Features,
        ]
    }
}

/// Shared per-worker context: the annotator handle and stage
/// configuration.
pub struct StageContext<'a> {
    /// Segmenter/NER resource handle, one per worker pool.
    pub annotator: &'a dyn Annotator,
    /// Paragraph selection configuration.
    pub rank: RankConfig,
    /// Paragraph filtering configuration.
    pub filter: FilterConfig,
}

/// Apply one stage to a sample in place.
pub fn apply_stage(sample: &mut Sample, stage: Stage, ctx: &StageContext<'_>) {
    match stage {
        Stage::Clean => clean_sample(sample),
        Stage::Filter => remove_unrelated_paras(sample, &ctx.filter),
        Stage::Rank => extract_paragraphs(sample, ctx.annotator, &ctx.rank),
        Stage::Label => gen_mrc_dataset(sample),
        Stage::Features => gen_text_features(sample, ctx.annotator),
    }
}

/// Apply stages in order.
pub fn apply_stages(sample: &mut Sample, stages: &[Stage], ctx: &StageContext<'_>) {
    for &stage in stages {
        apply_stage(sample, stage, ctx);
    }
}

/// Counters for one stream run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Lines read.
    pub read: usize,
    /// Lines skipped (non-records and parse failures).
    pub skipped: usize,
    /// Records written.
    pub written: usize,
}

fn process_line(line: &str, stages: &[Stage], ctx: &StageContext<'_>) -> Option<String> {
    let mut sample: Sample = match serde_json::from_str(line) {
        Ok(sample) => sample,
        Err(err) => {
            log::warn!("skipping unparseable record: {err}");
            return None;
        }
    };

    apply_stages(&mut sample, stages, ctx);

    match serde_json::to_string(&sample) {
        Ok(json) => Some(json),
        Err(err) => {
            log::warn!("skipping unserializable record: {err}");
            None
        }
    }
}

/// Stream records through the pipeline, one at a time.
///
/// `on_record` is called after every line with the running counters
/// (progress reporting hook).
pub fn process_stream<R, W, F>(
    reader: R,
    mut writer: W,
    stages: &[Stage],
    ctx: &StageContext<'_>,
    mut on_record: F,
) -> Result<StreamStats>
where
    R: BufRead,
    W: Write,
    F: FnMut(&StreamStats),
{
    let mut stats = StreamStats::default();

    for line in reader.lines() {
        let line = line?;
        stats.read += 1;

        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            stats.skipped += 1;
            on_record(&stats);
            continue;
        }

        match process_line(trimmed, stages, ctx) {
            Some(json) => {
                writeln!(writer, "{json}")?;
                stats.written += 1;
            }
            None => stats.skipped += 1,
        }
        on_record(&stats);
    }

    writer.flush()?;
    Ok(stats)
}

/// Stream records through the pipeline with bounded-batch parallelism.
///
/// Reads up to `batch_size` records, processes them on the rayon pool,
/// writes results in input order, repeats. Samples share no state, so
/// workers need no synchronization; output order is preserved per batch.
pub fn process_stream_parallel<R, W, F>(
    reader: R,
    mut writer: W,
    stages: &[Stage],
    ctx: &StageContext<'_>,
    batch_size: usize,
    mut on_record: F,
) -> Result<StreamStats>
where
    R: BufRead,
    W: Write,
    F: FnMut(&StreamStats),
{
    if batch_size == 0 {
        return Err(Error::invalid_input("batch_size must be positive"));
    }

    let mut stats = StreamStats::default();
    let mut lines = reader.lines();

    loop {
        let mut batch: Vec<String> = Vec::with_capacity(batch_size);
        for line in lines.by_ref() {
            let line = line?;
            stats.read += 1;

            let trimmed = line.trim();
            if !trimmed.starts_with('{') {
                stats.skipped += 1;
                continue;
            }
            batch.push(trimmed.to_string());
            if batch.len() == batch_size {
                break;
            }
        }
        if batch.is_empty() {
            break;
        }

        let results: Vec<Option<String>> = batch
            .par_iter()
            .map(|line| process_line(line, stages, ctx))
            .collect();

        for result in results {
            match result {
                Some(json) => {
                    writeln!(writer, "{json}")?;
                    stats.written += 1;
                }
                None => stats.skipped += 1,
            }
            on_record(&stats);
        }
    }

    writer.flush()?;
    Ok(stats)
}
