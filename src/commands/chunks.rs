use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::analytics::derive;
use crate::cli::{ChunkSort, ChunksArgs};
use crate::model::{EffectivenessEntry, Run};
use crate::util::write_json_stdout;

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Serialize)]
struct ChunksResponse<'a> {
    source: &'a str,
    sort_by: &'static str,
    limit: usize,
    returned: usize,
    total_unique_chunks: usize,
    chunks: Vec<&'a EffectivenessEntry>,
}

pub fn run(args: ChunksArgs) -> Result<()> {
    let loaded = super::load_source(&args.source)?;
    let run = Run::from_value(loaded.value)
        .with_context(|| format!("failed to parse run {}", loaded.source))?;
    let derived = derive(run);

    let limit = usize::try_from(args.limit).context("limit does not fit in usize")?;
    let mut chunks = derived.effectiveness.ranked().iter().collect::<Vec<_>>();
    sort_chunks(&mut chunks, args.sort_by);
    chunks.truncate(limit);

    info!(
        sort_by = args.sort_by.as_str(),
        returned = chunks.len(),
        "chunk report ready"
    );

    if args.json {
        let response = ChunksResponse {
            source: &loaded.source,
            sort_by: args.sort_by.as_str(),
            limit,
            returned: chunks.len(),
            total_unique_chunks: derived.effectiveness.total_unique_chunks(),
            chunks,
        };
        return write_json_stdout(&response, true);
    }

    write_text_report(&loaded.source, derived.effectiveness.total_unique_chunks(), &chunks)
}

/// Frequency order is the rank order itself; the other orders are descending
/// and fall back to rank.
fn sort_chunks(chunks: &mut [&EffectivenessEntry], sort_by: ChunkSort) {
    match sort_by {
        ChunkSort::Frequency => {
            chunks.sort_by_key(|entry| entry.frequency_rank);
        }
        ChunkSort::GtRate => chunks.sort_by(|left, right| {
            right
                .gt_entailment_rate
                .total_cmp(&left.gt_entailment_rate)
                .then(left.frequency_rank.cmp(&right.frequency_rank))
        }),
        ChunkSort::ResponseRate => chunks.sort_by(|left, right| {
            right
                .response_entailment_rate
                .total_cmp(&left.response_entailment_rate)
                .then(left.frequency_rank.cmp(&right.frequency_rank))
        }),
        ChunkSort::Contradictions => chunks.sort_by(|left, right| {
            let left_total = left.gt_contradictions + left.response_contradictions;
            let right_total = right.gt_contradictions + right.response_contradictions;
            right_total
                .cmp(&left_total)
                .then(left.frequency_rank.cmp(&right.frequency_rank))
        }),
    }
}

fn write_text_report(
    source: &str,
    total_unique_chunks: usize,
    chunks: &[&EffectivenessEntry],
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Run: {source}")?;
    writeln!(
        output,
        "Unique chunks: {total_unique_chunks} (showing {})",
        chunks.len()
    )?;

    for entry in chunks {
        writeln!(
            output,
            "{}.\tappearances={} questions={} gt_rate={:.3} response_rate={:.3}\t{}",
            entry.frequency_rank,
            entry.total_appearances,
            entry.questions_appeared.len(),
            entry.gt_entailment_rate,
            entry.response_entailment_rate,
            entry.doc_id,
        )?;
        writeln!(
            output,
            "\tcontradictions gt={} response={}",
            entry.gt_contradictions, entry.response_contradictions
        )?;
        writeln!(output, "\ttext: {}", text_preview(&entry.text))?;
    }

    output.flush()?;
    Ok(())
}

fn text_preview(text: &str) -> String {
    let condensed = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    if condensed.chars().count() <= PREVIEW_CHARS {
        return condensed;
    }
    let mut preview = condensed.chars().take(PREVIEW_CHARS).collect::<String>();
    preview.push_str("...");
    preview
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ranked_entries() -> Vec<EffectivenessEntry> {
        let run = Run::from_value(json!({
            "results": [
                {
                    "query_id": "q1",
                    "retrieved_context": [
                        {"doc_id": "popular", "text": "often retrieved"},
                        {"doc_id": "faithful", "text": "always supports"}
                    ],
                    "retrieved2answer": [["Neutral", "Contradiction"], ["Entailment"]],
                    "retrieved2response": [["Contradiction"], ["Entailment"]]
                },
                {
                    "query_id": "q2",
                    "retrieved_context": [{"doc_id": "popular", "text": "often retrieved"}],
                    "retrieved2answer": [["Entailment"]]
                }
            ]
        }))
        .expect("run parses");
        derive(run).effectiveness.ranked().to_vec()
    }

    #[test]
    fn sort_chunks_by_frequency_keeps_rank_order() {
        let entries = ranked_entries();
        let mut chunks = entries.iter().rev().collect::<Vec<_>>();

        sort_chunks(&mut chunks, ChunkSort::Frequency);
        assert_eq!(chunks[0].doc_id, "popular");
        assert_eq!(chunks[1].doc_id, "faithful");
    }

    #[test]
    fn sort_chunks_by_rate_and_contradictions() {
        let entries = ranked_entries();
        let mut chunks = entries.iter().collect::<Vec<_>>();

        sort_chunks(&mut chunks, ChunkSort::GtRate);
        assert_eq!(chunks[0].doc_id, "faithful");
        assert_eq!(chunks[1].gt_entailment_rate, 0.333);

        sort_chunks(&mut chunks, ChunkSort::Contradictions);
        assert_eq!(chunks[0].doc_id, "popular");

        sort_chunks(&mut chunks, ChunkSort::ResponseRate);
        assert_eq!(chunks[0].doc_id, "faithful");
    }

    #[test]
    fn text_preview_condenses_whitespace_and_truncates() {
        assert_eq!(text_preview("  two\n\twords "), "two words");

        let long = "word ".repeat(40);
        let preview = text_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }
}
