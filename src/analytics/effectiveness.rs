use std::collections::HashMap;

use tracing::debug;

use crate::model::{EffectivenessEntry, Question};

use super::frequency::{FrequencyEntry, FrequencyTable};
use super::tally::{RelationTally, tally_relations};

#[derive(Copy, Clone, Debug, Default)]
struct RelationTotals {
    gt: RelationTally,
    response: RelationTally,
}

/// Global effectiveness entries in frequency-rank order, addressable by
/// chunk identity key.
#[derive(Debug, Default)]
pub struct EffectivenessTable {
    entries: Vec<EffectivenessEntry>,
    index: HashMap<String, usize>,
}

impl EffectivenessTable {
    pub fn aggregate(questions: &[Question]) -> Self {
        let frequency = FrequencyTable::build(questions);
        let totals = accumulate_relations(questions);
        let total_unique_chunks = frequency.len();

        let mut entries = Vec::with_capacity(total_unique_chunks);
        let mut index = HashMap::with_capacity(total_unique_chunks);
        for entry in frequency.iter() {
            let relations = totals.get(&entry.key).copied().unwrap_or_default();
            index.insert(entry.key.clone(), entries.len());
            entries.push(merge_entry(entry, &relations, total_unique_chunks));
        }

        debug!(
            unique_chunks = total_unique_chunks,
            related_chunks = totals.len(),
            "aggregated global chunk effectiveness"
        );

        Self { entries, index }
    }

    pub fn get(&self, key: &str) -> Option<&EffectivenessEntry> {
        self.index.get(key).map(|position| &self.entries[*position])
    }

    pub fn ranked(&self) -> &[EffectivenessEntry] {
        &self.entries
    }

    pub fn total_unique_chunks(&self) -> usize {
        self.entries.len()
    }
}

fn accumulate_relations(questions: &[Question]) -> HashMap<String, RelationTotals> {
    let mut totals = HashMap::<String, RelationTotals>::new();

    for question in questions {
        let chunks = question.chunks();
        let gt = tally_relations(question.retrieved2answer.as_ref(), chunks.len());
        let response = tally_relations(question.retrieved2response.as_ref(), chunks.len());

        for ((chunk, gt), response) in chunks.iter().zip(&gt).zip(&response) {
            let entry = totals.entry(chunk.identity_key()).or_default();
            entry.gt.absorb(gt);
            entry.response.absorb(response);
        }
    }

    totals
}

fn merge_entry(
    frequency: &FrequencyEntry,
    relations: &RelationTotals,
    total_unique_chunks: usize,
) -> EffectivenessEntry {
    EffectivenessEntry {
        doc_id: frequency.doc_id.clone(),
        text: frequency.text.clone(),
        total_appearances: frequency.total_appearances,
        questions_appeared: frequency.questions_appeared.clone(),
        frequency_rank: frequency.frequency_rank,
        total_unique_chunks,
        gt_entailments: relations.gt.entailments,
        gt_neutrals: relations.gt.neutrals,
        gt_contradictions: relations.gt.contradictions,
        gt_total_relations: relations.gt.total,
        response_entailments: relations.response.entailments,
        response_neutrals: relations.response.neutrals,
        response_contradictions: relations.response.contradictions,
        response_total_relations: relations.response.total,
        gt_entailment_rate: entailment_rate(&relations.gt),
        response_entailment_rate: entailment_rate(&relations.response),
    }
}

pub(super) fn entailment_rate(tally: &RelationTally) -> f64 {
    let rate = tally.entailments as f64 / tally.total.max(1) as f64;
    round_to_thousandths(rate)
}

/// Decimal formatting works from the exact binary value and breaks ties to
/// even, so 0.0625 becomes 0.062 rather than 0.063.
fn round_to_thousandths(value: f64) -> f64 {
    format!("{value:.3}").parse().unwrap_or(value)
}
