use serde_json::Value;

use crate::model::{RelationLabel, RelationMatrix};

/// Only recognized labels are counted, so `total` is always the sum of the
/// three named counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct RelationTally {
    pub(super) entailments: usize,
    pub(super) neutrals: usize,
    pub(super) contradictions: usize,
    pub(super) total: usize,
}

impl RelationTally {
    pub(super) fn from_labels(labels: &[Value]) -> Self {
        let mut tally = Self::default();
        for label in labels.iter().filter_map(RelationLabel::parse) {
            tally.record(label);
        }
        tally
    }

    fn record(&mut self, label: RelationLabel) {
        match label {
            RelationLabel::Entailment => self.entailments += 1,
            RelationLabel::Neutral => self.neutrals += 1,
            RelationLabel::Contradiction => self.contradictions += 1,
        }
        self.total += 1;
    }

    pub(super) fn absorb(&mut self, other: &Self) {
        self.entailments += other.entailments;
        self.neutrals += other.neutrals;
        self.contradictions += other.contradictions;
        self.total += other.total;
    }
}

/// One tally per position in `0..chunk_count`; rows past the end of the
/// matrix (or an absent matrix) produce all-zero tallies.
pub(super) fn tally_relations(
    matrix: Option<&RelationMatrix>,
    chunk_count: usize,
) -> Vec<RelationTally> {
    (0..chunk_count)
        .map(|index| {
            matrix
                .map(|value| RelationTally::from_labels(value.row(index)))
                .unwrap_or_default()
        })
        .collect()
}
