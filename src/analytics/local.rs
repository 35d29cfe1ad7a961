use crate::model::{LocalAnalysis, Question};

use super::tally::{RelationTally, tally_relations};

/// Per-position relation counts for a single question, using only its own
/// matrices. Always returns one entry per chunk.
pub(super) fn analyze_question(question: &Question) -> Vec<LocalAnalysis> {
    let num_chunks = question.chunks().len();
    let gt = tally_relations(question.retrieved2answer.as_ref(), num_chunks);
    let response = tally_relations(question.retrieved2response.as_ref(), num_chunks);

    gt.iter()
        .zip(response.iter())
        .map(|(gt, response)| local_entry(gt, response))
        .collect()
}

fn local_entry(gt: &RelationTally, response: &RelationTally) -> LocalAnalysis {
    LocalAnalysis {
        local_gt_entailments: gt.entailments,
        local_gt_neutrals: gt.neutrals,
        local_gt_contradictions: gt.contradictions,
        local_gt_total: gt.total,
        local_response_entailments: response.entailments,
        local_response_neutrals: response.neutrals,
        local_response_contradictions: response.contradictions,
        local_response_total: response.total,
    }
}
