use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::model::{Question, Run};

use super::effectiveness::EffectivenessTable;
use super::local::analyze_question;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivationSummary {
    pub question_count: usize,
    pub questions_with_context: usize,
    pub chunk_occurrences: usize,
    pub total_unique_chunks: usize,
    pub relation_labels_counted: usize,
}

#[derive(Debug)]
pub struct Derived {
    pub run: Run,
    pub effectiveness: EffectivenessTable,
    pub summary: DerivationSummary,
}

/// Annotates every question and chunk of `run`.
///
/// Global effectiveness is computed once over all questions, then each
/// question with `retrieved_context` gets `context_length` and `num_chunks`,
/// and each of its chunks gets `effectiveness_analysis` and `local_analysis`.
/// Annotations already present on the input are overwritten, never read.
pub fn derive(mut run: Run) -> Derived {
    let effectiveness = EffectivenessTable::aggregate(&run.questions);
    let mut summary = DerivationSummary {
        question_count: run.questions.len(),
        total_unique_chunks: effectiveness.total_unique_chunks(),
        ..DerivationSummary::default()
    };

    for question in &mut run.questions {
        annotate_question(question, &effectiveness, &mut summary);
    }

    info!(
        questions = summary.question_count,
        with_context = summary.questions_with_context,
        chunk_occurrences = summary.chunk_occurrences,
        unique_chunks = summary.total_unique_chunks,
        has_run_metrics = run.metrics().is_some(),
        "computed derived metrics"
    );

    Derived {
        run,
        effectiveness,
        summary,
    }
}

/// Parses, derives and re-serializes a run. Any structural problem fails the
/// whole call; nothing partial is returned.
pub fn derive_value(value: Value) -> Result<(Value, DerivationSummary)> {
    let run = Run::from_value(value)?;
    let derived = derive(run);
    let value = derived.run.into_value()?;
    Ok((value, derived.summary))
}

fn annotate_question(
    question: &mut Question,
    effectiveness: &EffectivenessTable,
    summary: &mut DerivationSummary,
) {
    if question.retrieved_context.is_none() {
        debug!(
            query_id = question.query_key().as_deref().unwrap_or_default(),
            "question has no retrieved_context; skipped"
        );
        return;
    }

    let local = analyze_question(question);
    let Some(chunks) = question.retrieved_context.as_mut() else {
        return;
    };

    let words = context_word_count(chunks.iter().map(|chunk| chunk.text.as_str()));
    question.context_length = Some(words);
    question.num_chunks = Some(chunks.len());
    summary.questions_with_context += 1;
    summary.chunk_occurrences += chunks.len();
    summary.relation_labels_counted += local
        .iter()
        .map(|entry| entry.local_gt_total + entry.local_response_total)
        .sum::<usize>();

    for (position, chunk) in chunks.iter_mut().enumerate() {
        chunk.effectiveness_analysis = effectiveness.get(&chunk.identity_key()).cloned();
        chunk.local_analysis = Some(local.get(position).cloned().unwrap_or_default());
    }
}

fn context_word_count<'a>(texts: impl Iterator<Item = &'a str>) -> usize {
    texts
        .collect::<Vec<&str>>()
        .join(" ")
        .split_whitespace()
        .count()
}
