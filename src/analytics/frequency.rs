use std::collections::HashMap;

use crate::model::Question;

#[derive(Debug, Clone)]
pub(super) struct FrequencyEntry {
    pub(super) key: String,
    pub(super) doc_id: String,
    pub(super) text: String,
    pub(super) total_appearances: usize,
    pub(super) questions_appeared: Vec<String>,
    pub(super) frequency_rank: usize,
}

/// Chunk identities ordered by frequency rank.
#[derive(Debug, Default)]
pub(super) struct FrequencyTable {
    entries: Vec<FrequencyEntry>,
}

impl FrequencyTable {
    pub(super) fn build(questions: &[Question]) -> Self {
        let mut entries = Vec::<FrequencyEntry>::new();
        let mut positions = HashMap::<String, usize>::new();

        for question in questions {
            let Some(chunks) = question.retrieved_context.as_deref() else {
                continue;
            };
            let query_key = question.query_key();

            for chunk in chunks {
                let key = chunk.identity_key();
                let position = *positions.entry(key.clone()).or_insert_with(|| {
                    entries.push(FrequencyEntry {
                        key,
                        doc_id: chunk.doc_id.clone(),
                        text: chunk.text.clone(),
                        total_appearances: 0,
                        questions_appeared: Vec::new(),
                        frequency_rank: 0,
                    });
                    entries.len() - 1
                });

                let entry = &mut entries[position];
                entry.total_appearances += 1;
                if let Some(query_id) = &query_key {
                    merge_query_id(entry, query_id);
                }
            }
        }

        // Vec::sort_by is stable, so ties keep first-seen order.
        entries.sort_by(|left, right| right.total_appearances.cmp(&left.total_appearances));
        for (index, entry) in entries.iter_mut().enumerate() {
            entry.frequency_rank = index + 1;
        }

        Self { entries }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &FrequencyEntry> {
        self.entries.iter()
    }
}

fn merge_query_id(entry: &mut FrequencyEntry, query_id: &str) {
    if entry
        .questions_appeared
        .iter()
        .all(|value| value != query_id)
    {
        entry.questions_appeared.push(query_id.to_string());
    }
}
