use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const IDENTITY_SEPARATOR: &str = "::";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RelationLabel {
    Entailment,
    Neutral,
    Contradiction,
}

impl RelationLabel {
    /// Unrecognized values (other strings, null, numbers) yield `None`.
    pub fn parse(value: &Value) -> Option<Self> {
        match value.as_str()? {
            "Entailment" => Some(Self::Entailment),
            "Neutral" => Some(Self::Neutral),
            "Contradiction" => Some(Self::Contradiction),
            _ => None,
        }
    }
}

const DERIVED_QUESTION_KEYS: [&str; 2] = ["context_length", "num_chunks"];
const DERIVED_CHUNK_KEYS: [&str; 2] = ["effectiveness_analysis", "local_analysis"];

/// Outer index is the chunk position, inner row holds one label per claim.
/// Kept as raw JSON: a missing or non-sequence row reads as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationMatrix(pub Value);

impl RelationMatrix {
    pub fn row(&self, chunk_index: usize) -> &[Value] {
        self.0
            .as_array()
            .and_then(|rows| rows.get(chunk_index))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub text: String,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub effectiveness_analysis: Option<EffectivenessEntry>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub local_analysis: Option<LocalAnalysis>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chunk {
    pub fn identity_key(&self) -> String {
        identity_key(&self.doc_id, &self.text)
    }
}

pub fn identity_key(doc_id: &str, text: &str) -> String {
    format!("{doc_id}{IDENTITY_SEPARATOR}{text}")
}

/// One evaluation sample. Fields the derivation never reads (query, answers,
/// claims, per-question metrics) stay in `passthrough` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<Vec<Chunk>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved2answer: Option<RelationMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved2response: Option<RelationMatrix>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<usize>,
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<usize>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl Question {
    pub fn chunks(&self) -> &[Chunk] {
        self.retrieved_context.as_deref().unwrap_or(&[])
    }

    /// Grouping key for `questions_appeared`. Non-string ids are keyed by
    /// their JSON text; a null id yields `None`.
    pub fn query_key(&self) -> Option<String> {
        match self.query_id.as_ref()? {
            Value::String(value) => Some(value.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Drops annotations a previous derivation attached, so they neither reach
/// typed parsing nor linger in the passthrough maps. Question-level stats
/// are only dropped when `retrieved_context` is present, since only then
/// are they recomputed.
fn strip_derived_fields(item: &mut Value) {
    let Some(question) = item.as_object_mut() else {
        return;
    };

    let Some(chunks) = question
        .get_mut("retrieved_context")
        .filter(|value| !value.is_null())
    else {
        return;
    };
    if let Some(chunks) = chunks.as_array_mut() {
        for chunk in chunks.iter_mut().filter_map(Value::as_object_mut) {
            for key in DERIVED_CHUNK_KEYS {
                chunk.remove(key);
            }
        }
    }

    for key in DERIVED_QUESTION_KEYS {
        question.remove(key);
    }
}

/// Corpus-wide statistics for one chunk identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessEntry {
    pub doc_id: String,
    pub text: String,
    pub total_appearances: usize,
    pub questions_appeared: Vec<String>,
    pub frequency_rank: usize,
    pub total_unique_chunks: usize,
    pub gt_entailments: usize,
    pub gt_neutrals: usize,
    pub gt_contradictions: usize,
    pub gt_total_relations: usize,
    pub response_entailments: usize,
    pub response_neutrals: usize,
    pub response_contradictions: usize,
    pub response_total_relations: usize,
    pub gt_entailment_rate: f64,
    pub response_entailment_rate: f64,
}

/// Relation counts for one chunk occurrence, scoped to its own question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalAnalysis {
    pub local_gt_entailments: usize,
    pub local_gt_neutrals: usize,
    pub local_gt_contradictions: usize,
    pub local_gt_total: usize,
    pub local_response_entailments: usize,
    pub local_response_neutrals: usize,
    pub local_response_contradictions: usize,
    pub local_response_total: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum ResultsLayout {
    Absent,
    Flat,
    Nested(Map<String, Value>),
    Opaque(Value),
}

#[derive(Debug, Clone)]
pub struct Run {
    pub questions: Vec<Question>,
    layout: ResultsLayout,
    fields: Map<String, Value>,
}

impl Run {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            bail!("run must be a JSON object");
        };

        let (layout, items) = match fields.remove("results") {
            None => (ResultsLayout::Absent, Vec::new()),
            Some(Value::Array(items)) => (ResultsLayout::Flat, items),
            Some(Value::Object(mut inner)) => match inner.remove("results") {
                Some(Value::Array(items)) => (ResultsLayout::Nested(inner), items),
                Some(other) => {
                    inner.insert("results".to_string(), other);
                    (ResultsLayout::Opaque(Value::Object(inner)), Vec::new())
                }
                None => (ResultsLayout::Opaque(Value::Object(inner)), Vec::new()),
            },
            Some(other) => (ResultsLayout::Opaque(other), Vec::new()),
        };

        let questions = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                strip_derived_fields(&mut item);
                serde_json::from_value::<Question>(item)
                    .with_context(|| format!("malformed question at results[{index}]"))
            })
            .collect::<Result<Vec<Question>>>()?;

        Ok(Self {
            questions,
            layout,
            fields,
        })
    }

    pub fn into_value(self) -> Result<Value> {
        let mut fields = self.fields;
        let questions =
            serde_json::to_value(&self.questions).context("failed to serialize questions")?;

        match self.layout {
            ResultsLayout::Absent => {}
            ResultsLayout::Flat => {
                fields.insert("results".to_string(), questions);
            }
            ResultsLayout::Nested(mut inner) => {
                inner.insert("results".to_string(), questions);
                fields.insert("results".to_string(), Value::Object(inner));
            }
            ResultsLayout::Opaque(original) => {
                fields.insert("results".to_string(), original);
            }
        }

        Ok(Value::Object(fields))
    }

    pub fn metrics(&self) -> Option<&Value> {
        self.fields.get("metrics")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn relation_label_parse_ignores_unknown_values() {
        assert_eq!(
            RelationLabel::parse(&json!("Entailment")),
            Some(RelationLabel::Entailment)
        );
        assert_eq!(
            RelationLabel::parse(&json!("Contradiction")),
            Some(RelationLabel::Contradiction)
        );
        assert_eq!(RelationLabel::parse(&json!("entailment")), None);
        assert_eq!(RelationLabel::parse(&json!(null)), None);
        assert_eq!(RelationLabel::parse(&json!(1)), None);
    }

    #[test]
    fn run_unwraps_nested_results_and_restores_siblings() {
        let raw = json!({
            "results": {
                "results": [{"query_id": "q1"}],
                "version": 2
            },
            "metrics": {"overall_metrics": {"precision": 0.5}}
        });

        let run = Run::from_value(raw.clone()).expect("nested run should parse");
        assert_eq!(run.questions.len(), 1);
        assert_eq!(run.questions[0].query_key().as_deref(), Some("q1"));
        assert_eq!(
            run.metrics(),
            Some(&json!({"overall_metrics": {"precision": 0.5}}))
        );

        let restored = run.into_value().expect("run should serialize");
        assert_eq!(restored, raw);
    }

    #[test]
    fn run_treats_non_sequence_results_as_empty_and_keeps_them() {
        let raw = json!({"results": "not-a-list", "metrics": {}});

        let run = Run::from_value(raw.clone()).expect("opaque results should parse");
        assert!(run.questions.is_empty());
        assert_eq!(run.into_value().expect("run should serialize"), raw);
    }

    #[test]
    fn run_keeps_nested_container_whose_inner_results_is_not_a_sequence() {
        let raw = json!({"results": {"results": "x", "v": 1}});

        let run = Run::from_value(raw.clone()).expect("opaque nested results should parse");
        assert!(run.questions.is_empty());
        assert_eq!(run.into_value().expect("run should serialize"), raw);
    }

    #[test]
    fn question_key_uses_json_text_for_non_string_ids() {
        let numeric: Question =
            serde_json::from_value(json!({"query_id": 7})).expect("numeric id parses");
        assert_eq!(numeric.query_key().as_deref(), Some("7"));
        assert_eq!(
            serde_json::to_value(&numeric).expect("question serializes"),
            json!({"query_id": 7})
        );

        let missing: Question = serde_json::from_value(json!({})).expect("empty question parses");
        assert_eq!(missing.query_key(), None);
    }

    #[test]
    fn stale_chunk_annotations_are_dropped_before_parsing() {
        let run = Run::from_value(json!({
            "results": [{
                "query_id": "q1",
                "context_length": 2.0,
                "num_chunks": "one",
                "retrieved_context": [{
                    "doc_id": "d1",
                    "text": "x",
                    "effectiveness_analysis": {"frequency_rank": 1},
                    "local_analysis": "stale"
                }]
            }]
        }))
        .expect("stale annotations must not fail parsing");

        let question = &run.questions[0];
        assert!(question.context_length.is_none());
        assert!(question.num_chunks.is_none());
        assert!(question.passthrough.is_empty());
        let chunk = &question.chunks()[0];
        assert!(chunk.effectiveness_analysis.is_none());
        assert!(chunk.local_analysis.is_none());
        assert!(chunk.extra.is_empty());
    }

    #[test]
    fn stats_on_question_without_context_pass_through() {
        let raw = json!({"results": [{"query_id": "q0", "context_length": 2.5}]});

        let run = Run::from_value(raw.clone()).expect("run parses");
        assert_eq!(run.questions[0].passthrough["context_length"], json!(2.5));
        assert_eq!(run.into_value().expect("run should serialize"), raw);
    }

    #[test]
    fn run_rejects_chunk_without_doc_id() {
        let raw = json!({
            "results": [{"query_id": "q1", "retrieved_context": [{"text": "orphan"}]}]
        });

        let err = Run::from_value(raw).expect_err("missing doc_id must fail");
        assert!(err.to_string().contains("results[0]"));
    }

    #[test]
    fn run_rejects_non_object_top_level() {
        assert!(Run::from_value(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn question_passthrough_fields_survive_round_trip() {
        let raw = json!({
            "query_id": "q7",
            "query": "what is it?",
            "gt_answer": "a thing",
            "response": null,
            "response_claims": [["a", "b", "c"]],
            "metrics": {"f1": 0.25}
        });

        let question: Question = serde_json::from_value(raw.clone()).expect("question parses");
        assert_eq!(question.passthrough.len(), 5);
        assert_eq!(
            serde_json::to_value(&question).expect("question serializes"),
            raw
        );
    }

    #[test]
    fn relation_matrix_row_defaults_to_empty_beyond_length() {
        let matrix = RelationMatrix(json!([["Neutral"]]));
        assert_eq!(matrix.row(0).len(), 1);
        assert!(matrix.row(5).is_empty());
    }

    #[test]
    fn relation_matrix_reads_malformed_rows_as_empty() {
        let matrix = RelationMatrix(json!([null, "Entailment", ["Entailment"]]));
        assert!(matrix.row(0).is_empty());
        assert!(matrix.row(1).is_empty());
        assert_eq!(matrix.row(2).len(), 1);

        assert!(RelationMatrix(json!("not a matrix")).row(0).is_empty());
    }
}
