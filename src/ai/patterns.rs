use crate::ai::cloud_api::{CompletionBackend, GenerationParams};
use crate::ai::parse::{parse_json_response, preview};
use crate::ai::prompts::PatternPrompt;
use crate::ai::record::RecordExt;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

const RAW_RESPONSE_PREVIEW: usize = 500;

/// One successful source as seen by the cross-source prompts.
#[derive(Debug, Clone, Copy)]
pub struct SourceSummary<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub database_kind: &'a str,
    pub analysis: &'a Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NamingPatterns {
    pub table_naming: Vec<String>,
    pub column_naming: Vec<String>,
    pub id_patterns: Vec<String>,
    pub timestamp_patterns: Vec<String>,
    pub foreign_key_patterns: Vec<String>,
}

/// Compares several analysed sources. Like [`SchemaAnalyzer`](crate::ai::SchemaAnalyzer)
/// it never fails; each of the six questions carries its own fallback.
#[derive(Clone)]
pub struct PatternAnalyzer {
    backend: Arc<dyn CompletionBackend>,
    params: GenerationParams,
}

impl PatternAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub async fn compare(&self, sources: &[SourceSummary<'_>]) -> Value {
        info!("Running cross-source pattern analysis over {} sources", sources.len());
        let payload = prompt_payload(sources);

        let answers = join_all(PatternPrompt::ALL.iter().map(|p| self.ask(*p, &payload))).await;

        let mut record = Map::new();
        for (prompt, answer) in PatternPrompt::ALL.iter().zip(answers) {
            record.insert(prompt.key().to_string(), answer);
        }

        let naming = extract_naming_patterns(sources);
        record.insert(
            "naming_patterns".into(),
            serde_json::to_value(naming).unwrap_or(Value::Null),
        );
        record.insert("similarity_scores".into(), similarity_scores(sources));
        record.insert(
            "sources".into(),
            Value::Array(sources.iter().map(|s| Value::from(s.name)).collect()),
        );

        Value::Object(record)
    }

    async fn ask(&self, prompt: PatternPrompt, payload: &Value) -> Value {
        let text = prompt.render(payload);
        match self.backend.complete(&text, &self.params).await {
            Ok(answer) => match parse_json_response(&answer) {
                Ok(value) => value,
                Err(failure) => {
                    error!("Failed to parse {} response: {}", prompt.key(), failure);
                    json!({
                        "error": "Failed to parse JSON response",
                        "raw_response": preview(answer.trim(), RAW_RESPONSE_PREVIEW)
                    })
                }
            },
            Err(e) => {
                error!("{} call failed: {}", prompt.key(), e);
                match prompt {
                    PatternPrompt::CommonPatterns => common_patterns_error(&e.to_string()),
                    _ => json!({"error": e.to_string()}),
                }
            }
        }
    }
}

fn prompt_payload(sources: &[SourceSummary<'_>]) -> Value {
    let mut map = Map::new();
    for source in sources {
        map.insert(
            source.name.to_string(),
            json!({
                "description": source.description,
                "database_type": source.database_kind,
                "analysis": source.analysis,
            }),
        );
    }
    Value::Object(map)
}

fn common_patterns_error(message: &str) -> Value {
    json!({
        "error": message,
        "domain_confirmation": {
            "confirmed_domain": "Unknown",
            "confidence_score": 0
        },
        "common_attributes": {
            "shared_entities": [],
            "shared_relationships": []
        },
        "integration_opportunities": {
            "data_standardization": [],
            "api_unification": [],
            "data_migration_paths": []
        }
    })
}

const CORE_ENTITIES: [&str; 3] = [
    "reverse_engineering_analysis",
    "entity_relationship_mapping",
    "core_entities",
];
const RELATIONSHIPS: [&str; 3] = [
    "reverse_engineering_analysis",
    "entity_relationship_mapping",
    "relationships",
];

/// Entity names claimed by a record, from either the full or the fallback shape.
pub fn business_entities(analysis: &Value) -> BTreeSet<String> {
    let mut entities: BTreeSet<String> = analysis
        .strings(&["domain_analysis", "key_business_entities"])
        .into_iter()
        .collect();
    for entity in analysis.list(&CORE_ENTITIES) {
        let name = entity.text_or(&["entity_name"], "");
        if !name.is_empty() {
            entities.insert(name);
        }
    }
    entities
}

/// Gathers entity names, key attributes and relationship kinds across sources.
pub fn extract_naming_patterns(sources: &[SourceSummary<'_>]) -> NamingPatterns {
    let mut patterns = NamingPatterns::default();

    for source in sources {
        let analysis = source.analysis;
        patterns
            .table_naming
            .extend(business_entities(analysis));

        for entity in analysis.list(&CORE_ENTITIES) {
            for attribute in entity.strings(&["key_attributes"]) {
                let lowered = attribute.to_lowercase();
                if lowered == "id"
                    || lowered.ends_with("_id")
                    || attribute.ends_with("Id")
                    || attribute.ends_with("ID")
                {
                    patterns.id_patterns.push(attribute.clone());
                }
                if lowered.ends_with("_at")
                    || lowered.contains("date")
                    || lowered.contains("time")
                {
                    patterns.timestamp_patterns.push(attribute.clone());
                }
                patterns.column_naming.push(attribute);
            }
        }

        let relationships = analysis
            .list(&["relationship_analysis", "primary_relationships"])
            .iter()
            .chain(analysis.list(&RELATIONSHIPS));
        for rel in relationships {
            if rel.is_object() {
                patterns
                    .foreign_key_patterns
                    .push(rel.text_or(&["relationship_type"], ""));
            }
        }
    }

    patterns
}

/// Jaccard similarity of the two records' entity sets; two empty sets are identical.
pub fn similarity_score(a: &Value, b: &Value) -> f64 {
    let left = business_entities(a);
    let right = business_entities(b);
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn similarity_scores(sources: &[SourceSummary<'_>]) -> Value {
    let mut scores = Map::new();
    for (i, a) in sources.iter().enumerate() {
        for b in &sources[i + 1..] {
            scores.insert(
                format!("{} vs {}", a.name, b.name),
                json!(similarity_score(a.analysis, b.analysis)),
            );
        }
    }
    Value::Object(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::analyzer::fallback_record;
    use crate::ai::scripted::ScriptedBackend;
    use crate::error::LlmError;

    fn rich_record(entities: &[&str]) -> Value {
        json!({
            "reverse_engineering_analysis": {
                "entity_relationship_mapping": {
                    "core_entities": entities.iter().map(|e| json!({
                        "entity_name": e,
                        "key_attributes": [format!("{}_id", e.to_lowercase()), "created_at"]
                    })).collect::<Vec<_>>(),
                    "relationships": [{"relationship_type": "one-to-many"}]
                }
            }
        })
    }

    fn summary<'a>(name: &'a str, analysis: &'a Value) -> SourceSummary<'a> {
        SourceSummary {
            name,
            description: "",
            database_kind: "sqlite",
            analysis,
        }
    }

    #[test]
    fn jaccard_over_entities() {
        let a = rich_record(&["Customer", "Order"]);
        let b = rich_record(&["Customer", "Product", "Order", "Invoice"]);
        assert_eq!(similarity_score(&a, &b), 0.5);
        assert_eq!(similarity_score(&json!({}), &json!({})), 1.0);
        assert_eq!(similarity_score(&a, &json!({})), 0.0);
        assert_eq!(similarity_score(&fallback_record(), &fallback_record()), 1.0);
    }

    #[test]
    fn naming_patterns_cover_both_record_shapes() {
        let rich = rich_record(&["Customer"]);
        let fallback = fallback_record();
        let patterns = extract_naming_patterns(&[summary("a", &rich), summary("b", &fallback)]);

        assert_eq!(patterns.table_naming, vec!["Customer", "Customer", "Order", "Product"]);
        assert_eq!(patterns.id_patterns, vec!["customer_id"]);
        assert_eq!(patterns.timestamp_patterns, vec!["created_at"]);
        assert_eq!(patterns.foreign_key_patterns, vec!["one-to-many"]);
    }

    #[tokio::test]
    async fn six_independent_calls_with_isolated_failures() {
        let backend = Arc::new(ScriptedBackend::new(|prompt| {
            if prompt.contains("integration strategy") {
                Err(LlmError::Api {
                    provider: "Gemini",
                    status: 500,
                    body: "internal".into(),
                })
            } else if prompt.contains("governance") {
                Ok("no json here".into())
            } else {
                Ok("{\"ok\": true}".into())
            }
        }));
        let analyzer = PatternAnalyzer::new(backend.clone());
        let a = rich_record(&["Customer"]);
        let b = rich_record(&["Customer", "Order"]);

        let record = analyzer.compare(&[summary("shop_a", &a), summary("shop_b", &b)]).await;

        assert_eq!(backend.calls(), 6);
        assert_eq!(record["common_patterns"], json!({"ok": true}));
        assert_eq!(record["entity_mappings"], json!({"ok": true}));
        assert_eq!(record["performance_comparison"], json!({"ok": true}));
        assert!(record["integration_strategy"]["error"].is_string());
        assert_eq!(record["data_governance"]["error"], "Failed to parse JSON response");
        assert_eq!(record["data_governance"]["raw_response"], "no json here");
        assert_eq!(record["similarity_scores"]["shop_a vs shop_b"], 0.5);
        assert_eq!(record["sources"], json!(["shop_a", "shop_b"]));
    }

    #[tokio::test]
    async fn common_pattern_failure_uses_stub_shape() {
        let backend = Arc::new(ScriptedBackend::new(|_| {
            Err(LlmError::NotConfigured("no key".into()))
        }));
        let analyzer = PatternAnalyzer::new(backend);
        let a = json!({});
        let record = analyzer.compare(&[summary("x", &a), summary("y", &a)]).await;
        assert_eq!(record["common_patterns"]["domain_confirmation"]["confirmed_domain"], "Unknown");
        assert!(record["architecture_patterns"]["error"].is_string());
        assert!(record["architecture_patterns"].get("domain_confirmation").is_none());
    }
}
