use crate::ai::cloud_api::{CompletionBackend, GenerationParams};
use crate::ai::context::{SchemaContext, TruncationLimits};
use crate::ai::parse::parse_json_response;
use crate::ai::prompts::schema_analysis_prompt;
use crate::db::schema::SchemaDescription;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

pub const FALLBACK_NOTE: &str = "Used fallback analysis due to parsing error";

/// Turns a schema into an analysis record. Never fails: transport problems
/// yield [`error_record`], unreadable answers yield [`fallback_record`].
#[derive(Clone)]
pub struct SchemaAnalyzer {
    backend: Arc<dyn CompletionBackend>,
    params: GenerationParams,
    limits: TruncationLimits,
}

impl SchemaAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            params: GenerationParams::default(),
            limits: TruncationLimits::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_limits(mut self, limits: TruncationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub async fn analyze(&self, schema: &SchemaDescription) -> Value {
        info!("Starting schema analysis via {}", self.backend.describe());

        let context = SchemaContext::from_schema(schema, self.limits);
        let prompt = schema_analysis_prompt(&context);

        let text = match self.backend.complete(&prompt, &self.params).await {
            Ok(text) => text,
            Err(e) => {
                error!("Error in schema analysis: {}", e);
                return error_record(&e.to_string());
            }
        };

        match parse_json_response(&text) {
            Ok(record) => {
                info!("Schema analysis completed successfully");
                record
            }
            Err(failure) => {
                error!("Failed to parse JSON response: {}", failure);
                fallback_record()
            }
        }
    }
}

/// Minimal record used when the model answered with something other than JSON.
pub fn fallback_record() -> Value {
    json!({
        "domain_analysis": {
            "business_domain": "e-commerce",
            "application_type": "database system",
            "key_business_entities": ["Customer", "Product", "Order"],
            "confidence_score": 75
        },
        "relationship_analysis": {
            "primary_relationships": []
        },
        "data_quality_assessment": {
            "normalization_level": "3NF",
            "quality_score": 75,
            "integrity_issues": []
        },
        "performance_analysis": {
            "bottleneck_predictions": ["Database query performance"],
            "missing_indexes": [],
            "query_patterns": ["CRUD operations"]
        },
        "recommendations": {
            "immediate_improvements": ["Optimize database queries"],
            "long_term_refactoring": ["Consider performance tuning"]
        },
        "fallback_note": FALLBACK_NOTE
    })
}

/// Record used when the completion call itself failed.
pub fn error_record(message: &str) -> Value {
    json!({
        "error": message,
        "domain_analysis": {"business_domain": "e-commerce", "confidence_score": 50},
        "relationship_analysis": {"primary_relationships": []},
        "data_quality_assessment": {"quality_score": 50},
        "recommendations": {"immediate_improvements": []}
    })
}

pub fn is_fallback(record: &Value) -> bool {
    record.get("fallback_note").is_some()
}

pub fn is_error(record: &Value) -> bool {
    record.get("error").is_some()
}
