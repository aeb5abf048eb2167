pub mod config;

use schemars::JsonSchema;
use schemars::Schema;
use serde::{Deserialize, Serialize};

/// Body of `POST /features`. `sequence` stays optional so an absent field is
/// rejected by the handler with a 400 instead of a framework rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FeaturesRequest {
    #[serde(default)]
    pub sequence: Option<String>,
}

/// Output of the features job, before it is merged with the request data.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FeaturesResult {
    pub embedder: String,
    pub embedding_dimension: usize,
    pub length: usize,
    pub per_protein: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FeaturesResponse {
    #[serde(flatten)]
    pub features: FeaturesResult,
    pub sequence: String,
}

impl FeaturesResponse {
    pub fn merge(features: FeaturesResult, sequence: String) -> Self {
        Self { features, sequence }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub error: String,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchemaBundle {
    pub features_request: Schema,
    pub features_response: Schema,
    pub error: Schema,
}

pub fn schema_bundle() -> SchemaBundle {
    SchemaBundle {
        features_request: schemars::schema_for!(FeaturesRequest),
        features_response: schemars::schema_for!(FeaturesResponse),
        error: schemars::schema_for!(ApiErrorBody),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_flattens_features_next_to_sequence() {
        let response = FeaturesResponse::merge(
            FeaturesResult {
                embedder: "seqvec".to_string(),
                embedding_dimension: 2,
                length: 7,
                per_protein: vec![0.5, -0.5],
            },
            "PROTEIN".to_string(),
        );
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["sequence"], "PROTEIN");
        assert_eq!(json["embedder"], "seqvec");
        assert_eq!(json["length"], 7);
        assert!(json.get("features").is_none());
    }

    #[test]
    fn missing_sequence_deserializes_to_none() {
        let req: FeaturesRequest = serde_json::from_str("{}").expect("parse");
        assert_eq!(req.sequence, None);
    }

    #[test]
    fn schema_bundle_generates() {
        let schemas = schema_bundle();
        let request = serde_json::to_string(&schemas.features_request).expect("serialize schema");
        assert!(request.contains("sequence"));
    }
}
