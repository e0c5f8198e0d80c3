use crate::models::StoredOperation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Model assumed for rows that carry no model, and for models missing from the table.
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o";
/// Per-image model whose flat price applies to every generation operation.
pub const IMAGE_MODEL: &str = "dall-e-3";
/// Effect tag written for image generation operations.
pub const IMAGE_GENERATION_EFFECT: &str = "dall-e-3";

/// Pricing for one model. Token prices are USD per single token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelPricing {
    Tokens { input: f64, output: f64 },
    PerImage { image: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    /// OpenAI list prices: gpt-4o $2.50/$10.00 per 1M tokens, dall-e-3 $0.040 per standard image.
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            DEFAULT_TEXT_MODEL.to_string(),
            ModelPricing::Tokens {
                input: 2.50 / 1_000_000.0,
                output: 10.00 / 1_000_000.0,
            },
        );
        models.insert(
            "gpt-4o-mini".to_string(),
            ModelPricing::Tokens {
                input: 0.15 / 1_000_000.0,
                output: 0.60 / 1_000_000.0,
            },
        );
        models.insert(IMAGE_MODEL.to_string(), ModelPricing::PerImage { image: 0.040 });
        Self { models }
    }
}

impl PricingTable {
    /// Load a pricing table from a JSON object keyed by model id.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pricing file {}", path.display()))?;
        let table: PricingTable = serde_json::from_str(&raw)
            .with_context(|| format!("parsing pricing file {}", path.display()))?;
        Ok(table)
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    fn image_price(&self, model: &str) -> f64 {
        match self.get(model) {
            Some(ModelPricing::PerImage { image }) => *image,
            _ => 0.0,
        }
    }

    fn token_prices(&self, model: &str) -> (f64, f64) {
        let fallback = || match self.get(DEFAULT_TEXT_MODEL) {
            Some(ModelPricing::Tokens { input, output }) => (*input, *output),
            _ => (0.0, 0.0),
        };
        match self.get(model) {
            Some(ModelPricing::Tokens { input, output }) => (*input, *output),
            _ => fallback(),
        }
    }
}

/// Estimated USD cost of a single logged operation.
///
/// Image generation is charged a flat per-image price no matter what the token
/// columns say. Everything else is metered per token, falling back to
/// `gpt-4o` prices for models the table does not know.
pub fn calculate_cost(op: &StoredOperation, pricing: &PricingTable) -> f64 {
    let model = op.model.as_deref().unwrap_or(DEFAULT_TEXT_MODEL);

    if model.to_lowercase().contains("dall-e")
        || op.effect.as_deref() == Some(IMAGE_GENERATION_EFFECT)
    {
        return pricing.image_price(IMAGE_MODEL);
    }

    if let Some(ModelPricing::PerImage { image }) = pricing.get(model) {
        return *image;
    }

    let (input, output) = pricing.token_prices(model);
    let tokens_in = op.tokens_in.unwrap_or(0).max(0) as f64;
    let tokens_out = op.tokens_out.unwrap_or(0).max(0) as f64;
    tokens_in * input + tokens_out * output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(model: Option<&str>, effect: &str, tokens_in: Option<i64>, tokens_out: Option<i64>) -> StoredOperation {
        StoredOperation {
            id: 1,
            original_filename: Some("cat.png".into()),
            result_filename: Some("cat_sepia_20240101120000.jpg".into()),
            effect: Some(effect.into()),
            ai_description: Some("a cat".into()),
            tokens_in,
            tokens_out,
            created_at: Some("2024-01-01T12:00:00".into()),
            model: model.map(String::from),
        }
    }

    #[test]
    fn gpt4o_tokens_are_metered() {
        let pricing = PricingTable::default();
        let cost = calculate_cost(&op(Some("gpt-4o"), "sepia", Some(1000), Some(500)), &pricing);
        assert!((cost - 0.0075).abs() < 1e-12);
    }

    #[test]
    fn image_generation_is_flat_regardless_of_tokens() {
        let pricing = PricingTable::default();
        let by_model = calculate_cost(&op(Some("dall-e-3"), "whatever", Some(9999), Some(9999)), &pricing);
        let by_effect = calculate_cost(&op(Some("gpt-4o"), "dall-e-3", Some(1000), Some(500)), &pricing);
        let by_substring = calculate_cost(&op(Some("DALL-E-2"), "dall-e-2", None, None), &pricing);
        assert!((by_model - 0.04).abs() < 1e-12);
        assert!((by_effect - 0.04).abs() < 1e-12);
        assert!((by_substring - 0.04).abs() < 1e-12);
    }

    #[test]
    fn missing_or_unknown_model_uses_gpt4o_prices() {
        let pricing = PricingTable::default();
        let expected = 0.0075;
        let missing = calculate_cost(&op(None, "grayscale", Some(1000), Some(500)), &pricing);
        let unknown = calculate_cost(&op(Some("some-future-model"), "grayscale", Some(1000), Some(500)), &pricing);
        assert!((missing - expected).abs() < 1e-12);
        assert!((unknown - expected).abs() < 1e-12);
    }

    #[test]
    fn null_tokens_cost_nothing() {
        let pricing = PricingTable::default();
        assert_eq!(calculate_cost(&op(Some("gpt-4o"), "none", None, None), &pricing), 0.0);
    }

    #[test]
    fn cheaper_model_uses_its_own_prices() {
        let pricing = PricingTable::default();
        let cost = calculate_cost(&op(Some("gpt-4o-mini"), "medical_analysis", Some(1_000_000), Some(0)), &pricing);
        assert!((cost - 0.15).abs() < 1e-9);
    }

    #[test]
    fn pricing_table_parses_from_json() {
        let json = r#"{
            "gpt-4o": {"input": 0.000001, "output": 0.000002},
            "dall-e-3": {"image": 0.08}
        }"#;
        let table: PricingTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.get("dall-e-3"), Some(&ModelPricing::PerImage { image: 0.08 }));
        let cost = calculate_cost(&op(Some("gpt-4o"), "sepia", Some(10), Some(10)), &table);
        assert!((cost - 0.00003).abs() < 1e-12);
    }

    #[test]
    fn pricing_file_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(&path, r#"{"custom-vision": {"input": 0.5, "output": 1.0}}"#).unwrap();
        let table = PricingTable::from_json_file(&path).unwrap();
        let cost = calculate_cost(&op(Some("custom-vision"), "none", Some(2), Some(3)), &table);
        assert!((cost - 4.0).abs() < 1e-12);

        assert!(PricingTable::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
