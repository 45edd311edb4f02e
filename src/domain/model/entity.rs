//! Model definition entity and pricing types

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Billing unit for structured pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingUnit {
    Request,
    Image,
    Second,
    Minute,
    Character,
    Megapixel,
}

/// Per-unit pricing with an optional minimum charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPricing {
    /// What a single unit is billed as
    pub unit: PricingUnit,
    /// Price per unit in USD
    pub rate: f64,
    /// Minimum charge per invocation in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
}

/// Static pricing declared at registration time
///
/// Either a flat price per invocation (`0.04`) or a structured per-unit
/// schedule (`{ "unit": "second", "rate": 0.05 }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pricing {
    Flat(f64),
    PerUnit(UnitPricing),
}

impl Default for Pricing {
    fn default() -> Self {
        Self::Flat(0.0)
    }
}

impl Pricing {
    pub fn flat(price: f64) -> Self {
        Self::Flat(price)
    }

    pub fn per_unit(unit: PricingUnit, rate: f64) -> Self {
        Self::PerUnit(UnitPricing {
            unit,
            rate,
            minimum: None,
        })
    }

    /// Cost for the given number of billable units
    ///
    /// Flat pricing ignores `units`.
    pub fn cost_for(&self, units: f64) -> f64 {
        match self {
            Self::Flat(price) => *price,
            Self::PerUnit(pricing) => {
                let cost = pricing.rate * units.max(0.0);
                cost.max(pricing.minimum.unwrap_or(0.0))
            }
        }
    }

    /// Whether any price component is negative
    pub fn is_negative(&self) -> bool {
        match self {
            Self::Flat(price) => *price < 0.0,
            Self::PerUnit(pricing) => {
                pricing.rate < 0.0 || pricing.minimum.is_some_and(|m| m < 0.0)
            }
        }
    }
}

/// Metadata for one generative model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Globally unique registry key (e.g. "flux-dev")
    key: String,

    /// Display name
    name: String,

    /// Provider name (e.g. "fal", "replicate")
    provider: String,

    /// Opaque endpoint identifier, interpreted by the generator adapter
    endpoint: String,

    /// Capability tags, in declaration order (e.g. "generate_image")
    categories: Vec<String>,

    #[serde(default)]
    pricing: Pricing,

    /// Valid clip durations in seconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    duration_options: Vec<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aspect_ratio_options: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    resolution_options: Vec<String>,

    /// Parameters applied when a step does not set them
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    defaults: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    features: BTreeSet<String>,

    /// Maximum clip duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_duration: Option<u32>,

    /// Estimated cost of one invocation in USD
    #[serde(default)]
    cost_estimate: f64,

    /// Estimated wall-clock time of one invocation in milliseconds
    #[serde(default)]
    processing_time_estimate_ms: u64,
}

impl ModelDefinition {
    /// Create a new definition with required fields
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            provider: provider.into(),
            endpoint: endpoint.into(),
            categories: Vec::new(),
            pricing: Pricing::default(),
            duration_options: Vec::new(),
            aspect_ratio_options: Vec::new(),
            resolution_options: Vec::new(),
            defaults: BTreeMap::new(),
            features: BTreeSet::new(),
            max_duration: None,
            cost_estimate: 0.0,
            processing_time_estimate_ms: 0,
        }
    }

    /// Add a capability tag; duplicates are ignored
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();

        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_duration_options(mut self, options: Vec<u32>) -> Self {
        self.duration_options = options;
        self
    }

    pub fn with_aspect_ratio_options(mut self, options: Vec<String>) -> Self {
        self.aspect_ratio_options = options;
        self
    }

    pub fn with_resolution_options(mut self, options: Vec<String>) -> Self {
        self.resolution_options = options;
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(key.into(), value);
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub fn with_max_duration(mut self, seconds: u32) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    pub fn with_cost_estimate(mut self, cost: f64) -> Self {
        self.cost_estimate = cost;
        self
    }

    pub fn with_processing_time_estimate_ms(mut self, ms: u64) -> Self {
        self.processing_time_estimate_ms = ms;
        self
    }

    // Getters

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    pub fn duration_options(&self) -> &[u32] {
        &self.duration_options
    }

    pub fn aspect_ratio_options(&self) -> &[String] {
        &self.aspect_ratio_options
    }

    pub fn resolution_options(&self) -> &[String] {
        &self.resolution_options
    }

    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn max_duration(&self) -> Option<u32> {
        self.max_duration
    }

    pub fn cost_estimate(&self) -> f64 {
        self.cost_estimate
    }

    pub fn processing_time_estimate_ms(&self) -> u64 {
        self.processing_time_estimate_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video_model() -> ModelDefinition {
        ModelDefinition::new("kling-2", "Kling 2.0", "fal", "fal-ai/kling-video/v2")
            .with_category("generate_video")
            .with_category("image_to_video")
            .with_category("generate_video")
            .with_pricing(Pricing::per_unit(PricingUnit::Second, 0.05))
            .with_duration_options(vec![5, 10])
            .with_aspect_ratio_options(vec!["16:9".to_string(), "9:16".to_string()])
            .with_default("duration", json!(5))
            .with_feature("image_input")
            .with_max_duration(10)
            .with_cost_estimate(0.25)
            .with_processing_time_estimate_ms(90_000)
    }

    #[test]
    fn test_model_definition_creation() {
        let model = video_model();

        assert_eq!(model.key(), "kling-2");
        assert_eq!(model.provider(), "fal");
        assert_eq!(model.categories(), ["generate_video", "image_to_video"]);
        assert!(model.has_category("image_to_video"));
        assert!(!model.has_category("generate_image"));
        assert!(model.has_feature("image_input"));
        assert_eq!(model.max_duration(), Some(10));
        assert_eq!(model.defaults().get("duration"), Some(&json!(5)));
    }

    #[test]
    fn test_flat_pricing_ignores_units() {
        let pricing = Pricing::flat(0.04);
        assert_eq!(pricing.cost_for(0.0), 0.04);
        assert_eq!(pricing.cost_for(12.0), 0.04);
    }

    #[test]
    fn test_per_unit_pricing_with_minimum() {
        let pricing = Pricing::PerUnit(UnitPricing {
            unit: PricingUnit::Second,
            rate: 0.05,
            minimum: Some(0.2),
        });

        assert!((pricing.cost_for(10.0) - 0.5).abs() < f64::EPSILON);
        assert!((pricing.cost_for(1.0) - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_pricing_detection() {
        assert!(Pricing::flat(-1.0).is_negative());
        assert!(Pricing::per_unit(PricingUnit::Image, -0.1).is_negative());
        assert!(!Pricing::per_unit(PricingUnit::Image, 0.1).is_negative());
    }

    #[test]
    fn test_pricing_deserialization_forms() {
        let flat: Pricing = serde_json::from_value(json!(0.03)).unwrap();
        assert_eq!(flat, Pricing::Flat(0.03));

        let structured: Pricing =
            serde_json::from_value(json!({"unit": "megapixel", "rate": 0.025})).unwrap();
        assert_eq!(structured, Pricing::per_unit(PricingUnit::Megapixel, 0.025));
    }

    #[test]
    fn test_model_definition_deserialization_defaults() {
        let model: ModelDefinition = serde_json::from_value(json!({
            "key": "flux-schnell",
            "name": "FLUX.1 [schnell]",
            "provider": "fal",
            "endpoint": "fal-ai/flux/schnell",
            "categories": ["generate_image"],
            "cost_estimate": 0.003
        }))
        .unwrap();

        assert_eq!(model.pricing(), &Pricing::Flat(0.0));
        assert!(model.duration_options().is_empty());
        assert_eq!(model.processing_time_estimate_ms(), 0);
        assert_eq!(model.cost_estimate(), 0.003);
    }
}
