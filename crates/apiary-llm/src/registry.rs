//! Model metadata lookup.

use std::collections::HashMap;

/// Conservative context window assumed when a model is unknown.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

/// Metadata for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    /// Context window in tokens.
    pub context_window: u64,
    /// USD per million input tokens, when pricing is known.
    pub input_cost_per_mtok: Option<f64>,
    /// USD per million output tokens, when pricing is known.
    pub output_cost_per_mtok: Option<f64>,
}

impl ModelInfo {
    /// Cost in USD for a token count pair. Missing pricing costs zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input = self.input_cost_per_mtok.unwrap_or(0.0) * (input_tokens as f64) / 1_000_000.0;
        let output =
            self.output_cost_per_mtok.unwrap_or(0.0) * (output_tokens as f64) / 1_000_000.0;
        input + output
    }
}

/// Model metadata registry.
///
/// The engine treats this as an external table; a missing model is non-fatal
/// (a `model_lookup_warning` event is emitted and the conservative default
/// window is used).
pub trait ModelRegistry: Send + Sync {
    /// Look up a model by id.
    fn find(&self, model_id: &str) -> Option<ModelInfo>;
}

/// Built-in registry with a small static table.
#[derive(Debug, Clone)]
pub struct StaticModelRegistry {
    models: HashMap<String, ModelInfo>,
}

impl StaticModelRegistry {
    /// Create a registry with the bundled table.
    #[must_use]
    pub fn bundled() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "claude-sonnet-4-5".to_string(),
            ModelInfo {
                context_window: 200_000,
                input_cost_per_mtok: Some(3.0),
                output_cost_per_mtok: Some(15.0),
            },
        );
        models.insert(
            "claude-opus-4-1".to_string(),
            ModelInfo {
                context_window: 200_000,
                input_cost_per_mtok: Some(15.0),
                output_cost_per_mtok: Some(75.0),
            },
        );
        models.insert(
            "claude-haiku-4-5".to_string(),
            ModelInfo {
                context_window: 200_000,
                input_cost_per_mtok: Some(1.0),
                output_cost_per_mtok: Some(5.0),
            },
        );
        models.insert(
            "gpt-5".to_string(),
            ModelInfo {
                context_window: 400_000,
                input_cost_per_mtok: Some(1.25),
                output_cost_per_mtok: Some(10.0),
            },
        );
        models.insert(
            "gpt-5-mini".to_string(),
            ModelInfo {
                context_window: 400_000,
                input_cost_per_mtok: Some(0.25),
                output_cost_per_mtok: Some(2.0),
            },
        );
        models.insert(
            "gpt-4o".to_string(),
            ModelInfo {
                context_window: 128_000,
                input_cost_per_mtok: Some(2.5),
                output_cost_per_mtok: Some(10.0),
            },
        );
        Self { models }
    }

    /// Create an empty registry (every lookup misses).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// Insert or replace a model entry.
    pub fn insert(&mut self, model_id: impl Into<String>, info: ModelInfo) {
        self.models.insert(model_id.into(), info);
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn find(&self, model_id: &str) -> Option<ModelInfo> {
        self.models.get(model_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_lookup() {
        let registry = StaticModelRegistry::bundled();
        let info = registry.find("claude-sonnet-4-5").unwrap();
        assert_eq!(info.context_window, 200_000);
    }

    #[test]
    fn test_unknown_model_misses() {
        let registry = StaticModelRegistry::bundled();
        assert!(registry.find("imaginary-model").is_none());
    }

    #[test]
    fn test_cost_with_and_without_pricing() {
        let priced = ModelInfo {
            context_window: 200_000,
            input_cost_per_mtok: Some(3.0),
            output_cost_per_mtok: Some(15.0),
        };
        let cost = priced.cost(1_000_000, 1_000_000);
        assert!((cost - 18.0).abs() < f64::EPSILON);

        let unpriced = ModelInfo {
            context_window: 100_000,
            input_cost_per_mtok: None,
            output_cost_per_mtok: None,
        };
        assert!((unpriced.cost(1_000_000, 1_000_000) - 0.0).abs() < f64::EPSILON);
    }
}
