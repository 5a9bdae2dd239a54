//! Engine builder for flexible configuration
//!
//! Collects configuration piecewise and validates it once on [`build`](EngineBuilder::build).

use crate::config::{AggregationConfig, Config, HitTestConfig, RegionConfig};
use crate::engine::Engine;
use crate::error::Result;

/// Builder for an [`Engine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: Config,
}

impl EngineBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the level-of-detail policy.
    pub fn aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.config = self.config.with_aggregation(aggregation);
        self
    }

    pub fn hit_test(mut self, hit_test: HitTestConfig) -> Self {
        self.config = self.config.with_hit_test(hit_test);
        self
    }

    pub fn regions(mut self, regions: RegionConfig) -> Self {
        self.config = self.config.with_regions(regions);
        self
    }

    /// Shorthand for the most commonly tuned knob.
    pub fn max_events_per_group(mut self, max: usize) -> Self {
        self.config.aggregation = self.config.aggregation.with_max_events_per_group(max);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Engine> {
        Engine::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;

    #[test]
    fn test_builder_default() {
        let engine = EngineBuilder::new().build().unwrap();
        assert_eq!(engine.config(), &Config::default());
    }

    #[test]
    fn test_builder_with_parts() {
        let engine = EngineBuilder::new()
            .aggregation(AggregationConfig::default().with_max_groups(10))
            .hit_test(HitTestConfig::default().with_hit_padding(8.0))
            .regions(RegionConfig::default().with_id_property("ZCTA5CE10"))
            .max_events_per_group(5)
            .build()
            .unwrap();

        let config = engine.config();
        assert_eq!(config.aggregation.max_groups, 10);
        assert_eq!(config.aggregation.max_events_per_group, 5);
        assert_eq!(config.hit_test.hit_padding, 8.0);
        assert_eq!(config.regions.id_property, "ZCTA5CE10");
        assert_eq!(engine.aggregator().config().max_groups, 10);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = EngineBuilder::new()
            .hit_test(HitTestConfig::default().with_cell_px(8.0))
            .build();
        assert!(matches!(result, Err(TallyError::InvalidConfig(_))));
    }
}
