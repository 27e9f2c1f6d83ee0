//! Configuration for feature stores and cluster engines
//!
//! This module provides configuration types and re-exports the configuration
//! enums from the `mapcluster-types` crate for convenience.
use serde::de::Error;

pub use mapcluster_types::config::{ClusterBuilderMode, SpatialIndexKind};

/// Zoom level above which no renderer draws anything meaningful.
pub const MAX_SUPPORTED_ZOOM: f32 = 24.0;

/// Feature store configuration
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub index_kind: SpatialIndexKind,
}

impl StoreConfig {
    pub fn with_index_kind(mut self, kind: SpatialIndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: StoreConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: StoreConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Cluster engine configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Minimum on-screen distance between two displayed clusters, in
    /// device-independent pixels. Zero disables merging.
    #[serde(default = "ClusterConfig::default_min_cluster_distance")]
    pub min_cluster_distance_px: f32,

    /// At or above this zoom every visible leaf is shown individually.
    #[serde(default = "ClusterConfig::default_max_cluster_zoom")]
    pub max_cluster_zoom: f32,

    #[serde(default = "ClusterConfig::default_animated")]
    pub animated: bool,

    /// Device pixels per device-independent pixel.
    #[serde(default = "ClusterConfig::default_dpi_scale")]
    pub dpi_scale: f32,

    /// Working-set size bound for the greedy merge phase
    #[serde(default = "ClusterConfig::default_hierarchical_threshold")]
    pub hierarchical_threshold: usize,
}

impl ClusterConfig {
    const fn default_min_cluster_distance() -> f32 {
        100.0
    }

    const fn default_max_cluster_zoom() -> f32 {
        MAX_SUPPORTED_ZOOM
    }

    const fn default_animated() -> bool {
        true
    }

    const fn default_dpi_scale() -> f32 {
        1.0
    }

    const fn default_hierarchical_threshold() -> usize {
        100
    }

    pub fn with_min_cluster_distance(mut self, px: f32) -> Self {
        assert!(px >= 0.0, "Minimum cluster distance must not be negative");
        self.min_cluster_distance_px = px;
        self
    }

    pub fn with_max_cluster_zoom(mut self, zoom: f32) -> Self {
        self.max_cluster_zoom = zoom;
        self
    }

    pub fn with_animated(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    pub fn with_dpi_scale(mut self, scale: f32) -> Self {
        assert!(scale > 0.0, "DPI scale must be greater than zero");
        self.dpi_scale = scale;
        self
    }

    pub fn with_hierarchical_threshold(mut self, threshold: usize) -> Self {
        assert!(threshold > 0, "Hierarchical threshold must be greater than zero");

        if threshold > 2_000 {
            log::warn!(
                "Hierarchical threshold of {} makes each merge pass quadratic in a large \
                working set and may exceed the frame budget.",
                threshold
            );
        }

        self.hierarchical_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_cluster_distance_px >= 0.0) {
            return Err("Minimum cluster distance must not be negative".to_string());
        }

        if !(self.dpi_scale > 0.0) {
            return Err("DPI scale must be greater than zero".to_string());
        }

        if self.hierarchical_threshold == 0 {
            return Err("Hierarchical threshold must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: ClusterConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: ClusterConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_cluster_distance_px: Self::default_min_cluster_distance(),
            max_cluster_zoom: Self::default_max_cluster_zoom(),
            animated: Self::default_animated(),
            dpi_scale: Self::default_dpi_scale(),
            hierarchical_threshold: Self::default_hierarchical_threshold(),
        }
    }
}
