//! Feature store builder
//!
//! This module provides a builder pattern for creating stores with a custom
//! projection, index strategy and simplifier.

use crate::compute::projection::{PlanarProjection, Projection};
use crate::compute::simplify::GeometrySimplifier;
use crate::config::{SpatialIndexKind, StoreConfig};
use crate::error::Result;
use crate::store::FeatureStore;
use std::sync::Arc;

/// Builder for [`FeatureStore`].
#[derive(Debug)]
pub struct StoreBuilder {
    projection: Arc<dyn Projection>,
    config: StoreConfig,
    simplifier: Option<Arc<dyn GeometrySimplifier>>,
}

impl StoreBuilder {
    /// Create a new builder for a planar store without culling.
    pub fn new() -> Self {
        Self {
            projection: Arc::new(PlanarProjection::new()),
            config: StoreConfig::default(),
            simplifier: None,
        }
    }

    /// Set the map projection.
    pub fn projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projection = projection;
        self
    }

    /// Set the store configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn index_kind(mut self, kind: SpatialIndexKind) -> Self {
        self.config = self.config.with_index_kind(kind);
        self
    }

    /// Attach a geometry simplifier used by visibility queries.
    pub fn simplifier(mut self, simplifier: Arc<dyn GeometrySimplifier>) -> Self {
        self.simplifier = Some(simplifier);
        self
    }

    /// Build the store.
    pub fn build(self) -> Result<FeatureStore> {
        let store = FeatureStore::new(self.projection, self.config)?;
        if self.simplifier.is_some() {
            store.set_simplifier(self.simplifier);
        }
        Ok(store)
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
