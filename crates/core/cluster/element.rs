//! Construction of the renderable markers standing in for clusters.

use crate::config::ClusterBuilderMode;
use crate::feature::{Feature, FeatureRef};
use mapcluster_types::bounds::MapPos;
use mapcluster_types::geometry::FeatureGeometry;

/// Caller-supplied factory for cluster markers.
///
/// The engine asks for [`ClusterElementBuilder::mode`] once per tree build
/// and then calls only the matching method. Positions are map coordinates.
/// Point markers are moved by the engine while clusters animate; other
/// geometries stay where the builder put them.
pub trait ClusterElementBuilder: Send + Sync {
    fn mode(&self) -> ClusterBuilderMode {
        ClusterBuilderMode::Elements
    }

    /// Marker for a cluster of `count` features.
    fn build_from_count(&self, pos: MapPos, count: usize) -> FeatureRef {
        Feature::new(FeatureGeometry::point(pos.x, pos.y))
            .with_metadata("count", count)
            .into_ref()
    }

    /// Marker for a cluster with the given members.
    fn build_from_elements(&self, pos: MapPos, elements: &[FeatureRef]) -> FeatureRef {
        self.build_from_count(pos, elements.len())
    }
}

/// Builder producing point markers with a `count` metadata entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingElementBuilder;

impl ClusterElementBuilder for CountingElementBuilder {
    fn mode(&self) -> ClusterBuilderMode {
        ClusterBuilderMode::ElementCount
    }
}
