use serde::{Deserialize, Serialize};

/// Spatial index strategy backing a feature store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpatialIndexKind {
    /// Unordered list, every query returns everything. Best for small sets.
    #[default]
    Null,
    /// Adaptive binary KD-tree with per-node bounding volumes.
    KdTree,
}

/// How a cluster element builder wants to receive cluster contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBuilderMode {
    /// The builder only needs the member count.
    ElementCount,
    /// The builder receives the full member list.
    #[default]
    Elements,
}
