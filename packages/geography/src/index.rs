//! Bounding-box prefilter for boundary polygons.
//!
//! Builds an R-tree over polygon envelopes so that exact intersection
//! tests only run against boundaries whose bounding boxes overlap the
//! catchment's.

use geo::{BoundingRect, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// A boundary's position in the caller's slice plus its envelope.
struct BoundaryEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of boundary envelopes.
pub struct BoundaryIndex {
    entries: RTree<BoundaryEntry>,
}

impl BoundaryIndex {
    /// Indexes `geometries` by position. Empty geometries are left out.
    pub fn new<'a>(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Self {
        let entries = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(position, geometry)| {
                compute_envelope(geometry).map(|envelope| BoundaryEntry { position, envelope })
            })
            .collect();

        Self {
            entries: RTree::bulk_load(entries),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.size() == 0
    }

    /// Positions of the boundaries whose envelopes overlap `area`'s, in
    /// ascending order.
    #[must_use]
    pub fn candidates(&self, area: &MultiPolygon<f64>) -> Vec<usize> {
        let Some(query_env) = compute_envelope(area) else {
            return Vec::new();
        };

        let mut positions: Vec<usize> = self
            .entries
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.position)
            .collect();
        positions.sort_unstable();
        positions
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
