//! Queen and rook contiguity from shared polygon boundaries.
//!
//! Candidate pairs come from an R-tree over polygon bounding boxes; each
//! candidate is then confirmed by intersecting boundary segments. Queen
//! contiguity accepts any shared point, rook requires a shared segment of
//! positive length.

use std::collections::BTreeSet;

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{BoundingRect, Coord, Line, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SpatialError;

/// Rule deciding whether two polygons are neighbours.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Contiguity {
    /// Boundaries share at least one point (corners count).
    #[default]
    Queen,
    /// Boundaries share an edge of positive length.
    Rook,
}

/// Options for [`build_contiguity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContiguityOptions {
    /// Adjacency rule.
    #[serde(default)]
    pub rule: Contiguity,
    /// Grid size that vertices are snapped to before comparison. `None`
    /// compares coordinates exactly.
    #[serde(default)]
    pub precision: Option<f64>,
}

/// A symmetric neighbour relation over areal units.
///
/// Neighbour lists are sorted and never contain the unit itself. Units
/// with empty lists are islands; they are kept, not dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    ids: Vec<String>,
    links: Vec<Vec<usize>>,
}

/// Counts describing a neighbour relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighbourSummary {
    /// Number of units.
    pub units: usize,
    /// Number of directed links (each unordered pair counts twice).
    pub links: usize,
    /// Average number of neighbours per unit.
    pub mean_links: f64,
    /// Smallest neighbour count.
    pub min_links: usize,
    /// Largest neighbour count.
    pub max_links: usize,
    /// Identifiers of units with no neighbours.
    pub islands: Vec<String>,
}

impl Neighbours {
    /// Builds a relation from explicit index links.
    ///
    /// Links are symmetrized, de-duplicated, and sorted; self links are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DimensionMismatch`] if `links` and `ids`
    /// differ in length, or [`SpatialError::InvalidLink`] for an
    /// out-of-range index.
    pub fn from_links(ids: Vec<String>, links: &[Vec<usize>]) -> Result<Self, SpatialError> {
        let len = ids.len();
        if links.len() != len {
            return Err(SpatialError::DimensionMismatch {
                expected: len,
                actual: links.len(),
            });
        }

        let mut sets = vec![BTreeSet::new(); len];
        for (from, row) in links.iter().enumerate() {
            for &to in row {
                if to >= len {
                    return Err(SpatialError::InvalidLink { from, to, len });
                }
                if to != from {
                    sets[from].insert(to);
                    sets[to].insert(from);
                }
            }
        }

        Ok(Self::from_sets(ids, sets))
    }

    fn from_sets(ids: Vec<String>, sets: Vec<BTreeSet<usize>>) -> Self {
        Self {
            ids,
            links: sets.into_iter().map(|s| s.into_iter().collect()).collect(),
        }
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Unit identifiers in row order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Sorted neighbour indices of unit `i`.
    #[must_use]
    pub fn neighbours(&self, i: usize) -> &[usize] {
        &self.links[i]
    }

    /// Neighbour count of unit `i`.
    #[must_use]
    pub fn cardinality(&self, i: usize) -> usize {
        self.links[i].len()
    }

    /// Whether `j` is a neighbour of `i`.
    #[must_use]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.links[i].binary_search(&j).is_ok()
    }

    /// Indices of units with no neighbours.
    #[must_use]
    pub fn islands(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.links[i].is_empty()).collect()
    }

    /// Neighbour identifiers of the unit with identifier `id`.
    #[must_use]
    pub fn neighbour_ids(&self, id: &str) -> Option<BTreeSet<&str>> {
        let i = self.ids.iter().position(|x| x == id)?;
        Some(
            self.links[i]
                .iter()
                .map(|&j| self.ids[j].as_str())
                .collect(),
        )
    }

    /// Unordered neighbour pairs by identifier, smaller identifier first.
    #[must_use]
    pub fn id_pairs(&self) -> BTreeSet<(&str, &str)> {
        let mut pairs = BTreeSet::new();
        for (i, row) in self.links.iter().enumerate() {
            for &j in row {
                let (a, b) = (self.ids[i].as_str(), self.ids[j].as_str());
                pairs.insert(if a <= b { (a, b) } else { (b, a) });
            }
        }
        pairs
    }

    /// Whether every link has its reverse.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.links
            .iter()
            .enumerate()
            .all(|(i, row)| row.iter().all(|&j| self.contains(j, i)))
    }

    /// Summary counts for reporting.
    #[must_use]
    pub fn summary(&self) -> NeighbourSummary {
        let counts: Vec<usize> = self.links.iter().map(Vec::len).collect();
        let links: usize = counts.iter().sum();

        #[allow(clippy::cast_precision_loss)]
        let mean_links = if counts.is_empty() {
            0.0
        } else {
            links as f64 / counts.len() as f64
        };

        NeighbourSummary {
            units: self.len(),
            links,
            mean_links,
            min_links: counts.iter().copied().min().unwrap_or(0),
            max_links: counts.iter().copied().max().unwrap_or(0),
            islands: self
                .islands()
                .into_iter()
                .map(|i| self.ids[i].clone())
                .collect(),
        }
    }
}

/// A boundary in the R-tree, keyed by its input index.
struct BoundaryEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Boundary segments of one unit (exterior and interior rings).
struct PreparedBoundary {
    segments: Vec<Line<f64>>,
    envelope: AABB<[f64; 2]>,
}

/// Derives the neighbour relation from polygon boundaries.
///
/// The result does not depend on input order: every pair is judged by a
/// symmetric predicate on its two boundaries alone.
///
/// # Errors
///
/// Returns [`SpatialError::DimensionMismatch`] if `ids` and `geometries`
/// differ in length, or [`SpatialError::InvalidOption`] for a
/// non-positive precision.
pub fn build_contiguity(
    ids: &[String],
    geometries: &[&MultiPolygon<f64>],
    options: &ContiguityOptions,
) -> Result<Neighbours, SpatialError> {
    if ids.len() != geometries.len() {
        return Err(SpatialError::DimensionMismatch {
            expected: ids.len(),
            actual: geometries.len(),
        });
    }
    if let Some(p) = options.precision {
        if !(p.is_finite() && p > 0.0) {
            return Err(SpatialError::InvalidOption {
                message: format!("precision must be positive, got {p}"),
            });
        }
    }

    let prepared: Vec<PreparedBoundary> = geometries
        .iter()
        .map(|mp| prepare_boundary(mp, options.precision))
        .collect();

    let tree = RTree::bulk_load(
        prepared
            .iter()
            .enumerate()
            .map(|(index, b)| BoundaryEntry {
                index,
                envelope: b.envelope,
            })
            .collect(),
    );

    let mut sets = vec![BTreeSet::new(); ids.len()];
    let mut candidates = 0usize;

    for (i, boundary) in prepared.iter().enumerate() {
        for entry in tree.locate_in_envelope_intersecting(&boundary.envelope) {
            let j = entry.index;
            if j <= i {
                continue;
            }
            candidates += 1;
            if boundaries_touch(&boundary.segments, &prepared[j].segments, options.rule) {
                sets[i].insert(j);
                sets[j].insert(i);
            }
        }
    }

    let neighbours = Neighbours::from_sets(ids.to_vec(), sets);
    let summary = neighbours.summary();
    log::debug!("Checked {candidates} candidate pairs from envelope overlap");
    log::info!(
        "Built {} contiguity for {} units: {} links, mean {:.2} neighbours",
        options.rule,
        summary.units,
        summary.links,
        summary.mean_links
    );
    if !summary.islands.is_empty() {
        log::warn!(
            "{} unit(s) have no {} neighbours: {}",
            summary.islands.len(),
            options.rule,
            summary.islands.join(", ")
        );
    }

    Ok(neighbours)
}

fn prepare_boundary(mp: &MultiPolygon<f64>, precision: Option<f64>) -> PreparedBoundary {
    let snap = |c: Coord<f64>| match precision {
        Some(p) => Coord {
            x: (c.x / p).round() * p,
            y: (c.y / p).round() * p,
        },
        None => c,
    };

    let segments = mp
        .0
        .iter()
        .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()))
        .flat_map(|ring| ring.lines())
        .map(|l| Line::new(snap(l.start), snap(l.end)))
        .filter(|l| l.start != l.end)
        .collect();

    PreparedBoundary {
        segments,
        envelope: compute_envelope(mp, precision.unwrap_or(0.0)),
    }
}

/// Whether two boundaries meet under `rule`.
fn boundaries_touch(a: &[Line<f64>], b: &[Line<f64>], rule: Contiguity) -> bool {
    for sa in a {
        for sb in b {
            if !segment_boxes_overlap(sa, sb) {
                continue;
            }
            match line_intersection(*sa, *sb) {
                None => {}
                Some(LineIntersection::SinglePoint { .. }) => {
                    if rule == Contiguity::Queen {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    if rule == Contiguity::Queen || intersection.start != intersection.end {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn segment_boxes_overlap(a: &Line<f64>, b: &Line<f64>) -> bool {
    a.start.x.min(a.end.x) <= b.start.x.max(b.end.x)
        && b.start.x.min(b.end.x) <= a.start.x.max(a.end.x)
        && a.start.y.min(a.end.y) <= b.start.y.max(b.end.y)
        && b.start.y.min(b.end.y) <= a.start.y.max(a.end.y)
}

/// Compute the bounding box envelope for a [`MultiPolygon`], padded by
/// `pad` so that snapped vertices still fall inside it.
fn compute_envelope(mp: &MultiPolygon<f64>, pad: f64) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| {
            AABB::from_corners(
                [rect.min().x - pad, rect.min().y - pad],
                [rect.max().x + pad, rect.max().y + pad],
            )
        },
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::polygon;

    /// Unit square with lower-left corner at (`x`, `y`).
    pub(crate) fn square(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
        ]])
    }

    /// Row-major `rows` x `cols` grid of unit squares with ids `r{row}c{col}`.
    pub(crate) fn grid(rows: usize, cols: usize) -> (Vec<String>, Vec<MultiPolygon<f64>>) {
        let mut ids = Vec::new();
        let mut polys = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                ids.push(format!("r{r}c{c}"));
                #[allow(clippy::cast_precision_loss)]
                polys.push(square(c as f64, r as f64));
            }
        }
        (ids, polys)
    }

    pub(crate) fn grid_neighbours(rows: usize, cols: usize, rule: Contiguity) -> Neighbours {
        let (ids, polys) = grid(rows, cols);
        let refs: Vec<&MultiPolygon<f64>> = polys.iter().collect();
        build_contiguity(
            &ids,
            &refs,
            &ContiguityOptions {
                rule,
                precision: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn two_by_two_rook_has_two_neighbours_each() {
        let nb = grid_neighbours(2, 2, Contiguity::Rook);
        for i in 0..4 {
            assert_eq!(nb.cardinality(i), 2, "unit {} under rook", nb.ids()[i]);
        }
        assert!(!nb.contains(0, 3), "diagonal squares are not rook neighbours");
    }

    #[test]
    fn two_by_two_queen_has_three_neighbours_each() {
        let nb = grid_neighbours(2, 2, Contiguity::Queen);
        for i in 0..4 {
            assert_eq!(nb.cardinality(i), 3, "unit {} under queen", nb.ids()[i]);
        }
        assert!(nb.contains(0, 3));
    }

    #[test]
    fn rook_pairs_are_subset_of_queen_pairs() {
        let rook = grid_neighbours(4, 5, Contiguity::Rook);
        let queen = grid_neighbours(4, 5, Contiguity::Queen);
        let rook_pairs = rook.id_pairs();
        let queen_pairs = queen.id_pairs();
        assert!(rook_pairs.is_subset(&queen_pairs));
        assert!(rook_pairs.len() < queen_pairs.len());
    }

    #[test]
    fn relation_is_symmetric() {
        assert!(grid_neighbours(3, 4, Contiguity::Queen).is_symmetric());
        assert!(grid_neighbours(3, 4, Contiguity::Rook).is_symmetric());
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let (ids, polys) = grid(3, 3);
        let forward: Vec<&MultiPolygon<f64>> = polys.iter().collect();
        let reversed_ids: Vec<String> = ids.iter().rev().cloned().collect();
        let reversed: Vec<&MultiPolygon<f64>> = polys.iter().rev().collect();
        let options = ContiguityOptions::default();

        let a = build_contiguity(&ids, &forward, &options).unwrap();
        let b = build_contiguity(&reversed_ids, &reversed, &options).unwrap();
        assert_eq!(a.id_pairs(), b.id_pairs());
        for id in &ids {
            assert_eq!(a.neighbour_ids(id), b.neighbour_ids(id), "neighbours of {id}");
        }
    }

    #[test]
    fn isolated_polygon_is_kept_as_island() {
        let polys = [square(0.0, 0.0), square(1.0, 0.0), square(10.0, 10.0)];
        let refs: Vec<&MultiPolygon<f64>> = polys.iter().collect();
        let ids = vec!["a".to_string(), "b".to_string(), "far".to_string()];
        let nb = build_contiguity(&ids, &refs, &ContiguityOptions::default()).unwrap();

        assert_eq!(nb.len(), 3);
        assert_eq!(nb.islands(), vec![2]);
        assert_eq!(nb.summary().islands, vec!["far".to_string()]);
    }

    #[test]
    fn partially_shared_edge_counts_for_rook() {
        // b's left edge covers only half of a's right edge.
        let a = square(0.0, 0.0);
        let b = MultiPolygon(vec![polygon![
            (x: 1.0, y: 0.5),
            (x: 2.0, y: 0.5),
            (x: 2.0, y: 1.5),
            (x: 1.0, y: 1.5),
        ]]);
        let ids = vec!["a".to_string(), "b".to_string()];
        let options = ContiguityOptions {
            rule: Contiguity::Rook,
            precision: None,
        };
        let nb = build_contiguity(&ids, &[&a, &b], &options).unwrap();
        assert!(nb.contains(0, 1));
    }

    #[test]
    fn precision_snaps_near_coincident_boundaries() {
        let a = square(0.0, 0.0);
        let b = square(1.000_000_1, 0.0);
        let ids = vec!["a".to_string(), "b".to_string()];
        let exact = build_contiguity(&ids, &[&a, &b], &ContiguityOptions::default()).unwrap();
        assert!(!exact.contains(0, 1));

        let snapped = build_contiguity(
            &ids,
            &[&a, &b],
            &ContiguityOptions {
                rule: Contiguity::Rook,
                precision: Some(1e-4),
            },
        )
        .unwrap();
        assert!(snapped.contains(0, 1));
    }

    #[test]
    fn rejects_non_positive_precision() {
        let a = square(0.0, 0.0);
        let options = ContiguityOptions {
            rule: Contiguity::Queen,
            precision: Some(0.0),
        };
        assert!(matches!(
            build_contiguity(&["a".to_string()], &[&a], &options),
            Err(SpatialError::InvalidOption { .. })
        ));
    }

    #[test]
    fn from_links_symmetrizes_and_drops_self_links() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let nb = Neighbours::from_links(ids, &[vec![0, 1], vec![], vec![1, 1]]).unwrap();
        assert_eq!(nb.neighbours(0), &[1]);
        assert_eq!(nb.neighbours(1), &[0, 2]);
        assert_eq!(nb.neighbours(2), &[1]);
        assert!(nb.is_symmetric());
    }

    #[test]
    fn from_links_rejects_out_of_range_index() {
        let ids = vec!["a".to_string()];
        assert!(matches!(
            Neighbours::from_links(ids, &[vec![3]]),
            Err(SpatialError::InvalidLink { to: 3, .. })
        ));
    }

    #[test]
    fn contiguity_parses_from_string() {
        assert_eq!("rook".parse::<Contiguity>().unwrap(), Contiguity::Rook);
        assert_eq!(Contiguity::Queen.to_string(), "queen");
    }
}
