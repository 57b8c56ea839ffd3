//! Polygon validity checks applied before contiguity is computed.
//!
//! Rejects empty geometries, rings with fewer than three distinct
//! vertices, zero-area exteriors, and self-intersecting rings. Consecutive
//! duplicate vertices are tolerated.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, Coord, Line, LineString, MultiPolygon};

use crate::AreaError;

/// Validates a unit's boundary.
///
/// # Errors
///
/// Returns [`AreaError::InvalidGeometry`] describing the first defect found.
pub fn validate_geometry(id: &str, geometry: &MultiPolygon<f64>) -> Result<(), AreaError> {
    let invalid = |message: String| AreaError::InvalidGeometry {
        id: id.to_string(),
        message,
    };

    if geometry.0.is_empty() {
        return Err(invalid("geometry is empty".to_string()));
    }

    for (p, polygon) in geometry.0.iter().enumerate() {
        if polygon.unsigned_area() <= 0.0 {
            return Err(invalid(format!("polygon {p} has zero area")));
        }

        let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
        for (r, ring) in rings.enumerate() {
            let segments = ring_segments(ring);
            if segments.len() < 3 {
                return Err(invalid(format!(
                    "ring {r} of polygon {p} has fewer than 3 distinct vertices"
                )));
            }
            if let Some(at) = find_self_intersection(&segments) {
                return Err(invalid(format!(
                    "ring {r} of polygon {p} self-intersects near ({}, {})",
                    at.x, at.y
                )));
            }
        }
    }

    Ok(())
}

/// Segments of a closed ring with zero-length segments removed.
fn ring_segments(ring: &LineString<f64>) -> Vec<Line<f64>> {
    ring.lines().filter(|l| l.start != l.end).collect()
}

/// Returns a coordinate where two non-adjacent segments of the ring meet,
/// or where adjacent segments fold back over each other.
fn find_self_intersection(segments: &[Line<f64>]) -> Option<Coord<f64>> {
    let m = segments.len();

    for i in 0..m {
        for j in (i + 1)..m {
            let adjacent = j == i + 1 || (i == 0 && j == m - 1);
            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if !adjacent {
                        return Some(intersection);
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    if !adjacent || intersection.start != intersection.end {
                        return Some(intersection.start);
                    }
                }
            }
        }
    }

    None
}
