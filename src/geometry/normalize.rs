//! Boundary normalization: raw rings to a canonical valid region.

use geo::orient::Direction;
use geo::{Area, BooleanOps, BoundingRect, LineString, MultiPolygon, Orient, Polygon, Simplify};
use geo::Validation;
use tracing::debug;

use crate::config::HierarchyConfig;
use crate::error::GeometryError;
use crate::models::{BBox, Segment, SegmentInput};

/// Normalize one upstream segment.
///
/// Rings are snapped (consecutive points within `snap_epsilon` merge), the
/// polygon is simplified and oriented, and self-intersections are repaired
/// with an empty union. Inputs with fewer than 3 distinct outer points or no
/// enclosed area come back as degenerate segments rather than errors.
pub fn normalize(input: &SegmentInput, config: &HierarchyConfig) -> Result<Segment, GeometryError> {
    let id = &input.id;

    let all_points = || input.boundary.iter().flatten();
    if all_points().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(GeometryError::NonFinite { id: id.clone() });
    }
    let raw_bbox = BBox::from_points(all_points());

    let mut rings = input
        .boundary
        .iter()
        .map(|ring| snap_ring(ring, config.snap_epsilon));

    let exterior = match rings.next() {
        Some(ring) if ring.len() >= 3 => ring,
        _ => {
            debug!("Segment {} has fewer than 3 distinct points", id);
            return Ok(Segment::degenerate(id.clone(), raw_bbox));
        }
    };

    let holes: Vec<LineString<f64>> = rings
        .filter(|ring| ring.len() >= 3)
        .map(LineString::from)
        .collect();

    let mut polygon = Polygon::new(LineString::from(exterior), holes);
    if config.snap_epsilon > 0.0 {
        polygon = polygon.simplify(config.snap_epsilon);
    }

    let region = match repair(id, polygon, config)? {
        Some(region) => region,
        None => return Ok(Segment::degenerate(id.clone(), raw_bbox)),
    };

    let area = region.unsigned_area();
    if !(area > config.min_area) {
        debug!("Segment {} has no enclosed area", id);
        return Ok(Segment::degenerate(id.clone(), raw_bbox));
    }

    let bbox = match region.bounding_rect() {
        Some(rect) => BBox::from(rect),
        None => return Ok(Segment::degenerate(id.clone(), raw_bbox)),
    };

    Ok(Segment::new(id.clone(), region, bbox, area))
}

/// Collapse runs of near-duplicate points and drop the closing point.
fn snap_ring(ring: &[[f64; 2]], epsilon: f64) -> Vec<[f64; 2]> {
    let mut out: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for p in ring {
        match out.last() {
            Some(last) if within(last, p, epsilon) => continue,
            _ => out.push(*p),
        }
    }

    while out.len() > 1 && within(&out[0], &out[out.len() - 1], epsilon) {
        out.pop();
    }

    out
}

fn within(a: &[f64; 2], b: &[f64; 2], epsilon: f64) -> bool {
    (a[0] - b[0]).hypot(a[1] - b[1]) <= epsilon
}

/// Returns `Ok(None)` when the polygon turns out to enclose nothing.
fn repair(
    id: &str,
    polygon: Polygon<f64>,
    config: &HierarchyConfig,
) -> Result<Option<MultiPolygon<f64>>, GeometryError> {
    let polygon = polygon.orient(Direction::Default);
    if polygon.is_valid() {
        return Ok(Some(MultiPolygon::new(vec![polygon])));
    }

    debug!("Segment {} is not a valid polygon, repairing", id);
    let repaired = polygon.union(&MultiPolygon::<f64>::new(vec![]));

    if repaired.0.is_empty() {
        if polygon.unsigned_area() <= config.min_area {
            return Ok(None);
        }
        return Err(GeometryError::Irreparable {
            id: id.to_string(),
            reason: "repair produced an empty region".to_string(),
        });
    }

    match repaired.check_validation() {
        Ok(()) => Ok(Some(repaired.orient(Direction::Default))),
        Err(e) => Err(GeometryError::Irreparable {
            id: id.to_string(),
            reason: e.to_string(),
        }),
    }
}
