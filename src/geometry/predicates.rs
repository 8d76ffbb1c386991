//! Exact predicates on normalized regions.

use geo::{Area, BooleanOps, Contains, Point};

use crate::error::GeometryError;
use crate::models::Segment;

/// Slack allowed when checking an intersection against its inputs.
const AREA_SLACK: f64 = 1e-6;

/// Area of `region(a) ∩ region(b)`.
///
/// Fails when the overlay result is not a finite area no larger than the
/// smaller input, which only happens for regions that are still malformed.
pub fn intersection_area(a: &Segment, b: &Segment) -> Result<f64, GeometryError> {
    let area = a.region().intersection(b.region()).unsigned_area();

    let bound = a.area().min(b.area());
    if !area.is_finite() {
        return Err(intersection_error(a, b, format!("non-finite area {}", area)));
    }
    if area > bound * (1.0 + AREA_SLACK) + f64::EPSILON {
        return Err(intersection_error(
            a,
            b,
            format!("intersection area {} exceeds smaller region {}", area, bound),
        ));
    }

    Ok(area.min(bound))
}

fn intersection_error(a: &Segment, b: &Segment, reason: String) -> GeometryError {
    GeometryError::Intersection {
        ancestor: a.id().to_string(),
        descendant: b.id().to_string(),
        reason,
    }
}

/// Point-in-region test; points on the boundary are outside.
pub fn region_contains_point(segment: &Segment, x: f64, y: f64) -> bool {
    !segment.is_degenerate()
        && segment.bbox().contains_point(x, y)
        && segment.region().contains(&Point::new(x, y))
}
