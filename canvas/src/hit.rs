#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use wire::{Point, ShapePayload};

use crate::doc::{DocStore, ShapeId};

/// Whether `pt` hits `shape`, allowing `tolerance` where the shape kind
/// defines one.
#[must_use]
pub fn hit_shape(shape: &ShapePayload, pt: Point, tolerance: f64) -> bool {
    match shape {
        ShapePayload::Rect { x, y, width, height } | ShapePayload::Text { x, y, width, height, .. } => {
            box_contains(*x, *y, *width, *height, pt)
        }
        ShapePayload::Circle { center_x, center_y, radius } => {
            let r = radius.abs();
            let d = pt.distance(Point::new(*center_x, *center_y));
            d <= r || (d - r).abs() <= tolerance
        }
        ShapePayload::Triangle { x, y, width, height } => {
            let a = Point::new(*x, *y);
            let b = Point::new(x + width, *y);
            let c = Point::new(x + width / 2.0, y + height);
            let whole = triangle_area(a, b, c);
            let parts = triangle_area(pt, b, c) + triangle_area(a, pt, c) + triangle_area(a, b, pt);
            (parts - whole).abs() <= tolerance
        }
        ShapePayload::Pencil { points } => match points.as_slice() {
            [] => false,
            [only] => pt.distance(*only) <= tolerance,
            _ => points
                .windows(2)
                .any(|seg| distance_to_segment(pt, seg[0], seg[1]) <= tolerance),
        },
    }
}

/// Every record under `pt`, most-recently-appended first.
#[must_use]
pub fn hits_at(doc: &DocStore, pt: Point, tolerance: f64) -> Vec<ShapeId> {
    doc.top_down()
        .filter(|r| hit_shape(&r.shape, pt, tolerance))
        .map(|r| r.id)
        .collect()
}

/// The top-most record under `pt` (last drawn wins).
#[must_use]
pub fn top_hit(doc: &DocStore, pt: Point, tolerance: f64) -> Option<ShapeId> {
    doc.top_down()
        .find(|r| hit_shape(&r.shape, pt, tolerance))
        .map(|r| r.id)
}

/// Shortest distance from `p` to the segment `a`–`b`.
#[must_use]
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    ((a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y)) / 2.0).abs()
}

/// Containment with negative extents normalised (shapes drawn up or left).
fn box_contains(x: f64, y: f64, width: f64, height: f64, pt: Point) -> bool {
    let (left, right) = if width < 0.0 { (x + width, x) } else { (x, x + width) };
    let (top, bottom) = if height < 0.0 { (y + height, y) } else { (y, y + height) };
    pt.x >= left && pt.x <= right && pt.y >= top && pt.y <= bottom
}
