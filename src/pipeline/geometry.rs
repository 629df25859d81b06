use tracing::debug;

use crate::domain::{CapitalProject, Geometry};
use crate::observability::metrics::{emit_counter, MetricName};

/// Mean of the outer-ring vertices, (longitude, latitude).
///
/// This is a raw vertex average over outer rings only, not an area-weighted
/// centroid, and holes are ignored. Downstream consumers depend on these
/// values, so the approximation is kept as-is.
pub fn centroid(geometry: &Geometry) -> Option<(f64, f64)> {
    match geometry {
        Geometry::Point([x, y]) => Some((*x, *y)),
        Geometry::Polygon(rings) => mean_of_rings(rings.first().into_iter()),
        Geometry::MultiPolygon(polys) => {
            mean_of_rings(polys.iter().filter_map(|rings| rings.first()))
        }
        Geometry::Other(_) => None,
    }
}

fn mean_of_rings<'a, I>(outer_rings: I) -> Option<(f64, f64)>
where
    I: Iterator<Item = &'a Vec<[f64; 2]>>,
{
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for ring in outer_rings {
        for [x, y] in ring {
            sum_x += x;
            sum_y += y;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some((sum_x / count as f64, sum_y / count as f64))
}

/// Douglas-Peucker simplification of a single ring.
///
/// Sequences of two or fewer points are returned unchanged. Coincident
/// endpoints collapse the whole ring to its first point; this degenerate
/// behavior is part of the contract.
pub fn simplify_ring(points: &[[f64; 2]], tolerance: f64) -> Vec<[f64; 2]> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];
    if first == last {
        return vec![first];
    }

    let (max_distance, max_index) = points[1..points.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, point)| (perpendicular_distance(point, &first, &last), i + 1))
        .fold((0.0f64, 0usize), |acc, (d, i)| if d > acc.0 { (d, i) } else { acc });

    if max_distance > tolerance {
        let mut left = simplify_ring(&points[..=max_index], tolerance);
        let right = simplify_ring(&points[max_index..], tolerance);
        // The split point appears at the end of the left half and the start
        // of the right half; keep it once
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn perpendicular_distance(point: &[f64; 2], start: &[f64; 2], end: &[f64; 2]) -> f64 {
    let dx = end[0] - start[0];
    let dy = end[1] - start[1];
    let length = (dx * dx + dy * dy).sqrt();
    let cross = dx * (start[1] - point[1]) - dy * (start[0] - point[0]);
    cross.abs() / length
}

/// Simplify every ring of a geometry under the given tolerance.
/// Points are not simplifiable and unrecognized geometry types pass through.
pub fn simplify_geometry(geometry: &Geometry, tolerance: f64) -> Geometry {
    match geometry {
        Geometry::Point(p) => Geometry::Point(*p),
        Geometry::Polygon(rings) => Geometry::Polygon(
            rings
                .iter()
                .map(|ring| simplify_ring(ring, tolerance))
                .collect(),
        ),
        Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
            polys
                .iter()
                .map(|rings| {
                    rings
                        .iter()
                        .map(|ring| simplify_ring(ring, tolerance))
                        .collect()
                })
                .collect(),
        ),
        Geometry::Other(value) => Geometry::Other(value.clone()),
    }
}

/// Attach simplified geometry and centroid to every capital project
pub fn simplify_projects(projects: Vec<CapitalProject>, tolerance: f64) -> Vec<CapitalProject> {
    projects
        .into_iter()
        .map(|mut project| {
            let simplified = simplify_geometry(&project.geometry, tolerance);
            let before = project.geometry.vertex_count();
            let after = simplified.vertex_count();
            if after < before {
                emit_counter(MetricName::GeometryRingsSimplified, 1.0);
                emit_counter(MetricName::GeometryVerticesRemoved, (before - after) as f64);
                debug!(
                    project_id = %project.project_id,
                    before,
                    after,
                    "Simplified project geometry"
                );
            }
            project.centroid = centroid(&project.geometry);
            project.simplified_geometry = Some(simplified);
            project
        })
        .collect()
}
