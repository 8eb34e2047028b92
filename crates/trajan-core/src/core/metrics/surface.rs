//! Solvent-accessible surface and occlusion by Shrake–Rupley dot sampling.
//!
//! Each atom is inflated by the probe radius and covered with the dots of a
//! geodesic sphere; a dot is accessible when no other inflated atom contains
//! it. Candidate occluders come from a range query on an immutable k-d tree;
//! frames that stack more atoms on one position than a tree leaf holds are
//! scanned linearly instead.

use super::{MetricEvaluator, MetricInput};
use crate::core::models::frame::Frame;
use crate::core::models::mask::AtomMask;
use crate::core::utils::identifiers::vdw_radius;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::LazyLock;
use tracing::debug;

/// Radius of the solvent probe, in Å.
pub const PROBE_RADIUS: f64 = 1.4;

/// Leaf capacity of [`ImmutableKdTree`].
const TREE_BUCKET: usize = 32;

/// Icosahedron subdivision level of the dot sphere (162 dots).
const SPHERE_SUBDIVISIONS: usize = 2;

static UNIT_SPHERE: LazyLock<Vec<Vector3<f64>>> =
    LazyLock::new(|| geodesic_sphere(SPHERE_SUBDIVISIONS));

/// Vertices of an icosahedron subdivided `level` times, projected onto the
/// unit sphere.
pub fn geodesic_sphere(level: usize) -> Vec<Vector3<f64>> {
    let t = (1.0 + 5.0f64.sqrt()) / 2.0;
    let mut vertices: Vec<Vector3<f64>> = [
        (-1.0, t, 0.0),
        (1.0, t, 0.0),
        (-1.0, -t, 0.0),
        (1.0, -t, 0.0),
        (0.0, -1.0, t),
        (0.0, 1.0, t),
        (0.0, -1.0, -t),
        (0.0, 1.0, -t),
        (t, 0.0, -1.0),
        (t, 0.0, 1.0),
        (-t, 0.0, -1.0),
        (-t, 0.0, 1.0),
    ]
    .iter()
    .map(|&(x, y, z)| Vector3::new(x, y, z).normalize())
    .collect();

    let mut faces: Vec<[usize; 3]> = vec![
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    for _ in 0..level {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vector3<f64>>| -> usize {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                vertices.push(((vertices[a] + vertices[b]) * 0.5).normalize());
                vertices.len() - 1
            })
        };
        let mut next = Vec::with_capacity(faces.len() * 4);
        for &[a, b, c] in &faces {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        faces = next;
    }
    vertices
}

enum NeighbourIndex {
    Tree(ImmutableKdTree<f64, 3>),
    Scan,
}

impl NeighbourIndex {
    fn build(points: &[[f64; 3]]) -> Self {
        let mut stacked: HashMap<[u64; 3], usize> = HashMap::new();
        for p in points {
            let count = stacked.entry(p.map(f64::to_bits)).or_default();
            *count += 1;
            if *count > TREE_BUCKET {
                debug!(atoms = points.len(), "Stacked atom positions; scanning neighbours linearly.");
                return Self::Scan;
            }
        }
        Self::Tree(ImmutableKdTree::new_from_slice(points))
    }

    fn within(&self, points: &[[f64; 3]], query: &[f64; 3], reach_squared: f64) -> Vec<usize> {
        match self {
            Self::Tree(tree) => tree
                .within_unsorted::<SquaredEuclidean>(query, reach_squared)
                .into_iter()
                .map(|nn| nn.item as usize)
                .collect(),
            Self::Scan => points
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    let d: f64 = p.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
                    d <= reach_squared
                })
                .map(|(j, _)| j)
                .collect(),
        }
    }
}

/// Per-atom accessible area (Å²) and accessible dot fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceProfile {
    pub area: Vec<f64>,
    pub exposed_fraction: Vec<f64>,
}

/// Samples the surface of every atom of `frame`, with all atoms acting as
/// occluders.
pub fn surface_profile(frame: &Frame, coords: &[Point3<f64>]) -> SurfaceProfile {
    let n = frame.atom_count().min(coords.len());
    if n == 0 {
        return SurfaceProfile {
            area: Vec::new(),
            exposed_fraction: Vec::new(),
        };
    }

    let radii: Vec<f64> = frame.atoms()[..n]
        .iter()
        .map(|a| vdw_radius(&a.element) + PROBE_RADIUS)
        .collect();
    let max_radius = radii.iter().copied().fold(0.0, f64::max);
    let points: Vec<[f64; 3]> = coords[..n].iter().map(|p| [p.x, p.y, p.z]).collect();
    let index = NeighbourIndex::build(&points);
    let dots = &*UNIT_SPHERE;

    let mut area = Vec::with_capacity(n);
    let mut exposed_fraction = Vec::with_capacity(n);
    for i in 0..n {
        let reach = radii[i] + max_radius;
        let neighbours: Vec<usize> = index
            .within(&points, &points[i], reach * reach)
            .into_iter()
            .filter(|&j| j != i && (coords[i] - coords[j]).norm() < radii[i] + radii[j])
            .collect();

        let exposed = dots
            .iter()
            .filter(|u| {
                let dot = coords[i] + *u * radii[i];
                neighbours
                    .iter()
                    .all(|&j| (dot - coords[j]).norm_squared() >= radii[j] * radii[j])
            })
            .count();
        let fraction = exposed as f64 / dots.len() as f64;
        area.push(4.0 * PI * radii[i] * radii[i] * fraction);
        exposed_fraction.push(fraction);
    }

    SurfaceProfile {
        area,
        exposed_fraction,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMeasure {
    /// Accessible area in Å².
    Area,
    /// Buried fraction of the sampled surface, in `[0, 1]`.
    Occlusion,
}

/// SAS and occlusion for all atoms or for selection 0.
///
/// Time-based: total area, or mean occlusion over the counted atoms.
/// Residue-based: area summed per residue, or occlusion averaged per residue.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceEvaluator {
    measure: SurfaceMeasure,
    scoped: bool,
}

impl SurfaceEvaluator {
    pub fn new(measure: SurfaceMeasure, scoped: bool) -> Self {
        Self { measure, scoped }
    }

    fn counted_mask(&self, input: &MetricInput) -> AtomMask {
        match (self.scoped, input.selection(0)) {
            (true, Some(mask)) => mask.clone(),
            (true, None) => AtomMask::none(input.frame.atom_count()),
            (false, _) => AtomMask::all(input.frame.atom_count()),
        }
    }

    fn per_atom(&self, profile: &SurfaceProfile, i: usize) -> f64 {
        match self.measure {
            SurfaceMeasure::Area => profile.area[i],
            SurfaceMeasure::Occlusion => 1.0 - profile.exposed_fraction[i],
        }
    }
}

impl MetricEvaluator for SurfaceEvaluator {
    fn evaluate(&self, input: &MetricInput) -> f64 {
        let profile = surface_profile(input.frame, &input.frame.working);
        let mask = self.counted_mask(input);
        let counted: Vec<usize> = mask.indices().filter(|&i| i < profile.area.len()).collect();
        let total: f64 = counted.iter().map(|&i| self.per_atom(&profile, i)).sum();
        match self.measure {
            SurfaceMeasure::Area => total,
            SurfaceMeasure::Occlusion if counted.is_empty() => 0.0,
            SurfaceMeasure::Occlusion => total / counted.len() as f64,
        }
    }

    fn accumulate_residues(&self, input: &MetricInput, slab: &mut [f64], weight: f64) {
        let profile = surface_profile(input.frame, &input.frame.working);
        let mask = self.counted_mask(input);
        for (residue, range) in input.frame.residue_ranges().enumerate() {
            let counted: Vec<usize> = range
                .filter(|&i| mask.get(i) && i < profile.area.len())
                .collect();
            if counted.is_empty() {
                continue;
            }
            let mut value: f64 = counted.iter().map(|&i| self.per_atom(&profile, i)).sum();
            if self.measure == SurfaceMeasure::Occlusion {
                value /= counted.len() as f64;
            }
            if let Some(cell) = slab.get_mut(residue) {
                *cell += value * weight;
            }
        }
    }
}
