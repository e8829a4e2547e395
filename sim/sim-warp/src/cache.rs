//! Memoization of TPS solves and mesh warps.
//!
//! Solving the TPS system and warping a mesh dominate the cost of running
//! a scaling document. The [`ScalingCache`] remembers both so that
//! re-running a document after an unrelated edit, or running several steps
//! over the same landmarks, solves each distinct warp once.
//!
//! The coefficient key covers everything that affects the solve: the
//! landmark files (path and modification time), both prescale factors and
//! the four affine toggles. The blending factor is not part of it; it is
//! applied after the lookup, so one solve serves any blend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use mesh_landmarks::{pair_landmarks, read_landmarks_csv};
use mesh_tps::{
    affine_transform_without_scale, solve_coefficients, warp_mesh, warp_point, Correspondence,
    ThinPlateSplineInputs, TpsCoefficients,
};
use mesh_types::IndexedMesh;
use nalgebra::{Isometry3, Point3};
use sim_model::{Mesh, MeshSource, Model};
use tracing::{debug, warn};

use crate::error::{WarpError, WarpResult};

/// Runtime inputs shared by every use of the TPS algorithm.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TpsInputs {
    /// Source landmarks CSV.
    pub source_landmarks_path: PathBuf,
    /// Destination landmarks CSV.
    pub destination_landmarks_path: PathBuf,
    /// Factor applied to every source landmark before solving.
    pub source_landmarks_prescale: f64,
    /// Factor applied to every destination landmark before solving.
    pub destination_landmarks_prescale: f64,
    /// Keep the affine translation.
    pub apply_affine_translation: bool,
    /// Keep the affine scale.
    pub apply_affine_scale: bool,
    /// Keep the affine rotation.
    pub apply_affine_rotation: bool,
    /// Keep the non-affine warp.
    pub apply_non_affine_warp: bool,
    /// How much of the warp to apply (0 = none, 1 = full).
    pub blending_factor: f64,
}

impl TpsInputs {
    /// Inputs with unit prescale, a full blend and every warp component enabled.
    #[must_use]
    pub fn new(
        source_landmarks_path: impl Into<PathBuf>,
        destination_landmarks_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_landmarks_path: source_landmarks_path.into(),
            destination_landmarks_path: destination_landmarks_path.into(),
            source_landmarks_prescale: 1.0,
            destination_landmarks_prescale: 1.0,
            apply_affine_translation: true,
            apply_affine_scale: true,
            apply_affine_rotation: true,
            apply_non_affine_warp: true,
            blending_factor: 1.0,
        }
    }

    fn coefficient_key(&self) -> CoefficientKey {
        CoefficientKey {
            source: FileKey::new(&self.source_landmarks_path),
            destination: FileKey::new(&self.destination_landmarks_path),
            source_prescale: self.source_landmarks_prescale.to_bits(),
            destination_prescale: self.destination_landmarks_prescale.to_bits(),
            toggles: [
                self.apply_affine_translation,
                self.apply_affine_scale,
                self.apply_affine_rotation,
                self.apply_non_affine_warp,
            ],
        }
    }
}

/// A file identified by path and last modification, so edits on disk miss the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FileKey {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl FileKey {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CoefficientKey {
    source: FileKey,
    destination: FileKey,
    source_prescale: u64,
    destination_prescale: u64,
    toggles: [bool; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MeshWarpKey {
    mesh_file: FileKey,
    scale_factors: [u64; 3],
    mesh_to_landmarks: [u64; 16],
    coefficients: CoefficientKey,
    blending_factor: u64,
}

/// Counters describing how the cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// TPS systems solved.
    pub solves: usize,
    /// Coefficient lookups answered from the cache.
    pub coefficient_hits: usize,
    /// Meshes warped.
    pub mesh_warps: usize,
    /// Mesh warp lookups answered from the cache.
    pub mesh_warp_hits: usize,
}

/// Memoized TPS results for one session.
///
/// Not synchronized: one pipeline run uses it at a time.
#[derive(Debug, Default)]
pub struct ScalingCache {
    coefficients: HashMap<CoefficientKey, Arc<TpsCoefficients>>,
    mesh_warps: HashMap<MeshWarpKey, IndexedMesh>,
    stats: CacheStats,
}

impl ScalingCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage counters since creation or the last [`clear`](Self::clear).
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Discards every cached result and resets the counters.
    pub fn clear(&mut self) {
        self.coefficients.clear();
        self.mesh_warps.clear();
        self.stats = CacheStats::default();
    }

    /// Solved coefficients for `inputs`, solving on first use.
    ///
    /// Landmarks are read from both files, paired by name and prescaled
    /// before solving. Landmarks that cannot be paired are logged and left
    /// out.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or the system cannot
    /// be solved.
    pub fn lookup_coefficients(&mut self, inputs: &TpsInputs) -> WarpResult<Arc<TpsCoefficients>> {
        let key = inputs.coefficient_key();
        if let Some(coefficients) = self.coefficients.get(&key) {
            self.stats.coefficient_hits += 1;
            return Ok(Arc::clone(coefficients));
        }

        let source = read_landmarks_csv(&inputs.source_landmarks_path)?;
        let destination = read_landmarks_csv(&inputs.destination_landmarks_path)?;
        let pairs = pair_landmarks(&source, &destination, |unpaired| {
            warn!(
                landmark = %unpaired.name,
                "Landmark could not be paired, it might be missing in the source or destination"
            );
        });

        let landmarks = pairs
            .iter()
            .map(|pair| {
                Correspondence::new(
                    Point3::from(pair.source.coords * inputs.source_landmarks_prescale),
                    Point3::from(pair.destination.coords * inputs.destination_landmarks_prescale),
                )
            })
            .collect();
        let solver_inputs = ThinPlateSplineInputs {
            landmarks,
            apply_affine_translation: inputs.apply_affine_translation,
            apply_affine_scale: inputs.apply_affine_scale,
            apply_affine_rotation: inputs.apply_affine_rotation,
            apply_non_affine_warp: inputs.apply_non_affine_warp,
        };

        let coefficients = Arc::new(solve_coefficients(&solver_inputs)?);
        self.stats.solves += 1;
        debug!(
            source = %inputs.source_landmarks_path.display(),
            destination = %inputs.destination_landmarks_path.display(),
            pairs = pairs.len(),
            "Solved TPS coefficients"
        );
        self.coefficients.insert(key, Arc::clone(&coefficients));
        Ok(coefficients)
    }

    /// Warps the mesh at `mesh_path`, returning vertices expressed in the mesh's frame.
    ///
    /// The mesh is moved into `landmarks_frame`, warped, moved back, and
    /// its normals are recalculated. Scale factors are baked into the
    /// result. Warps of file-backed meshes are memoized.
    ///
    /// # Errors
    ///
    /// Returns an error if `mesh_path` is not a mesh, its file cannot be
    /// loaded, the frames cannot be resolved, or the solve fails.
    pub fn lookup_mesh_warp(
        &mut self,
        model: &Model,
        mesh_path: &str,
        landmarks_frame: &str,
        inputs: &TpsInputs,
    ) -> WarpResult<IndexedMesh> {
        let component = model.find_as::<Mesh>(mesh_path)?;
        let mesh_to_landmarks = model.find_transform_between(&component.frame, landmarks_frame)?;

        let key = match &component.source {
            MeshSource::File { path } => Some(MeshWarpKey {
                mesh_file: FileKey::new(&model.resolve_mesh_file(path)?),
                scale_factors: [
                    component.scale_factors.x.to_bits(),
                    component.scale_factors.y.to_bits(),
                    component.scale_factors.z.to_bits(),
                ],
                mesh_to_landmarks: isometry_bits(&mesh_to_landmarks),
                coefficients: inputs.coefficient_key(),
                blending_factor: inputs.blending_factor.to_bits(),
            }),
            MeshSource::InMemory { .. } => None,
        };
        if let Some(warped) = key.as_ref().and_then(|k| self.mesh_warps.get(k)) {
            self.stats.mesh_warp_hits += 1;
            return Ok(warped.clone());
        }

        let coefficients = self.lookup_coefficients(inputs)?;
        let mut mesh = model.load_mesh(mesh_path)?;
        mesh.transform(&mesh_to_landmarks);
        let mut warped = warp_mesh(&coefficients, &mesh, inputs.blending_factor);
        warped.inverse_transform(&mesh_to_landmarks);
        warped.recalculate_normals();
        self.stats.mesh_warps += 1;
        debug!(
            mesh = mesh_path,
            vertices = warped.vertices.len(),
            "Warped mesh"
        );

        if let Some(key) = key {
            self.mesh_warps.insert(key, warped.clone());
        }
        Ok(warped)
    }

    /// Warps a point expressed in `parent_frame`, returning it in the same frame.
    ///
    /// # Errors
    ///
    /// Returns an error if either frame cannot be resolved or the solve fails.
    pub fn lookup_warped_rigid_point(
        &mut self,
        model: &Model,
        location_in_parent: &Point3<f64>,
        parent_frame: &str,
        landmarks_frame: &str,
        inputs: &TpsInputs,
    ) -> WarpResult<Point3<f64>> {
        let coefficients = self.lookup_coefficients(inputs)?;
        let parent_to_landmarks = model.find_transform_between(parent_frame, landmarks_frame)?;
        let in_landmarks = parent_to_landmarks * location_in_parent;
        let warped = warp_point(&coefficients, &in_landmarks, inputs.blending_factor);
        Ok(parent_to_landmarks.inverse_transform_point(&warped))
    }

    /// The rotation and translation of the warp's affine part, with scale removed.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::Precondition`] unless both affine rotation and
    /// affine translation are enabled in `inputs`, or an error if the solve
    /// fails.
    pub fn lookup_affine_transform_without_scale(
        &mut self,
        inputs: &TpsInputs,
    ) -> WarpResult<Isometry3<f64>> {
        if !inputs.apply_affine_rotation {
            return Err(WarpError::precondition(
                "affine rotation must be enabled in order to figure out the transform",
            ));
        }
        if !inputs.apply_affine_translation {
            return Err(WarpError::precondition(
                "affine translation must be enabled in order to figure out the transform",
            ));
        }
        let coefficients = self.lookup_coefficients(inputs)?;
        Ok(affine_transform_without_scale(&coefficients))
    }
}

fn isometry_bits(transform: &Isometry3<f64>) -> [u64; 16] {
    let matrix = transform.to_homogeneous();
    let mut bits = [0; 16];
    for (slot, value) in bits.iter_mut().zip(matrix.iter()) {
        *slot = value.to_bits();
    }
    bits
}
