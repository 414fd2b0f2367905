//! Loads glTF/GLB models into renderer triangles.
//!
//! Both binary GLB and JSON glTF are handled; buffers may be embedded,
//! data URIs, or external files next to the model.

use std::path::Path;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::renderer::Triangle;

/// Errors that can occur while loading a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to import glTF: {0}")]
    Import(#[from] gltf::Error),
    #[error("No geometry found")]
    NoGeometry,
}

/// A parsed glTF document with its buffers resolved.
pub struct ImportedModel {
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
}

impl ImportedModel {
    /// Flattens the default scene into world-space triangles.
    ///
    /// # Errors
    /// Returns [`LoadError::NoGeometry`] if the scene has no triangles.
    pub fn triangles(&self) -> Result<Vec<Triangle>, LoadError> {
        collect_triangles(&self.document, &self.buffers)
    }
}

/// Parses a model file, resolving external resources relative to it.
///
/// # Errors
/// Returns an error if the file can't be imported.
pub fn import_model(path: &Path) -> Result<ImportedModel, LoadError> {
    let (document, buffers, _images) = gltf::import(path)?;
    Ok(ImportedModel { document, buffers })
}

/// Loads a model from a file, resolving external resources relative to it.
///
/// # Errors
/// Returns an error if the file can't be imported or has no triangles.
pub fn load_model(path: &Path) -> Result<Vec<Triangle>, LoadError> {
    import_model(path)?.triangles()
}

/// Loads a self-contained model (GLB or glTF with embedded data) from memory.
///
/// # Errors
/// Returns an error if the data can't be imported or has no triangles.
pub fn load_model_from_bytes(data: &[u8]) -> Result<Vec<Triangle>, LoadError> {
    let (document, buffers, _images) = gltf::import_slice(data)?;
    collect_triangles(&document, &buffers)
}

fn collect_triangles(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<Vec<Triangle>, LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(LoadError::NoGeometry)?;

    let mut triangles = Vec::new();
    for node in scene.nodes() {
        walk_node(&node, buffers, Mat4::IDENTITY, &mut triangles);
    }

    if triangles.is_empty() {
        return Err(LoadError::NoGeometry);
    }
    Ok(triangles)
}

/// Recursively collects world-space triangles under `node`.
fn walk_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent: Mat4,
    out: &mut Vec<Triangle>,
) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &*d.0));

            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(iter) => iter.map(|p| world.transform_point3(Vec3::from(p))).collect(),
                None => continue,
            };
            let colors: Option<Vec<[f32; 4]>> =
                reader.read_colors(0).map(|c| c.into_rgba_f32().collect());
            let indices: Vec<usize> = match reader.read_indices() {
                Some(iter) => iter.into_u32().map(|i| i as usize).collect(),
                None => (0..positions.len()).collect(),
            };

            let factor = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            for tri in indices.chunks_exact(3) {
                if tri.iter().any(|&i| i >= positions.len()) {
                    continue;
                }
                let tint = match &colors {
                    Some(vc) => average_color(vc, tri),
                    None => [1.0, 1.0, 1.0],
                };
                out.push(Triangle {
                    verts: [positions[tri[0]], positions[tri[1]], positions[tri[2]]],
                    color: [factor[0] * tint[0], factor[1] * tint[1], factor[2] * tint[2]],
                });
            }
        }
    }

    for child in node.children() {
        walk_node(&child, buffers, world, out);
    }
}

fn average_color(colors: &[[f32; 4]], tri: &[usize]) -> [f32; 3] {
    let mut sum = [0.0_f32; 3];
    for &i in tri {
        let c = colors.get(i).copied().unwrap_or([1.0; 4]);
        sum[0] += c[0];
        sum[1] += c[1];
        sum[2] += c[2];
    }
    [sum[0] / 3.0, sum[1] / 3.0, sum[2] / 3.0]
}
