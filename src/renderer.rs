//! Provides a software rasterizer for model previews.
//!
//! A [`Scene`] holds world-space triangles, a [`Camera`] frames them, and
//! [`render`] rasterizes the scene onto an RGBA surface using flat shading and
//! a z-buffer. No GPU is required; it runs entirely on the CPU.

use glam::{Mat4, Vec3, Vec4};
use image::{Rgba, RgbaImage};

/// A world-space triangle with a flat base color.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub verts: [Vec3; 3],
    pub color: [f32; 3],
}

/// Everything currently added to a preview.
#[derive(Debug, Default)]
pub struct Scene {
    triangles: Vec<Triangle>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, triangles: impl IntoIterator<Item = Triangle>) {
        self.triangles.extend(triangles);
    }

    pub fn clear(&mut self) {
        self.triangles.clear();
        self.triangles.shrink_to_fit();
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Axis-aligned bounds of every vertex, or `None` for an empty scene.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        if self.triangles.is_empty() {
            return None;
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for tri in &self.triangles {
            for v in tri.verts {
                min = min.min(v);
                max = max.max(v);
            }
        }
        Some((min, max))
    }
}

/// A perspective camera looking at the scene from a fixed three-quarter angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    view_proj: Mat4,
}

impl Camera {
    /// Frames the bounding sphere of `(min, max)`.
    ///
    /// Returns `None` for degenerate (zero-size) bounds.
    pub fn framing(min: Vec3, max: Vec3, aspect: f32) -> Option<Self> {
        let center = min.lerp(max, 0.5);
        let radius = (max - min).length() * 0.5;
        if !radius.is_finite() || radius < 1e-6 {
            return None;
        }

        // Azimuth rotated 180° so models face the camera instead of away
        let azimuth: f32 = (35.0 + 180.0_f32).to_radians();
        let elevation: f32 = 25.0_f32.to_radians();
        let dist = radius * 2.8;

        let eye = Vec3::new(
            center.x + dist * elevation.cos() * azimuth.sin(),
            center.y + dist * elevation.sin(),
            center.z + dist * elevation.cos() * azimuth.cos(),
        );

        let view = Mat4::look_at_rh(eye, center, Vec3::Y);
        let proj = Mat4::perspective_rh_gl(
            45.0_f32.to_radians(),
            aspect,
            radius * 0.01,
            radius * 100.0,
        );
        Some(Self {
            view_proj: proj * view,
        })
    }

    /// Frames everything in `scene`.
    pub fn for_scene(scene: &Scene, aspect: f32) -> Option<Self> {
        let (min, max) = scene.bounds()?;
        Self::framing(min, max, aspect)
    }

    fn project(&self, v: Vec3, width: f32, height: f32) -> Option<Vec3> {
        let clip: Vec4 = self.view_proj * v.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let inv_w = 1.0 / clip.w;
        Some(Vec3::new(
            (clip.x * inv_w * 0.5 + 0.5) * width,
            (0.5 - clip.y * inv_w * 0.5) * height,
            clip.z * inv_w,
        ))
    }
}

/// Rasterizes `scene` through `camera` onto `surface`.
///
/// The surface is cleared to transparent first, so an empty scene renders as
/// a fully transparent frame.
pub fn render(scene: &Scene, camera: &Camera, surface: &mut RgbaImage) {
    let (width, height) = surface.dimensions();
    let w = width as usize;
    let h = height as usize;
    let mut color_buf = vec![[0.0_f32; 4]; w * h];
    let mut depth_buf = vec![f32::INFINITY; w * h];

    // ---- Lighting ----
    let light_dir = Vec3::new(0.5, 0.8, 0.3).normalize();
    let light2_dir = Vec3::new(-0.3, 0.2, -0.5).normalize();

    for tri in scene.triangles() {
        let mut screen = [Vec3::ZERO; 3];
        let mut visible = true;
        for (i, v) in tri.verts.iter().enumerate() {
            match camera.project(*v, width as f32, height as f32) {
                Some(p) => screen[i] = p,
                None => {
                    visible = false;
                    break;
                }
            }
        }
        if !visible {
            continue;
        }

        let normal = (tri.verts[1] - tri.verts[0])
            .cross(tri.verts[2] - tri.verts[0])
            .normalize_or_zero();
        let ndl_main = normal.dot(light_dir).abs();
        let ndl_fill = normal.dot(light2_dir).abs();
        let shade =
            (0.15 + ndl_main * 0.60 + ndl_fill * 0.15 + ndl_main.powf(32.0) * 0.10).min(1.0);
        let shaded = [
            (tri.color[0] * shade).min(1.0),
            (tri.color[1] * shade).min(1.0),
            (tri.color[2] * shade).min(1.0),
            1.0,
        ];

        let min_x = screen[0].x.min(screen[1].x).min(screen[2].x).max(0.0) as usize;
        let max_x = (screen[0].x.max(screen[1].x).max(screen[2].x).ceil() as usize).min(w);
        let min_y = screen[0].y.min(screen[1].y).min(screen[2].y).max(0.0) as usize;
        let max_y = (screen[0].y.max(screen[1].y).max(screen[2].y).ceil() as usize).min(h);

        for y in min_y..max_y {
            for x in min_x..max_x {
                let (u, v, bw) = barycentric(screen, x as f32 + 0.5, y as f32 + 0.5);
                if u < 0.0 || v < 0.0 || bw < 0.0 {
                    continue;
                }
                let z = u * screen[0].z + v * screen[1].z + bw * screen[2].z;
                let idx = y * w + x;
                if z < depth_buf[idx] {
                    depth_buf[idx] = z;
                    color_buf[idx] = shaded;
                }
            }
        }
    }

    for (pixel, color) in surface.pixels_mut().zip(color_buf.iter()) {
        *pixel = Rgba([
            (color[0].clamp(0.0, 1.0) * 255.0) as u8,
            (color[1].clamp(0.0, 1.0) * 255.0) as u8,
            (color[2].clamp(0.0, 1.0) * 255.0) as u8,
            (color[3].clamp(0.0, 1.0) * 255.0) as u8,
        ]);
    }
}

fn barycentric(tri: [Vec3; 3], px: f32, py: f32) -> (f32, f32, f32) {
    let v0x = tri[1].x - tri[0].x;
    let v0y = tri[1].y - tri[0].y;
    let v1x = tri[2].x - tri[0].x;
    let v1y = tri[2].y - tri[0].y;
    let v2x = px - tri[0].x;
    let v2y = py - tri[0].y;

    let d00 = v0x * v0x + v0y * v0y;
    let d01 = v0x * v1x + v0y * v1y;
    let d11 = v1x * v1x + v1y * v1y;
    let d20 = v2x * v0x + v2y * v0y;
    let d21 = v2x * v1x + v2y * v1y;

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-10 {
        return (-1.0, -1.0, -1.0);
    }

    let inv = 1.0 / denom;
    let v = (d11 * d20 - d01 * d21) * inv;
    let w = (d00 * d21 - d01 * d20) * inv;
    (1.0 - v - w, v, w)
}
