//! Collision primitives: line of sight, circle vs rectangle, circle vs circle

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Static axis-aligned rectangle (obstacles)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of size `w` x `h` centred on `(cx, cy)`
    pub fn centered(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w * 0.5, cy - h * 0.5, w, h)
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.w, self.y + self.h)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.w && p.y >= self.y && p.y <= self.y + self.h
    }

    /// Closest point of the rectangle to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min(), self.max())
    }
}

/// Outward push that separates a circle from a rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Unit normal pointing away from the rectangle
    pub normal: Vec2,
    pub depth: f32,
}

/// Normalize `v`, or return `fallback` when `v` has no usable direction.
pub fn safe_normalize(v: Vec2, fallback: Vec2) -> Vec2 {
    v.try_normalize().unwrap_or(fallback)
}

/// Physics helpers shared by the server simulation and client prediction
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// True if the segment `p1 -> p2` passes through `rect`.
    ///
    /// Liang-Barsky slab clipping: each slab narrows the parametric window
    /// `[t0, t1]`; the segment is blocked while the window stays non-empty.
    pub fn segment_blocked(p1: Vec2, p2: Vec2, rect: &Rect) -> bool {
        let d = p2 - p1;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;

        let mut clip = |p: f32, q: f32| -> bool {
            if p == 0.0 {
                return q >= 0.0;
            }
            let t = q / p;
            if p < 0.0 {
                if t > t1 {
                    return false;
                }
                if t > t0 {
                    t0 = t;
                }
            } else {
                if t < t0 {
                    return false;
                }
                if t < t1 {
                    t1 = t;
                }
            }
            true
        };

        clip(-d.x, p1.x - rect.x)
            && clip(d.x, rect.x + rect.w - p1.x)
            && clip(-d.y, p1.y - rect.y)
            && clip(d.y, rect.y + rect.h - p1.y)
            && t0 <= t1
    }

    /// True if no rectangle in `obstacles` blocks the segment
    pub fn has_line_of_sight(from: Vec2, to: Vec2, obstacles: &[Rect]) -> bool {
        !obstacles
            .iter()
            .any(|rect| Self::segment_blocked(from, to, rect))
    }

    /// Penetration of a circle into a rectangle, if any.
    ///
    /// A centre outside the rectangle is pushed along the line from the
    /// closest point; a centre inside it exits through the nearest face.
    pub fn resolve_circle_penetration(center: Vec2, radius: f32, rect: &Rect) -> Option<Penetration> {
        let closest = rect.closest_point(center);
        let delta = center - closest;
        let dist = delta.length();

        if dist > 0.0 {
            if dist >= radius {
                return None;
            }
            return Some(Penetration {
                normal: delta / dist,
                depth: radius - dist,
            });
        }

        if !rect.contains(center) {
            return None;
        }

        // centre is inside: pick the face with the least travel
        let faces = [
            (center.x - rect.x, Vec2::NEG_X),
            (rect.x + rect.w - center.x, Vec2::X),
            (center.y - rect.y, Vec2::NEG_Y),
            (rect.y + rect.h - center.y, Vec2::Y),
        ];
        let (travel, normal) = faces
            .into_iter()
            .fold((f32::INFINITY, Vec2::X), |best, face| {
                if face.0 < best.0 {
                    face
                } else {
                    best
                }
            });

        Some(Penetration {
            normal,
            depth: travel + radius,
        })
    }

    /// Push two overlapping circles apart and exchange a symmetric impulse.
    ///
    /// Each body moves back half the overlap along the connecting normal.
    /// If they are closing, `impulse_coeff` of the closing speed is removed
    /// from both. Returns true if the pair overlapped.
    pub fn resolve_pair_separation(
        pos_a: &mut Vec2,
        vel_a: &mut Vec2,
        pos_b: &mut Vec2,
        vel_b: &mut Vec2,
        min_distance: f32,
        impulse_coeff: f32,
    ) -> bool {
        let delta = *pos_b - *pos_a;
        let dist = delta.length();
        if dist >= min_distance {
            return false;
        }

        // coincident centres: separate along +x
        let normal = if dist > 1e-6 { delta / dist } else { Vec2::X };
        let half_overlap = (min_distance - dist) * 0.5;

        *pos_a -= normal * half_overlap;
        *pos_b += normal * half_overlap;

        let closing = (*vel_b - *vel_a).dot(normal);
        if closing < 0.0 {
            let impulse = -closing * impulse_coeff;
            *vel_a -= normal * impulse;
            *vel_b += normal * impulse;
        }

        true
    }

    /// Frame-rate independent exponential approach factor: `1 - k^dt`
    pub fn response(k: f32, dt: f32) -> f32 {
        1.0 - k.powf(dt)
    }

    /// Per-tick friction multiplier for a per-1/60 s factor
    pub fn friction(factor: f32, dt: f32) -> f32 {
        factor.powf(dt * 60.0)
    }
}
