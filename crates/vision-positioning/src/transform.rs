//! Mapping from accepted virtual-plane points to world coordinates.
//!
//! The final world point is `invert(transform(plane) + offset)`; the order is
//! fixed.

use serde::{Deserialize, Serialize};

use crate::{Pt2, Real, Vec2};

/// Pure map from the virtual calibration plane to the world frame.
pub trait FrameTransform {
    fn apply(&self, plane: &Pt2) -> Pt2;
}

impl<F> FrameTransform for F
where
    F: Fn(&Pt2) -> Pt2,
{
    fn apply(&self, plane: &Pt2) -> Pt2 {
        self(plane)
    }
}

/// Virtual-plane coordinates are world coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityTransform;

impl FrameTransform for IdentityTransform {
    fn apply(&self, plane: &Pt2) -> Pt2 {
        *plane
    }
}

/// `world = A * plane + b` with `m = [A | b]` given row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m: [[Real; 3]; 2],
}

impl AffineTransform {
    pub fn scale_translate(sx: Real, sy: Real, tx: Real, ty: Real) -> Self {
        Self {
            m: [[sx, 0.0, tx], [0.0, sy, ty]],
        }
    }
}

impl FrameTransform for AffineTransform {
    fn apply(&self, plane: &Pt2) -> Pt2 {
        let [r0, r1] = self.m;
        Pt2::new(
            r0[0] * plane.x + r0[1] * plane.y + r0[2],
            r1[0] * plane.x + r1[1] * plane.y + r1[2],
        )
    }
}

/// Serializable transform selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    #[default]
    Identity,
    Affine {
        #[serde(flatten)]
        params: AffineTransform,
    },
}

impl TransformConfig {
    pub fn build(&self) -> AnyTransform {
        match self {
            TransformConfig::Identity => AnyTransform::Identity(IdentityTransform),
            TransformConfig::Affine { params } => AnyTransform::Affine(*params),
        }
    }
}

// Type-erased wrapper so configuration-driven solvers share one concrete type.
#[derive(Debug, Clone)]
#[doc(hidden)]
pub enum AnyTransform {
    Identity(IdentityTransform),
    Affine(AffineTransform),
}

impl FrameTransform for AnyTransform {
    fn apply(&self, plane: &Pt2) -> Pt2 {
        match self {
            AnyTransform::Identity(t) => t.apply(plane),
            AnyTransform::Affine(t) => t.apply(plane),
        }
    }
}

/// Offset and axis-inversion post-processing applied after the transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldMapping {
    pub offset: Vec2,
    pub inverted_x: bool,
    /// Image and world Y axes usually point in opposite directions.
    pub inverted_y: bool,
}

impl Default for WorldMapping {
    fn default() -> Self {
        Self {
            offset: Vec2::zeros(),
            inverted_x: false,
            inverted_y: true,
        }
    }
}

impl WorldMapping {
    /// Add the offset, then flip the selected axes.
    pub fn apply(&self, transformed: &Pt2) -> Pt2 {
        let mut world = *transformed + self.offset;
        if self.inverted_x {
            world.x = -world.x;
        }
        if self.inverted_y {
            world.y = -world.y;
        }
        world
    }
}
