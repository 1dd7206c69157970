use nalgebra::{Point3, RealField, Vector2, Vector3};

use super::{DistortionModel, IntrinsicsModel, ProjectionModel};

/// Composable camera: `pixel = intrinsics(distortion(projection(dir)))`.
#[derive(Clone, Debug)]
pub struct Camera<S, P, D, K>
where
    S: RealField + Copy,
    P: ProjectionModel<S>,
    D: DistortionModel<S>,
    K: IntrinsicsModel<S>,
{
    pub proj: P,
    pub dist: D,
    pub k: K,
    _phantom: core::marker::PhantomData<S>,
}

impl<S, P, D, K> Camera<S, P, D, K>
where
    S: RealField + Copy,
    P: ProjectionModel<S>,
    D: DistortionModel<S>,
    K: IntrinsicsModel<S>,
{
    pub fn new(proj: P, dist: D, k: K) -> Self {
        Self {
            proj,
            dist,
            k,
            _phantom: core::marker::PhantomData,
        }
    }

    /// Project a point given in camera coordinates. `None` if `z <= 0`.
    pub fn project_point_c(&self, p_c: &Vector3<S>) -> Option<Vector2<S>> {
        if p_c.z <= S::zero() {
            return None;
        }
        let n_u = self.proj.project_dir(p_c)?;
        let n_d = self.dist.distort(&n_u);
        Some(self.k.to_pixel(&n_d))
    }

    pub fn project_point(&self, p_c: &Point3<S>) -> Option<Vector2<S>> {
        self.project_point_c(&p_c.coords)
    }
}
