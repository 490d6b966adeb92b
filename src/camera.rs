//! The presentation camera.

use glam::Mat4;

/// Projection holder for the presentation surface.
///
/// Starts as an ordinary perspective camera. Once the tracking context comes
/// up, [`adopt_projection`](Self::adopt_projection) replaces the projection
/// with the tracker's calibrated matrix, and viewport resizes stop
/// recomputing it: the calibration defines it from then on.
#[derive(Clone, Copy, Debug)]
pub struct ArCamera {
    /// Vertical field of view in radians (perspective mode only).
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
    aspect: f32,
    projection: Mat4,
    tracked: bool,
}

impl ArCamera {
    pub fn new(aspect: f32) -> Self {
        let fov_y = 75f32.to_radians();
        let (z_near, z_far) = (0.1, 1000.0);
        Self {
            fov_y,
            z_near,
            z_far,
            aspect,
            projection: Mat4::perspective_rh(fov_y, aspect, z_near, z_far),
            tracked: false,
        }
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Resynchronize to a new surface aspect ratio. No-op once a tracker
    /// projection has been adopted.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        if !self.tracked {
            self.projection = Mat4::perspective_rh(self.fov_y, aspect, self.z_near, self.z_far);
        }
    }

    /// Take the projection matrix handed over by the tracking context.
    pub fn adopt_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.tracked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_perspective_projection() {
        let mut camera = ArCamera::new(4.0 / 3.0);
        let before = camera.projection();
        camera.set_aspect(16.0 / 9.0);
        assert_ne!(before, camera.projection());
    }

    #[test]
    fn tracker_projection_survives_resize() {
        let mut camera = ArCamera::new(4.0 / 3.0);
        let calibrated = Mat4::from_scale(glam::Vec3::new(1.0, 2.0, 3.0));
        camera.adopt_projection(calibrated);
        camera.set_aspect(16.0 / 9.0);
        assert_eq!(camera.projection(), calibrated);
    }
}
