use glam::Vec3;

use crate::physics::body_properties::BodyVelocity;
use crate::utilities::bounding_box::BoundingBox;

/// Displacement envelope a body's bounds may sweep during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionExpansion {
    /// Signed linear displacement over the step.
    pub linear: Vec3,
    /// Expansion applied on every axis in both directions.
    pub uniform: f32,
}

impl MotionExpansion {
    /// No motion at all.
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        uniform: 0.0,
    };

    /// Grows `bounds` by this envelope: the negative part of the linear displacement moves the
    /// minimum, the positive part moves the maximum, and the uniform term applies to both.
    #[inline(always)]
    pub fn expand(&self, bounds: &BoundingBox) -> BoundingBox {
        let (min_expansion, max_expansion) =
            BoundingBoxHelpers::get_bounds_expansion(self.linear, 1.0, self.uniform);
        BoundingBox::new(bounds.min + min_expansion, bounds.max + max_expansion)
    }
}

/// Helper functions for computing bounding box expansions.
pub struct BoundingBoxHelpers;

impl BoundingBoxHelpers {
    /// Computes how far any point of a rotating shape can travel along a single axis during `dt`.
    #[inline(always)]
    pub fn get_angular_bounds_expansion(
        angular_speed: f32,
        dt: f32,
        maximum_radius: f32,
        maximum_angular_expansion: f32,
    ) -> f32 {
        /*
        The farthest point sits at maximum_radius from the center. Rotating by angle a moves it along a chord
        of length sqrt(2 * r^2 * (1 - cos(a))), and no axis can move further than that chord.
        Past pi/3 the chord exceeds the radius, which the expansion data already caps, so the angle is clamped there.
        cos(a) - 1 is evaluated with the first three terms of its series: -a^2/2! + a^4/4! - a^6/6!.
        */
        let a = (angular_speed * dt).min(std::f32::consts::FRAC_PI_3);
        let a2 = a * a;
        let a4 = a2 * a2;
        let a6 = a4 * a2;
        let cos_angle_minus_one = a2 * (-1.0 / 2.0) + a4 * (1.0 / 24.0) - a6 * (1.0 / 720.0);
        // Angular motion can never grow an axis by more than (maximum radius - minimum radius).
        maximum_angular_expansion
            .min((-2.0 * maximum_radius * maximum_radius * cos_angle_minus_one).max(0.0).sqrt())
    }

    /// Computes the `(min, max)` offsets produced by a linear velocity over `dt` plus a uniform angular term.
    #[inline(always)]
    pub fn get_bounds_expansion(linear_velocity: Vec3, dt: f32, angular_expansion: f32) -> (Vec3, Vec3) {
        let linear_displacement = linear_velocity * dt;
        let angular = Vec3::splat(angular_expansion);
        let min_expansion = Vec3::ZERO.min(linear_displacement) - angular;
        let max_expansion = Vec3::ZERO.max(linear_displacement) + angular;
        (min_expansion, max_expansion)
    }

    /// Computes the motion envelope of a body moving with `velocity` for `dt`.
    ///
    /// `velocity` is expected to already include the gravity projection for the step.
    #[inline(always)]
    pub fn get_motion_expansion(
        velocity: &BodyVelocity,
        dt: f32,
        maximum_radius: f32,
        maximum_angular_expansion: f32,
    ) -> MotionExpansion {
        MotionExpansion {
            linear: velocity.linear * dt,
            uniform: Self::get_angular_bounds_expansion(
                velocity.angular.length(),
                dt,
                maximum_radius,
                maximum_angular_expansion,
            ),
        }
    }
}
