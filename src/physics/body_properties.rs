use glam::{Quat, Vec3};

/// World placement of a body.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidPose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Default for RigidPose {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    /// Placement at the origin with no rotation.
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    #[inline(always)]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            orientation,
            position,
        }
    }

    /// Unrotated placement at `position`.
    #[inline(always)]
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

/// Linear and angular velocity of a body.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyVelocity {
    /// Linear velocity in world space.
    pub linear: Vec3,
    /// Angular velocity in world space.
    pub angular: Vec3,
}

impl BodyVelocity {
    /// Creates a velocity from linear and angular components.
    #[inline(always)]
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }
}

/// Motion state of a dynamic body, aligned 1:1 with the dynamic body range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionVelocity {
    /// Current velocity.
    pub velocity: BodyVelocity,
    /// Inverse of the body's mass. Zero marks a kinematic body.
    pub inverse_mass: f32,
    /// Inverse inertia about the principal axes.
    pub inverse_inertia: Vec3,
    /// Scale applied to gravity for this body.
    pub gravity_factor: f32,
}

impl Default for MotionVelocity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl MotionVelocity {
    /// A motionless unit-mass body fully affected by gravity.
    pub const ZERO: Self = Self {
        velocity: BodyVelocity {
            linear: Vec3::ZERO,
            angular: Vec3::ZERO,
        },
        inverse_mass: 1.0,
        inverse_inertia: Vec3::ONE,
        gravity_factor: 1.0,
    };

    /// Creates a unit-mass motion state with the given velocities.
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self {
            velocity: BodyVelocity::new(linear, angular),
            ..Self::ZERO
        }
    }

    /// Creates a motion state that ignores gravity and forces.
    pub fn kinematic(linear: Vec3, angular: Vec3) -> Self {
        Self {
            velocity: BodyVelocity::new(linear, angular),
            inverse_mass: 0.0,
            inverse_inertia: Vec3::ZERO,
            gravity_factor: 0.0,
        }
    }

    /// Velocity the body is expected to reach after one step of gravity.
    #[inline(always)]
    pub fn with_gravity(&self, gravity: Vec3, time_step: f32) -> BodyVelocity {
        BodyVelocity {
            linear: self.velocity.linear + gravity * (time_step * self.gravity_factor),
            angular: self.velocity.angular,
        }
    }
}
