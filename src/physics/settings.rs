use std::num::NonZeroUsize;
use std::thread;

use glam::Vec3;
use thiserror::Error;

/// Configuration rejected before any build work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SettingsError {
    /// Collision tolerance is negative or not finite.
    #[error("collision tolerance must be finite and non-negative, got {0}")]
    InvalidCollisionTolerance(f32),
    /// A thread count of zero was requested.
    #[error("thread count hint must be at least 1")]
    ZeroThreadCount,
    /// Time step is zero, negative or not finite.
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f32),
    /// Gravity has a NaN or infinite component.
    #[error("gravity must be finite, got {0}")]
    NonFiniteGravity(Vec3),
}

/// Long-lived broad phase configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BroadPhaseSettings {
    /// Distance at which bodies are considered touching. Half of it pads every body's bounds.
    pub collision_tolerance: f32,
    /// Number of workers the build spreads branches and body summaries over.
    pub thread_count_hint: usize,
    /// Whether node filters are aggregated. When disabled every node filter accepts everything.
    pub enable_collision_filters: bool,
}

impl Default for BroadPhaseSettings {
    fn default() -> Self {
        Self {
            collision_tolerance: 0.1,
            thread_count_hint: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            enable_collision_filters: true,
        }
    }
}

impl BroadPhaseSettings {
    /// Padding applied on every side of every body's bounds.
    #[inline(always)]
    pub fn aabb_margin(&self) -> f32 {
        self.collision_tolerance * 0.5
    }

    pub fn with_collision_tolerance(mut self, collision_tolerance: f32) -> Self {
        self.collision_tolerance = collision_tolerance;
        self
    }

    pub fn with_thread_count_hint(mut self, thread_count_hint: usize) -> Self {
        self.thread_count_hint = thread_count_hint;
        self
    }

    pub fn with_collision_filters(mut self, enable_collision_filters: bool) -> Self {
        self.enable_collision_filters = enable_collision_filters;
        self
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.collision_tolerance.is_finite() || self.collision_tolerance < 0.0 {
            return Err(SettingsError::InvalidCollisionTolerance(self.collision_tolerance));
        }
        if self.thread_count_hint == 0 {
            return Err(SettingsError::ZeroThreadCount);
        }
        Ok(())
    }
}

/// Per-step inputs of the dynamic body summary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepInput {
    pub gravity: Vec3,
    /// Duration of the step the dynamic bounds must cover.
    pub time_step: f32,
}

impl Default for StepInput {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            time_step: 1.0 / 60.0,
        }
    }
}

impl StepInput {
    pub fn new(gravity: Vec3, time_step: f32) -> Self {
        Self { gravity, time_step }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.gravity.is_finite() {
            return Err(SettingsError::NonFiniteGravity(self.gravity));
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(SettingsError::InvalidTimeStep(self.time_step));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = BroadPhaseSettings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.aabb_margin(), 0.05);
        assert!(settings.thread_count_hint >= 1);
        assert_eq!(StepInput::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let settings = BroadPhaseSettings::default().with_collision_tolerance(-1.0);
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidCollisionTolerance(-1.0))
        );
        let settings = BroadPhaseSettings::default().with_thread_count_hint(0);
        assert_eq!(settings.validate(), Err(SettingsError::ZeroThreadCount));
        assert_eq!(
            StepInput::new(Vec3::ZERO, 0.0).validate(),
            Err(SettingsError::InvalidTimeStep(0.0))
        );
        let error = StepInput::new(Vec3::new(f32::NAN, 0.0, 0.0), 0.1)
            .validate()
            .unwrap_err();
        assert!(matches!(error, SettingsError::NonFiniteGravity(_)));
        assert!(error.to_string().starts_with("gravity must be finite"));
    }
}
