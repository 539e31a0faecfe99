// src/estimation/mod.rs
//
// Pitch-fused ground-plane distance estimation.
//
// Signal flow (one frame):
//   Gyro rate, Δt        → pitch_fuser.propagate()
//   Accel tilt (static)  → pitch_fuser.absolute_update() + bias learning
//   Vision pitch (θ, c)  → pitch_fuser.vision_update()
//   θ                    → ground_projector.update_theta_cache()   (once)
//   Track box            → contact::contact_point() → distance_from_pixel()
//
// Orchestrated by pipeline::orchestrator::FrameOrchestrator.

pub mod contact;
pub mod ground_projector;
pub mod inertial;
pub mod intrinsics;
pub mod pitch_fuser;

pub use contact::{contact_point, rough_area_m2};
pub use ground_projector::{GroundProjector, ProjectionLimits, TrigCache};
pub use inertial::{InertialSample, StationaryTiltInitializer};
pub use intrinsics::{CamIntrinsics, MountHeight};
pub use pitch_fuser::PitchFuser;
