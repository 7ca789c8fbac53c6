pub mod job_handle;

pub use job_handle::JobHandle;
