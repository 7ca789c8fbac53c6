pub mod bounding_box;
pub mod task_scheduling;
pub mod thread_dispatcher;
