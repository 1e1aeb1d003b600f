pub mod app;
pub mod core;
pub mod executor;
pub mod queue;
