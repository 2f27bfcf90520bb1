pub mod job;
pub mod trip;
