pub mod articles;
pub mod cleanup;
pub mod daemon;
pub mod schedule;
pub mod status;
pub mod trigger;
