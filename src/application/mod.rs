//! Application services layer.

pub mod characters;
pub mod error;
pub mod jobs;
pub mod repos;
pub mod seed;
pub mod sync;
