pub mod credits;
pub mod error;
pub mod health;
pub mod placement_files;
