//! Types compatible with both API and DB.

pub mod ballot;
pub mod email;

/// Award years are plain calendar years.
pub type Year = i32;
