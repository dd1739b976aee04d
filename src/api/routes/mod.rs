//! API Routes
//!
//! Route handlers organized by functionality.

pub mod health;
pub mod ingest;
pub mod records;
pub mod status;
