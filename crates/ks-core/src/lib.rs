//! kitsune/crates/ks-core/src/lib.rs
//!
//! The central domain logic and interface definitions for the Kitsune forums.

pub mod bookkeeping;
pub mod error;
pub mod events;
pub mod models;
pub mod permissions;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use events::*;
pub use models::*;
pub use permissions::*;
pub use traits::*;
