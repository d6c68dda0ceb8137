//! Core types for toolmesh.

pub mod message;
pub mod result;

pub use message::*;
pub use result::*;
