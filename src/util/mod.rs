//! Shared utilities.

pub mod context;
pub mod hash;

pub use context::GlobalContext;
pub use hash::Fingerprint;
