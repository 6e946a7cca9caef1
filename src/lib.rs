//! berth - binary-compatibility resolution for a C/C++ package manager
//!
//! Given a recipe whose exact requested configuration (compiler, standard,
//! version, options, ...) has no prebuilt binary, berth generates a
//! prioritized set of alternative configurations considered
//! binary-compatible, validates each, computes its identity, and returns
//! the distinct already-existing binaries that could satisfy the request
//! instead of forcing a rebuild.

pub mod compat;
pub mod core;
pub mod util;

pub use crate::compat::{
    BinaryCompatibility, Candidate, CompatDelta, CompatError, CompatibilityPolicy, PolicyRules,
    ResolutionResult, RulePolicy,
};
pub use crate::core::{Identity, Options, Recipe, RecipeInfo, Settings, SettingsSchema};
pub use crate::util::context::GlobalContext;
