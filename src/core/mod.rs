//! Core data structures for berth.
//!
//! This module contains the foundational types the compatibility engine
//! operates on:
//! - The settings schema and per-recipe settings values
//! - Recipes and their identity-relevant configuration
//! - Identity computation

pub mod identity;
pub mod recipe;
pub mod settings;

pub use identity::Identity;
pub use recipe::{ExtensionFlags, Options, Recipe, RecipeInfo, ValidateHook, Validation};
pub use settings::{Lookup, SchemaNode, Settings, SettingsError, SettingsSchema};
