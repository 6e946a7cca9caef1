//! Recipes and their identity-relevant configuration.
//!
//! A [`Recipe`] is the buildable unit under evaluation. Its live
//! [`RecipeInfo`] (settings, options, optional target-side settings) is what
//! identity computation and validation read; the pristine snapshot captured
//! at construction is what compatibility candidates are cloned from.

use std::fmt;

use indexmap::IndexMap;

use crate::compat::policy::CompatibilityPolicy;
use crate::core::identity::{self, Identity};
use crate::core::settings::Settings;

/// Option-name to value assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: IndexMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Replace the named options wholesale; unnamed options keep their
    /// current values.
    pub fn update(&mut self, overrides: &IndexMap<String, String>) {
        for (name, value) in overrides {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The identity-relevant field set of a recipe: the Configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeInfo {
    settings: Settings,
    options: Options,
    /// Target-side settings for cross-build consumers, if any.
    settings_target: Option<Settings>,
}

impl RecipeInfo {
    pub fn new(settings: Settings, options: Options, settings_target: Option<Settings>) -> Self {
        RecipeInfo {
            settings,
            options,
            settings_target,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn settings_target(&self) -> Option<&Settings> {
        self.settings_target.as_ref()
    }

    pub fn settings_target_mut(&mut self) -> Option<&mut Settings> {
        self.settings_target.as_mut()
    }
}

/// Outcome of recipe validation.
///
/// `Invalid` is the normal "this configuration cannot be used" signal; it
/// excludes a candidate without aborting resolution. A hook that returns
/// `Err` instead aborts the whole resolution for the recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(String),
}

/// Validation collaborator invoked once per candidate configuration.
///
/// The hook runs while the candidate's configuration is swapped into the
/// recipe, so it reads the candidate through the recipe's normal accessors.
pub trait ValidateHook {
    fn validate(&self, recipe: &Recipe) -> anyhow::Result<Validation>;
}

/// Per-recipe opt-outs for built-in compatibility behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFlags {
    /// Probe other C++ standards supported by the configured compiler.
    pub compatibility_cppstd: bool,
    /// Probe other C standards supported by the configured compiler.
    pub compatibility_cstd: bool,
}

impl Default for ExtensionFlags {
    fn default() -> Self {
        ExtensionFlags {
            compatibility_cppstd: true,
            compatibility_cstd: true,
        }
    }
}

/// The buildable unit whose configuration is under evaluation.
pub struct Recipe {
    name: String,
    version: String,
    info: RecipeInfo,
    original_info: RecipeInfo,
    extensions: ExtensionFlags,
    compatibility: Option<Box<dyn CompatibilityPolicy>>,
    validator: Option<Box<dyn ValidateHook>>,
}

impl Recipe {
    /// Create a recipe; the given configuration is also captured as the
    /// pristine original snapshot.
    pub fn new(name: impl Into<String>, version: impl Into<String>, info: RecipeInfo) -> Self {
        Recipe {
            name: name.into(),
            version: version.into(),
            original_info: info.clone(),
            info,
            extensions: ExtensionFlags::default(),
            compatibility: None,
            validator: None,
        }
    }

    /// Attach a per-recipe compatibility policy.
    pub fn with_compatibility(mut self, policy: Box<dyn CompatibilityPolicy>) -> Self {
        self.compatibility = Some(policy);
        self
    }

    /// Attach a validation hook.
    pub fn with_validator(mut self, validator: Box<dyn ValidateHook>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Set the per-recipe extension flags.
    pub fn with_extensions(mut self, extensions: ExtensionFlags) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The live identity-relevant configuration.
    pub fn info(&self) -> &RecipeInfo {
        &self.info
    }

    /// The pristine configuration captured at construction. Compatibility
    /// candidates are cloned from this, never from the live info.
    pub fn original_info(&self) -> &RecipeInfo {
        &self.original_info
    }

    /// Shorthand for the live settings.
    pub fn settings(&self) -> &Settings {
        &self.info.settings
    }

    /// Shorthand for the live options.
    pub fn options(&self) -> &Options {
        &self.info.options
    }

    pub fn extensions(&self) -> &ExtensionFlags {
        &self.extensions
    }

    pub fn compatibility_policy(&self) -> Option<&dyn CompatibilityPolicy> {
        self.compatibility.as_deref()
    }

    pub fn validator(&self) -> Option<&dyn ValidateHook> {
        self.validator.as_deref()
    }

    /// Compute the identity of the live configuration.
    pub fn compute_identity(&self) -> Identity {
        identity::compute(&self.name, &self.version, &self.info)
    }

    /// Swap the live configuration, returning the previous one.
    ///
    /// Callers own restoring the previous configuration; the resolution
    /// engine does this through a scoped guard.
    pub(crate) fn replace_info(&mut self, info: RecipeInfo) -> RecipeInfo {
        std::mem::replace(&mut self.info, info)
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("info", &self.info)
            .field("extensions", &self.extensions)
            .field("compatibility", &self.compatibility.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}
