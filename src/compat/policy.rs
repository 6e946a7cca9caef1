//! Compatibility policies and the global rule table.
//!
//! The global policy is a declarative TOML rule table at a fixed,
//! user-visible path (`<home>/policy/compatibility.toml`). It drives the
//! built-in [`RulePolicy`]: language-standard probing plus a table of
//! ABI-equivalent compiler-version fallbacks. Recipes can additionally
//! carry their own [`CompatibilityPolicy`], whose deltas take priority.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compat::errors::CompatError;
use crate::compat::factors::{expand, Factor};
use crate::compat::standards::{supported_cppstd, supported_cstd};
use crate::compat::CompatDelta;
use crate::core::recipe::Recipe;
use crate::util::context::{GlobalContext, POLICY_FILE_NAME};

/// Marker kept as the first line of generated policy files. A migration
/// only overwrites the file while this marker is still present.
pub const GENERATED_COMMENT: &str = "This file was generated by berth";

/// Shipped default rule table.
pub const DEFAULT_POLICY: &str = "\
# This file was generated by berth. Remove this comment if you edit this file
# or berth will overwrite your changes.

# Binary compatibility rules. Deltas generated from these rules are probed
# against existing binaries before a rebuild is considered.

# Probe other language standards supported by the configured compiler.
[standards]
cppstd = true
cstd = true

# ABI-equivalent compiler version fallbacks. Add site-specific entries
# below; they are evaluated in table order after the standards factors.
[[version_fallbacks]]
compiler = \"msvc\"
version = \"194\"
fallback = \"193\"
";

/// A source of candidate deltas: either the global rule table or a
/// per-recipe override. Per-recipe deltas are returned pre-merged and are
/// evaluated before the global policy's output.
pub trait CompatibilityPolicy {
    /// Identity used when reporting a failing policy.
    fn name(&self) -> &str;

    /// Candidate deltas for the recipe's current configuration.
    fn deltas(&self, recipe: &Recipe) -> Result<Vec<CompatDelta>>;
}

fn default_true() -> bool {
    true
}

/// Toggles for the built-in language-standard factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardsRules {
    #[serde(default = "default_true")]
    pub cppstd: bool,
    #[serde(default = "default_true")]
    pub cstd: bool,
}

impl Default for StandardsRules {
    fn default() -> Self {
        StandardsRules {
            cppstd: true,
            cstd: true,
        }
    }
}

/// One ABI-equivalent compiler-version fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFallback {
    pub compiler: String,
    pub version: String,
    pub fallback: String,
}

/// The parsed global rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub standards: StandardsRules,

    #[serde(default)]
    pub version_fallbacks: Vec<VersionFallback>,
}

impl PolicyRules {
    /// Load the rule table. A missing file is fatal: it marks a broken
    /// installation, not a per-recipe condition.
    pub fn load(path: &Path) -> Result<Self, CompatError> {
        if !path.exists() {
            return Err(CompatError::MissingPolicyFile {
                path: path.to_path_buf(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| CompatError::InvalidPolicyFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        toml::from_str(&content).map_err(|e| CompatError::InvalidPolicyFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Built-in policy evaluating the global rule table.
#[derive(Debug, Clone)]
pub struct RulePolicy {
    rules: PolicyRules,
}

impl RulePolicy {
    pub fn new(rules: PolicyRules) -> Self {
        RulePolicy { rules }
    }

    pub fn rules(&self) -> &PolicyRules {
        &self.rules
    }

    /// The factors for a recipe, in fixed order: cppstd, cstd, then the
    /// version-fallback table entries.
    fn factors(&self, recipe: &Recipe) -> Vec<Factor> {
        let settings = recipe.settings();
        let (Some(compiler), Some(version)) =
            (settings.get("compiler"), settings.get("compiler.version"))
        else {
            return Vec::new();
        };

        let mut factors = Vec::new();

        if settings.get("compiler.cppstd").is_some()
            && self.rules.standards.cppstd
            && recipe.extensions().compatibility_cppstd
        {
            match supported_cppstd(settings.schema(), compiler, version) {
                // The current cppstd stays in: it must remain combinable
                // with the other factors.
                Some(values) => factors.push(Factor::from_axis("compiler.cppstd", values)),
                None => {
                    tracing::warn!("no cppstd compatibility defined for compiler `{compiler}`")
                }
            }
        }

        if let Some(current) = settings.get("compiler.cstd") {
            if self.rules.standards.cstd && recipe.extensions().compatibility_cstd {
                match supported_cstd(settings.schema(), compiler, version) {
                    Some(values) => factors.push(Factor::from_axis(
                        "compiler.cstd",
                        values.into_iter().filter(|v| v.as_str() != current),
                    )),
                    None => {
                        tracing::warn!("no cstd compatibility defined for compiler `{compiler}`")
                    }
                }
            }
        }

        for fallback in &self.rules.version_fallbacks {
            if fallback.compiler == compiler && fallback.version == version {
                factors.push(Factor::single("compiler.version", &fallback.fallback));
            }
        }

        factors
    }
}

impl CompatibilityPolicy for RulePolicy {
    fn name(&self) -> &str {
        POLICY_FILE_NAME
    }

    fn deltas(&self, recipe: &Recipe) -> Result<Vec<CompatDelta>> {
        let factors = self.factors(recipe);
        let combinations = expand(&factors);
        Ok(combinations
            .into_iter()
            .map(|combination| CompatDelta::from_settings(combination.into_iter().collect()))
            .collect())
    }
}

/// One-time upgrade of the policy file: rewrite it with the current default
/// only while the generation marker is still the first line, preserving any
/// user edit that removed or altered it.
pub fn migrate_policy_file(ctx: &GlobalContext) -> Result<()> {
    let path = ctx.policy_path();
    if !should_migrate(&path)? {
        return Ok(());
    }
    ctx.ensure_dir(&ctx.policy_dir())?;
    if path.exists() {
        let current = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read policy file: {}", path.display()))?;
        if current != DEFAULT_POLICY {
            tracing::info!("migration: updated {}", POLICY_FILE_NAME);
        }
    }
    std::fs::write(&path, DEFAULT_POLICY)
        .with_context(|| format!("failed to write policy file: {}", path.display()))
}

fn should_migrate(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file: {}", path.display()))?;
    let first_line = content.trim_start().lines().next().unwrap_or("");
    Ok(first_line.contains(GENERATED_COMMENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipe::{ExtensionFlags, Options, RecipeInfo};
    use crate::core::settings::{Settings, SettingsSchema};
    use tempfile::TempDir;

    fn recipe(pairs: &[(&str, &str)]) -> Recipe {
        let mut settings =
            Settings::new(SettingsSchema::builtin(), &["os", "compiler", "build_type"]).unwrap();
        for (axis, value) in pairs {
            settings.set(axis, value).unwrap();
        }
        Recipe::new("zlib", "1.3.1", RecipeInfo::new(settings, Options::new(), None))
    }

    fn default_rules() -> PolicyRules {
        toml::from_str(DEFAULT_POLICY).unwrap()
    }

    #[test]
    fn test_default_policy_parses() {
        let rules = default_rules();
        assert!(rules.standards.cppstd);
        assert!(rules.standards.cstd);
        assert_eq!(
            rules.version_fallbacks,
            vec![VersionFallback {
                compiler: "msvc".to_string(),
                version: "194".to_string(),
                fallback: "193".to_string(),
            }]
        );
    }

    #[test]
    fn test_default_policy_starts_with_marker() {
        let first_line = DEFAULT_POLICY.lines().next().unwrap();
        assert!(first_line.contains(GENERATED_COMMENT));
    }

    #[test]
    fn test_cppstd_factor_keeps_current_value() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "gcc"),
            ("compiler.version", "11"),
            ("compiler.cppstd", "17"),
        ]);

        let deltas = policy.deltas(&recipe).unwrap();
        assert!(!deltas.is_empty());
        assert!(deltas.iter().all(|d| d.options.is_empty()));
        assert!(deltas
            .iter()
            .any(|d| d.settings == vec![("compiler.cppstd".to_string(), "17".to_string())]));
    }

    #[test]
    fn test_no_compiler_or_version_means_no_deltas() {
        let policy = RulePolicy::new(default_rules());

        let no_compiler = recipe(&[("build_type", "Release")]);
        assert!(policy.deltas(&no_compiler).unwrap().is_empty());

        let no_version = recipe(&[("compiler", "gcc")]);
        assert!(policy.deltas(&no_version).unwrap().is_empty());
    }

    #[test]
    fn test_unset_cppstd_contributes_no_factor() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[("compiler", "gcc"), ("compiler.version", "11")]);
        assert!(policy.deltas(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_cstd_factor_excludes_current_value() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "gcc"),
            ("compiler.version", "13"),
            ("compiler.cstd", "11"),
        ]);

        let deltas = policy.deltas(&recipe).unwrap();
        assert!(!deltas.is_empty());
        assert!(!deltas
            .iter()
            .any(|d| d.settings.contains(&("compiler.cstd".to_string(), "11".to_string()))));
        assert!(deltas
            .iter()
            .any(|d| d.settings.contains(&("compiler.cstd".to_string(), "17".to_string()))));
    }

    #[test]
    fn test_msvc_version_fallback() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "msvc"),
            ("compiler.version", "194"),
            ("compiler.cppstd", "17"),
        ]);

        let deltas = policy.deltas(&recipe).unwrap();
        // 4 cppstd partials + 4 merges with the fallback version.
        assert_eq!(deltas.len(), 8);
        let with_fallback: Vec<_> = deltas
            .iter()
            .filter(|d| {
                d.settings
                    .contains(&("compiler.version".to_string(), "193".to_string()))
            })
            .collect();
        assert_eq!(with_fallback.len(), 4);
    }

    #[test]
    fn test_other_msvc_versions_have_no_fallback() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "msvc"),
            ("compiler.version", "193"),
            ("compiler.cppstd", "17"),
        ]);

        let deltas = policy.deltas(&recipe).unwrap();
        assert!(!deltas
            .iter()
            .any(|d| d.settings.iter().any(|(axis, _)| axis == "compiler.version")));
    }

    #[test]
    fn test_extension_flag_disables_cppstd_probing() {
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "gcc"),
            ("compiler.version", "11"),
            ("compiler.cppstd", "17"),
        ])
        .with_extensions(ExtensionFlags {
            compatibility_cppstd: false,
            compatibility_cstd: true,
        });

        assert!(policy.deltas(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_rule_toggle_disables_cppstd_probing() {
        let mut rules = default_rules();
        rules.standards.cppstd = false;
        let policy = RulePolicy::new(rules);
        let recipe = recipe(&[
            ("compiler", "gcc"),
            ("compiler.version", "11"),
            ("compiler.cppstd", "17"),
        ]);

        assert!(policy.deltas(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_compiler_standards_warns_and_skips() {
        // qcc is in the settings catalog but has no standards table, so the
        // factor contributes nothing and no error is raised.
        let policy = RulePolicy::new(default_rules());
        let recipe = recipe(&[
            ("compiler", "qcc"),
            ("compiler.version", "5.4"),
            ("compiler.cppstd", "14"),
        ]);

        assert!(policy.deltas(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = PolicyRules::load(&tmp.path().join("compatibility.toml")).unwrap_err();
        assert!(matches!(err, CompatError::MissingPolicyFile { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("compatibility.toml");
        std::fs::write(&path, "standards = \"yes\"\n").unwrap();
        let err = PolicyRules::load(&path).unwrap_err();
        assert!(matches!(err, CompatError::InvalidPolicyFile { .. }));
    }

    #[test]
    fn test_migration_writes_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_home(tmp.path().to_path_buf());

        migrate_policy_file(&ctx).unwrap();
        let content = std::fs::read_to_string(ctx.policy_path()).unwrap();
        assert_eq!(content, DEFAULT_POLICY);
    }

    #[test]
    fn test_migration_overwrites_generated_file() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_home(tmp.path().to_path_buf());
        ctx.ensure_dir(&ctx.policy_dir()).unwrap();

        let stale = format!("# {GENERATED_COMMENT}. Old body.\n[standards]\ncppstd = false\n");
        std::fs::write(ctx.policy_path(), stale).unwrap();

        migrate_policy_file(&ctx).unwrap();
        let content = std::fs::read_to_string(ctx.policy_path()).unwrap();
        assert_eq!(content, DEFAULT_POLICY);
    }

    #[test]
    fn test_migration_preserves_user_edits() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_home(tmp.path().to_path_buf());
        ctx.ensure_dir(&ctx.policy_dir()).unwrap();

        let edited = "[standards]\ncppstd = false\ncstd = false\n";
        std::fs::write(ctx.policy_path(), edited).unwrap();

        migrate_policy_file(&ctx).unwrap();
        let content = std::fs::read_to_string(ctx.policy_path()).unwrap();
        assert_eq!(content, edited);
    }
}
