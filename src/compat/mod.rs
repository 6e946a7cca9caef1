//! Binary-compatibility resolution.
//!
//! When a recipe's exact requested configuration has no prebuilt binary,
//! this module generates a prioritized set of alternative configurations
//! considered binary-compatible, validates each, computes its identity, and
//! returns the distinct already-existing identities that could satisfy the
//! request instead of forcing a rebuild.
//!
//! Resolution is pure, synchronous computation over already-loaded data;
//! the only I/O is the one-time load of the policy rule table at engine
//! construction. A single recipe must not be resolved concurrently: its
//! identity-relevant fields are transiently swapped during evaluation.

pub mod errors;
pub mod factors;
pub mod policy;
pub mod standards;

pub use errors::CompatError;
pub use factors::{expand, Factor, Proposal};
pub use policy::{
    migrate_policy_file, CompatibilityPolicy, PolicyRules, RulePolicy, DEFAULT_POLICY,
    GENERATED_COMMENT,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compat::errors::scoped_trace;
use crate::core::identity::Identity;
use crate::core::recipe::{Recipe, RecipeInfo, Validation};
use crate::util::context::GlobalContext;

/// A candidate configuration delta: the contract between policies and the
/// engine. All components are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatDelta {
    /// Ordered (axis, value) overrides for the recipe's settings.
    #[serde(default)]
    pub settings: Vec<(String, String)>,

    /// Option overrides, replacing the named options.
    #[serde(default)]
    pub options: IndexMap<String, String>,

    /// Overrides for the target-side settings, when the recipe has them.
    #[serde(default)]
    pub settings_target: Vec<(String, String)>,
}

impl CompatDelta {
    pub fn from_settings(settings: Vec<(String, String)>) -> Self {
        CompatDelta {
            settings,
            ..CompatDelta::default()
        }
    }
}

/// One fully-built alternative configuration: the delta that produced it,
/// the delta-applied configuration snapshot, and its validation outcome.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub delta: CompatDelta,
    pub info: RecipeInfo,
    pub invalid: Option<String>,
}

/// Ordered Identity to first-valid-Candidate mapping.
pub type ResolutionResult = IndexMap<Identity, Candidate>;

/// Scoped swap of a recipe's live configuration.
///
/// The original configuration is restored on every exit path, including
/// unwinds and early error returns, through `Drop`.
struct InfoGuard<'a> {
    recipe: &'a mut Recipe,
    original: Option<RecipeInfo>,
}

impl<'a> InfoGuard<'a> {
    fn swap(recipe: &'a mut Recipe, candidate: RecipeInfo) -> Self {
        let original = recipe.replace_info(candidate);
        InfoGuard {
            recipe,
            original: Some(original),
        }
    }

    fn recipe(&self) -> &Recipe {
        self.recipe
    }

    /// Restore the original configuration and hand back the candidate's.
    fn finish(mut self) -> RecipeInfo {
        let original = self
            .original
            .take()
            .expect("InfoGuard::finish called after restore");
        self.recipe.replace_info(original)
    }
}

impl Drop for InfoGuard<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            self.recipe.replace_info(original);
        }
    }
}

/// The binary-compatibility resolution engine.
#[derive(Debug)]
pub struct BinaryCompatibility {
    policy: RulePolicy,
}

impl BinaryCompatibility {
    /// Construct the engine, loading the global policy rule table. A
    /// missing rule file fails construction.
    pub fn new(ctx: &GlobalContext) -> Result<Self, CompatError> {
        let rules = PolicyRules::load(&ctx.policy_path())?;
        Ok(BinaryCompatibility {
            policy: RulePolicy::new(rules),
        })
    }

    /// Construct the engine over already-loaded rules.
    pub fn with_rules(rules: PolicyRules) -> Self {
        BinaryCompatibility {
            policy: RulePolicy::new(rules),
        }
    }

    /// Resolve the compatible alternative configurations for a recipe.
    ///
    /// Deltas from the recipe's own policy come first, then the global
    /// policy's; the first valid candidate producing a given identity wins
    /// and later duplicates are dropped. The recipe's identity-relevant
    /// fields are guaranteed to be back in their original state when this
    /// returns, on success and on error alike.
    pub fn compatibles(&self, recipe: &mut Recipe) -> Result<ResolutionResult, CompatError> {
        let mut deltas = Vec::new();

        if let Some(recipe_policy) = recipe.compatibility_policy() {
            let own = recipe_policy
                .deltas(recipe)
                .map_err(|e| CompatError::PolicyFailed {
                    policy: recipe_policy.name().to_string(),
                    recipe: recipe.to_string(),
                    trace: scoped_trace(&e),
                })?;
            deltas.extend(own);
        }

        let global = self
            .policy
            .deltas(recipe)
            .map_err(|e| CompatError::PolicyFailed {
                policy: self.policy.name().to_string(),
                recipe: recipe.to_string(),
                trace: scoped_trace(&e),
            })?;
        deltas.extend(global);

        if deltas.is_empty() {
            return Ok(ResolutionResult::new());
        }

        let mut candidates = Vec::with_capacity(deltas.len());
        for delta in deltas {
            candidates.push(build_candidate(recipe, delta)?);
        }

        let mut result = ResolutionResult::new();
        for candidate in candidates {
            let (identity, evaluated) = evaluate(recipe, candidate)?;
            if evaluated.invalid.is_none() && !result.contains_key(&identity) {
                result.insert(identity, evaluated);
            }
        }
        Ok(result)
    }
}

/// Clone the recipe's original configuration and apply a delta to the
/// clone. Overrides naming axes this recipe does not resolve are tolerated
/// and skipped; they typically come from site-wide rules touching axes the
/// recipe does not declare.
fn build_candidate(recipe: &Recipe, delta: CompatDelta) -> Result<Candidate, CompatError> {
    let mut info = recipe.original_info().clone();
    info.settings_mut().apply_delta(&delta.settings, true)?;
    if !delta.options.is_empty() {
        info.options_mut().update(&delta.options);
    }
    if !delta.settings_target.is_empty() {
        if let Some(target) = info.settings_target_mut() {
            target.apply_delta(&delta.settings_target, true)?;
        }
    }
    Ok(Candidate {
        delta,
        info,
        invalid: None,
    })
}

/// Swap a candidate's configuration into the recipe, validate it, and
/// compute its identity. The original configuration is restored before
/// this returns, error or not.
fn evaluate(
    recipe: &mut Recipe,
    mut candidate: Candidate,
) -> Result<(Identity, Candidate), CompatError> {
    let guard = InfoGuard::swap(recipe, candidate.info);

    let outcome = match guard.recipe().validator() {
        Some(hook) => match hook.validate(guard.recipe()) {
            Ok(outcome) => outcome,
            Err(e) => {
                let recipe_name = guard.recipe().to_string();
                // Dropping the guard restores the original configuration.
                return Err(CompatError::Validation {
                    recipe: recipe_name,
                    source: e,
                });
            }
        },
        None => Validation::Valid,
    };

    let identity = guard.recipe().compute_identity();
    candidate.info = guard.finish();
    candidate.invalid = match outcome {
        Validation::Valid => None,
        Validation::Invalid(reason) => Some(reason),
    };
    Ok((identity, candidate))
}
