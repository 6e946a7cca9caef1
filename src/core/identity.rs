//! Package identity computation.
//!
//! An identity is the deterministic key used to ask binary storage "is this
//! configuration already built". Two configurations with equal identity are
//! interchangeable for binary reuse, even if they differ in fields the
//! identity function ignores.

use std::fmt;

use crate::core::recipe::RecipeInfo;
use crate::util::hash::Fingerprint;

/// Deterministic identity of a recipe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the identity of a recipe's current configuration.
///
/// Settings and options are folded in sorted by axis/option name so that
/// the digest does not depend on assignment order.
pub fn compute(name: &str, version: &str, info: &RecipeInfo) -> Identity {
    let mut fp = Fingerprint::new();
    fp.update_str(name).update_str(version);

    let mut pairs: Vec<_> = info.settings().iter().collect();
    pairs.sort();
    for (axis, value) in pairs {
        fp.update_pair(axis, value);
    }

    let mut options: Vec<_> = info.options().iter().collect();
    options.sort();
    for (name, value) in options {
        fp.update_pair(name, value);
    }

    match info.settings_target() {
        Some(target) => {
            fp.update_opt(Some("target"));
            let mut pairs: Vec<_> = target.iter().collect();
            pairs.sort();
            for (axis, value) in pairs {
                fp.update_pair(axis, value);
            }
        }
        None => {
            fp.update_opt(None);
        }
    }

    Identity(fp.finish_short())
}
