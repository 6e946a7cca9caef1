//! Compatibility factors and their combination.
//!
//! A factor is an ordered list of single-axis override proposals for one
//! independently-swappable axis. Factors are combined into candidate deltas
//! by [`expand`].

use indexmap::IndexMap;

/// One override proposal: axis-name to candidate-value assignments.
///
/// Proposals start out single-axis; combination merges them into
/// multi-axis deltas.
pub type Proposal = IndexMap<String, String>;

/// An independent set of alternative values for one axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Factor {
    proposals: Vec<Proposal>,
}

impl Factor {
    /// One proposal per value for the given axis, in value order.
    pub fn from_axis<I, S>(axis: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let proposals = values
            .into_iter()
            .map(|value| {
                let mut proposal = IndexMap::new();
                proposal.insert(axis.to_string(), value.into());
                proposal
            })
            .collect();
        Factor { proposals }
    }

    /// A single-proposal factor.
    pub fn single(axis: &str, value: &str) -> Self {
        Factor::from_axis(axis, [value.to_string()])
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

/// Combine independent factors into candidate deltas.
///
/// Factors are consumed left to right. The first factor seeds the
/// accumulator; each later factor cross-merges with every accumulated
/// entry, and the freshly merged entries are appended after the retained
/// partials. Partial combinations stay in the output ahead of the merges
/// that extend them: a delta missing later factors is a weaker but still
/// useful compatibility probe, so for factors of sizes m and n the output
/// holds m partials followed by m*n merges, not a bare cartesian product.
///
/// Zero factors produce zero candidates; one factor produces its proposals
/// unchanged.
pub fn expand(factors: &[Factor]) -> Vec<Proposal> {
    let mut combinations: Vec<Proposal> = Vec::new();
    for factor in factors {
        if combinations.is_empty() {
            combinations = factor.proposals.clone();
            continue;
        }
        let mut merged = Vec::new();
        for combination in &combinations {
            for proposal in &factor.proposals {
                let mut extended = combination.clone();
                for (axis, value) in proposal {
                    extended.insert(axis.clone(), value.clone());
                }
                merged.push(extended);
            }
        }
        combinations.extend(merged);
    }
    combinations
}
