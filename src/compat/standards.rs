//! Supported language standards per (compiler, version).
//!
//! These queries answer "which C++ / C standards could this compiler build
//! with", filtered down to what the settings schema permits for that
//! compiler. `None` means the schema or the tables have no data to decide,
//! which is distinct from an empty list.

use indexmap::IndexMap;

use crate::core::settings::{Lookup, SettingsSchema};

/// Cumulative (minimum version, standards added) table.
type Thresholds = &'static [(&'static str, &'static [&'static str])];

const GCC_CPPSTD: Thresholds = &[
    ("3.4", &["98", "gnu98"]),
    ("4.3", &["11", "gnu11"]),
    ("4.8", &["14", "gnu14"]),
    ("5", &["17", "gnu17"]),
    ("8", &["20", "gnu20"]),
    ("11", &["23", "gnu23"]),
];

const MSVC_CPPSTD: Thresholds = &[
    ("190", &["14"]),
    ("191", &["17"]),
    ("192", &["20"]),
    ("193", &["23"]),
];

const CLANG_CPPSTD: Thresholds = &[
    ("2.1", &["98", "gnu98", "11", "gnu11"]),
    ("3.4", &["14", "gnu14"]),
    ("5", &["17", "gnu17"]),
    ("10", &["20", "gnu20"]),
    ("13", &["23", "gnu23"]),
];

const APPLE_CLANG_CPPSTD: Thresholds = &[
    ("4.0", &["98", "gnu98", "11", "gnu11"]),
    ("5.1", &["14", "gnu14"]),
    ("6.1", &["17", "gnu17"]),
    ("10", &["20", "gnu20"]),
    ("13", &["23", "gnu23"]),
];

const GCC_CSTD: Thresholds = &[
    ("1", &["89", "gnu89", "99", "gnu99"]),
    ("4.7", &["11", "gnu11"]),
    ("8", &["17", "gnu17"]),
    ("14", &["23", "gnu23"]),
];

const MSVC_CSTD: Thresholds = &[("192", &["11", "17"])];

const CLANG_CSTD: Thresholds = &[
    ("1", &["89", "gnu89", "99", "gnu99"]),
    ("3.1", &["11", "gnu11"]),
    ("6", &["17", "gnu17"]),
    ("18", &["23", "gnu23"]),
];

const APPLE_CLANG_CSTD: Thresholds = &[
    ("4.0", &["89", "gnu89", "99", "gnu99"]),
    ("5.1", &["11", "gnu11"]),
    ("9.1", &["17", "gnu17"]),
    ("15", &["23", "gnu23"]),
];

/// C++ standards the given compiler release can build with, restricted to
/// the schema's permitted `compiler.cppstd` values. `None` when the
/// compiler is unknown to either side.
pub fn supported_cppstd(
    schema: &SettingsSchema,
    compiler: &str,
    version: &str,
) -> Option<Vec<String>> {
    let thresholds = match compiler {
        "gcc" => GCC_CPPSTD,
        "msvc" => MSVC_CPPSTD,
        "clang" => CLANG_CPPSTD,
        "apple-clang" => APPLE_CLANG_CPPSTD,
        _ => return None,
    };
    restrict(schema, "compiler.cppstd", compiler, cumulative(thresholds, version))
}

/// C standards, same contract as [`supported_cppstd`].
pub fn supported_cstd(
    schema: &SettingsSchema,
    compiler: &str,
    version: &str,
) -> Option<Vec<String>> {
    let thresholds = match compiler {
        "gcc" => GCC_CSTD,
        "msvc" => MSVC_CSTD,
        "clang" => CLANG_CSTD,
        "apple-clang" => APPLE_CLANG_CSTD,
        _ => return None,
    };
    restrict(schema, "compiler.cstd", compiler, cumulative(thresholds, version))
}

fn cumulative(thresholds: Thresholds, version: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (minimum, added) in thresholds {
        if version_at_least(version, minimum) {
            out.extend(added.iter().map(|s| s.to_string()));
        }
    }
    out
}

fn restrict(
    schema: &SettingsSchema,
    axis: &str,
    compiler: &str,
    candidates: Vec<String>,
) -> Option<Vec<String>> {
    let mut context = IndexMap::new();
    context.insert("compiler".to_string(), compiler.to_string());
    match schema.supported_values(axis, &context) {
        Lookup::Unknown => None,
        Lookup::Unconstrained => Some(candidates),
        Lookup::Values(permitted) => Some(
            candidates
                .into_iter()
                .filter(|c| permitted.contains(c))
                .collect(),
        ),
    }
}

/// Lenient dotted numeric comparison: `"4.8" < "11"`, missing components
/// count as zero, non-numeric components count as zero.
fn version_at_least(version: &str, minimum: &str) -> bool {
    let a = components(version);
    let b = components(minimum);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

fn components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}
