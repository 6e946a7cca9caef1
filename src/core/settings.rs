//! Settings schema and per-recipe settings values.
//!
//! The schema is a recursive lookup table of recognized configuration axes
//! (os, arch, compiler, ...) and their permitted values. Axes may carry
//! value-dependent sub-axes: the sub-axes available under `compiler` depend
//! on which compiler is selected. The schema is immutable after load and
//! shared read-only by everything that consults it.

use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

/// Sentinel accepting any value for an axis.
const ANY: &str = "ANY";

/// Built-in settings catalog.
///
/// Axis values are always written as strings, including numeric-looking
/// ones such as compiler versions. A value list containing `"ANY"`
/// collapses to an unconstrained axis.
const DEFAULT_CATALOG: &str = r##"
arch = ["x86", "x86_64", "armv7", "armv7hf", "armv8", "armv8.3", "wasm"]
build_type = ["None", "Debug", "Release", "RelWithDebInfo", "MinSizeRel"]

[os.Windows]
subsystem = ["None", "cygwin", "msys", "msys2", "wsl"]

[os.Linux]

[os.Macos]
version = ["None", "10.13", "10.14", "10.15", "11.0", "12.0", "13.0", "14.0"]
subsystem = ["None", "catalyst"]

[os.iOS]
version = ["13.0", "14.0", "15.0", "16.0", "17.0"]
sdk = ["iphoneos", "iphonesimulator"]

[os.Android]
api_level = "ANY"

[os.FreeBSD]

[os.Emscripten]

[compiler.gcc]
version = ["4.9", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14"]
libcxx = ["libstdc++", "libstdc++11"]
threads = ["None", "posix", "win32"]
cppstd = ["None", "98", "gnu98", "11", "gnu11", "14", "gnu14", "17", "gnu17", "20", "gnu20", "23", "gnu23"]
cstd = ["None", "99", "gnu99", "11", "gnu11", "17", "gnu17", "23", "gnu23"]

[compiler.clang]
version = ["8", "9", "10", "11", "12", "13", "14", "15", "16", "17", "18"]
libcxx = ["None", "libstdc++", "libstdc++11", "libc++", "c++_shared", "c++_static"]
runtime = ["None", "static", "dynamic"]
cppstd = ["None", "98", "gnu98", "11", "gnu11", "14", "gnu14", "17", "gnu17", "20", "gnu20", "23", "gnu23"]
cstd = ["None", "99", "gnu99", "11", "gnu11", "17", "gnu17", "23", "gnu23"]

[compiler.apple-clang]
version = ["11.0", "12.0", "13.0", "13.1", "14.0", "15.0"]
libcxx = ["libstdc++", "libc++"]
cppstd = ["None", "98", "gnu98", "11", "gnu11", "14", "gnu14", "17", "gnu17", "20", "gnu20", "23", "gnu23"]
cstd = ["None", "99", "gnu99", "11", "gnu11", "17", "gnu17", "23", "gnu23"]

[compiler.qcc]
version = ["4.4", "5.4", "8.3"]
libcxx = ["cxx", "gpp", "cpp", "cpp-ne", "accp", "acpp-ne", "ecpp", "ecpp-ne"]
cppstd = ["None", "98", "gnu98", "11", "gnu11", "14", "gnu14", "17", "gnu17"]

[compiler.msvc]
version = ["190", "191", "192", "193", "194"]
update = ["None", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]
runtime = ["static", "dynamic"]
runtime_type = ["Debug", "Release"]
cppstd = ["14", "17", "20", "23"]
cstd = ["None", "11", "17"]
"##;

/// Errors from schema loading and settings assignment.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown setting `{axis}` for this configuration")]
    UnknownAxis { axis: String },

    #[error("invalid value `{value}` for setting `{axis}` (permitted: {permitted:?})")]
    InvalidValue {
        axis: String,
        value: String,
        permitted: Vec<String>,
    },

    #[error("malformed settings catalog: {reason}")]
    Catalog { reason: String },
}

/// One node of the settings schema tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// Any value is accepted.
    Any,

    /// Finite set of permitted literal values.
    Values(Vec<String>),

    /// Permitted values, each carrying value-dependent child axes.
    Nested(IndexMap<String, IndexMap<String, SchemaNode>>),
}

/// Raw catalog shape as written in TOML.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Sentinel(String),
    Values(Vec<String>),
    Nested(IndexMap<String, IndexMap<String, RawNode>>),
}

impl RawNode {
    fn into_node(self, axis: &str) -> Result<SchemaNode, SettingsError> {
        match self {
            RawNode::Sentinel(s) if s == ANY => Ok(SchemaNode::Any),
            RawNode::Sentinel(s) => Err(SettingsError::Catalog {
                reason: format!("axis `{axis}` has scalar value `{s}` (only \"ANY\" is allowed)"),
            }),
            RawNode::Values(values) => {
                if values.iter().any(|v| v == ANY) {
                    Ok(SchemaNode::Any)
                } else {
                    Ok(SchemaNode::Values(values))
                }
            }
            RawNode::Nested(raw) => {
                let mut nested = IndexMap::new();
                for (value, children) in raw {
                    let mut axes = IndexMap::new();
                    for (child_axis, child) in children {
                        let path = format!("{axis}.{child_axis}");
                        axes.insert(child_axis, child.into_node(&path)?);
                    }
                    nested.insert(value, axes);
                }
                Ok(SchemaNode::Nested(nested))
            }
        }
    }
}

/// Result of a schema lookup.
///
/// `Unknown` means the axis or its context is unrecognized and the schema
/// has no data to decide. It is distinct from `Values(vec![])`, which would
/// mean "recognized, but nothing is permitted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Unknown,
    Unconstrained,
    Values(Vec<String>),
}

/// The loaded, immutable settings schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSchema {
    axes: IndexMap<String, SchemaNode>,
}

static BUILTIN: LazyLock<Arc<SettingsSchema>> = LazyLock::new(|| {
    Arc::new(
        SettingsSchema::from_toml_str(DEFAULT_CATALOG)
            .expect("built-in settings catalog is valid"),
    )
});

impl SettingsSchema {
    /// Parse a schema from its TOML catalog form.
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        let raw: IndexMap<String, RawNode> =
            toml::from_str(s).map_err(|e| SettingsError::Catalog {
                reason: e.to_string(),
            })?;

        let mut axes = IndexMap::new();
        for (axis, node) in raw {
            let converted = node.into_node(&axis)?;
            axes.insert(axis, converted);
        }
        Ok(SettingsSchema { axes })
    }

    /// The built-in default catalog.
    pub fn builtin() -> Arc<SettingsSchema> {
        BUILTIN.clone()
    }

    /// Top-level axis names in catalog order.
    pub fn axes(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(|s| s.as_str())
    }

    /// Look up the permitted values for a dotted axis path.
    ///
    /// `context` supplies the already-fixed parent axis values needed to
    /// resolve nested axes: resolving `compiler.cppstd` requires
    /// `context["compiler"]`. Any unrecognized step yields
    /// [`Lookup::Unknown`].
    pub fn supported_values(&self, axis: &str, context: &IndexMap<String, String>) -> Lookup {
        let mut segments = axis.split('.');
        let Some(first) = segments.next() else {
            return Lookup::Unknown;
        };
        let Some(mut node) = self.axes.get(first) else {
            return Lookup::Unknown;
        };

        let mut prefix = first.to_string();
        for segment in segments {
            let SchemaNode::Nested(nested) = node else {
                return Lookup::Unknown;
            };
            let Some(selected) = context.get(&prefix) else {
                return Lookup::Unknown;
            };
            let Some(children) = nested.get(selected) else {
                return Lookup::Unknown;
            };
            let Some(next) = children.get(segment) else {
                return Lookup::Unknown;
            };
            node = next;
            prefix.push('.');
            prefix.push_str(segment);
        }

        match node {
            SchemaNode::Any => Lookup::Unconstrained,
            SchemaNode::Values(values) => Lookup::Values(values.clone()),
            SchemaNode::Nested(nested) => Lookup::Values(nested.keys().cloned().collect()),
        }
    }

    /// Whether the axis resolves under the given context.
    pub fn knows_axis(&self, axis: &str, context: &IndexMap<String, String>) -> bool {
        !matches!(self.supported_values(axis, context), Lookup::Unknown)
    }
}

/// Axis-value assignments for one recipe, constrained by the schema and by
/// the subset of top-level axes the recipe declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    schema: Arc<SettingsSchema>,
    declared: Vec<String>,
    values: IndexMap<String, String>,
}

impl Settings {
    /// Create empty settings over the declared top-level axes.
    pub fn new(
        schema: Arc<SettingsSchema>,
        declared: &[&str],
    ) -> Result<Self, SettingsError> {
        for axis in declared {
            if !schema.axes.contains_key(*axis) {
                return Err(SettingsError::UnknownAxis {
                    axis: (*axis).to_string(),
                });
            }
        }
        Ok(Settings {
            schema,
            declared: declared.iter().map(|s| s.to_string()).collect(),
            values: IndexMap::new(),
        })
    }

    /// The schema this settings object validates against.
    pub fn schema(&self) -> &Arc<SettingsSchema> {
        &self.schema
    }

    /// Read a setting, `None` if absent.
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values.get(axis).map(|s| s.as_str())
    }

    /// Permitted values for an axis under the current assignments.
    pub fn lookup(&self, axis: &str) -> Lookup {
        self.schema.supported_values(axis, &self.values)
    }

    /// Assign a value, validating axis and value against the schema.
    pub fn set(&mut self, axis: &str, value: &str) -> Result<(), SettingsError> {
        let top = axis.split('.').next().unwrap_or(axis);
        if !self.declared.iter().any(|d| d == top) {
            return Err(SettingsError::UnknownAxis {
                axis: axis.to_string(),
            });
        }

        match self.schema.supported_values(axis, &self.values) {
            Lookup::Unknown => Err(SettingsError::UnknownAxis {
                axis: axis.to_string(),
            }),
            Lookup::Unconstrained => {
                self.values.insert(axis.to_string(), value.to_string());
                Ok(())
            }
            Lookup::Values(permitted) => {
                if permitted.iter().any(|p| p == value) {
                    self.values.insert(axis.to_string(), value.to_string());
                    Ok(())
                } else {
                    Err(SettingsError::InvalidValue {
                        axis: axis.to_string(),
                        value: value.to_string(),
                        permitted,
                    })
                }
            }
        }
    }

    /// Apply an ordered list of (axis, value) overrides.
    ///
    /// With `tolerate_unknown`, overrides naming an axis this configuration
    /// does not resolve are skipped rather than rejected. Impermissible
    /// values for known axes are always an error.
    pub fn apply_delta(
        &mut self,
        pairs: &[(String, String)],
        tolerate_unknown: bool,
    ) -> Result<(), SettingsError> {
        for (axis, value) in pairs {
            match self.set(axis, value) {
                Ok(()) => {}
                Err(SettingsError::UnknownAxis { axis }) if tolerate_unknown => {
                    tracing::debug!("ignoring override for unknown setting `{axis}`");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Current assignments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw assignment map, used as lookup context.
    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let schema = SettingsSchema::builtin();
        let axes: Vec<_> = schema.axes().collect();
        assert!(axes.contains(&"os"));
        assert!(axes.contains(&"compiler"));
        assert!(axes.contains(&"build_type"));
    }

    #[test]
    fn test_top_level_lookup() {
        let schema = SettingsSchema::builtin();
        match schema.supported_values("build_type", &context(&[])) {
            Lookup::Values(values) => assert!(values.contains(&"Release".to_string())),
            other => panic!("expected values, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_axis_values_are_keys() {
        let schema = SettingsSchema::builtin();
        match schema.supported_values("compiler", &context(&[])) {
            Lookup::Values(values) => {
                assert!(values.contains(&"gcc".to_string()));
                assert!(values.contains(&"msvc".to_string()));
            }
            other => panic!("expected values, got {other:?}"),
        }
    }

    #[test]
    fn test_context_dependent_lookup() {
        let schema = SettingsSchema::builtin();

        let gcc = schema.supported_values("compiler.cppstd", &context(&[("compiler", "gcc")]));
        match gcc {
            Lookup::Values(values) => assert!(values.contains(&"gnu17".to_string())),
            other => panic!("expected values, got {other:?}"),
        }

        // msvc has no gnu variants
        let msvc = schema.supported_values("compiler.cppstd", &context(&[("compiler", "msvc")]));
        assert_eq!(
            msvc,
            Lookup::Values(vec![
                "14".to_string(),
                "17".to_string(),
                "20".to_string(),
                "23".to_string()
            ])
        );
    }

    #[test]
    fn test_unknown_context_is_unknown_not_empty() {
        let schema = SettingsSchema::builtin();

        // Missing context
        assert_eq!(
            schema.supported_values("compiler.cppstd", &context(&[])),
            Lookup::Unknown
        );

        // Unrecognized compiler
        assert_eq!(
            schema.supported_values("compiler.cppstd", &context(&[("compiler", "tcc")])),
            Lookup::Unknown
        );

        // Unrecognized axis
        assert_eq!(
            schema.supported_values("flavor", &context(&[])),
            Lookup::Unknown
        );
    }

    #[test]
    fn test_any_sentinel() {
        let schema = SettingsSchema::builtin();
        assert_eq!(
            schema.supported_values("os.api_level", &context(&[("os", "Android")])),
            Lookup::Unconstrained
        );
    }

    #[test]
    fn test_settings_set_and_get() {
        let mut settings =
            Settings::new(SettingsSchema::builtin(), &["os", "compiler", "build_type"]).unwrap();
        settings.set("compiler", "gcc").unwrap();
        settings.set("compiler.version", "11").unwrap();
        settings.set("compiler.cppstd", "17").unwrap();

        assert_eq!(settings.get("compiler"), Some("gcc"));
        assert_eq!(settings.get("compiler.cppstd"), Some("17"));
        assert_eq!(settings.get("compiler.libcxx"), None);
    }

    #[test]
    fn test_settings_rejects_invalid_value() {
        let mut settings = Settings::new(SettingsSchema::builtin(), &["compiler"]).unwrap();
        settings.set("compiler", "msvc").unwrap();

        let err = settings.set("compiler.cppstd", "98").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
    }

    #[test]
    fn test_settings_rejects_undeclared_axis() {
        let mut settings = Settings::new(SettingsSchema::builtin(), &["compiler"]).unwrap();
        let err = settings.set("os", "Linux").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownAxis { .. }));
    }

    #[test]
    fn test_apply_delta_tolerates_unknown_axis() {
        let mut settings = Settings::new(SettingsSchema::builtin(), &["compiler"]).unwrap();
        settings.set("compiler", "gcc").unwrap();
        settings.set("compiler.version", "11").unwrap();

        let delta = vec![
            ("os".to_string(), "Linux".to_string()), // not declared here
            ("compiler.cppstd".to_string(), "20".to_string()),
        ];
        settings.apply_delta(&delta, true).unwrap();

        assert_eq!(settings.get("os"), None);
        assert_eq!(settings.get("compiler.cppstd"), Some("20"));

        // Strict mode rejects the same delta.
        let mut strict = Settings::new(SettingsSchema::builtin(), &["compiler"]).unwrap();
        strict.set("compiler", "gcc").unwrap();
        strict.set("compiler.version", "11").unwrap();
        assert!(strict.apply_delta(&delta, false).is_err());
    }

    #[test]
    fn test_catalog_rejects_bad_sentinel() {
        let err = SettingsSchema::from_toml_str("axis = \"SOME\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Catalog { .. }));
    }
}
