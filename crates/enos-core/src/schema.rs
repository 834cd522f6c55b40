//! Resource schema declarations
//!
//! A schema lists every top-level attribute of a resource with its type and
//! whether the user or the resource supplies it. Configuration validation
//! checks user input against it before any typed decode runs.

use enos_wire::{AttributePath, Value, WireType};
use serde::Serialize;

use crate::diag::Diagnostic;

/// Name of the identity attribute every resource carries
pub const ID_ATTRIBUTE: &str = "id";

/// Who supplies an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Must be set by the user
    Required,
    /// May be set by the user
    Optional,
    /// Set by the resource only
    Computed,
    /// Set by the user, or by the resource when the user leaves it null
    OptionalComputed,
}

/// One top-level attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(serialize_with = "serialize_type")]
    pub wire_type: WireType,
    pub kind: AttributeKind,
    /// Hidden in host output
    pub sensitive: bool,
    pub description: &'static str,
}

fn serialize_type<S: serde::Serializer>(ty: &WireType, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(ty)
}

impl Attribute {
    fn new(name: &'static str, wire_type: WireType, kind: AttributeKind) -> Self {
        Self {
            name,
            wire_type,
            kind,
            sensitive: false,
            description: "",
        }
    }

    /// A required attribute
    #[must_use]
    pub fn required(name: &'static str, wire_type: WireType) -> Self {
        Self::new(name, wire_type, AttributeKind::Required)
    }

    /// An optional attribute
    #[must_use]
    pub fn optional(name: &'static str, wire_type: WireType) -> Self {
        Self::new(name, wire_type, AttributeKind::Optional)
    }

    /// A computed attribute
    #[must_use]
    pub fn computed(name: &'static str, wire_type: WireType) -> Self {
        Self::new(name, wire_type, AttributeKind::Computed)
    }

    /// An optional attribute the resource fills in when unset
    #[must_use]
    pub fn optional_computed(name: &'static str, wire_type: WireType) -> Self {
        Self::new(name, wire_type, AttributeKind::OptionalComputed)
    }

    /// Mark as sensitive
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Set a description
    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// A resource type's schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    /// Version written into stored state
    pub version: i64,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    /// A schema with only the computed `id` attribute
    #[must_use]
    pub fn new(version: i64) -> Self {
        Self {
            version,
            attributes: vec![
                Attribute::computed(ID_ATTRIBUTE, WireType::String)
                    .describe("Identifier assigned when the resource is created"),
            ],
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Look up an attribute by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Names of computed-only attributes
    pub fn computed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.attributes
            .iter()
            .filter(|a| a.kind == AttributeKind::Computed)
            .map(|a| a.name)
    }

    /// Check user configuration against the schema
    ///
    /// Reports attributes the schema does not declare, required attributes
    /// left null, computed-only attributes the user set and type mismatches.
    #[must_use]
    pub fn check_config(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(fields) = config.as_object() else {
            if config.is_null() || config.is_unknown() {
                return Vec::new();
            }
            return vec![Diagnostic::error(
                "invalid configuration",
                format!("expected an object, got {}", config.kind()),
            )];
        };

        let mut diagnostics = Vec::new();

        for key in fields.keys() {
            if self.get(key).is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        "unsupported argument",
                        format!("an argument named {key:?} is not expected here"),
                    )
                    .with_path(AttributePath::new(key.as_str())),
                );
            }
        }

        for attribute in &self.attributes {
            let path = AttributePath::new(attribute.name);
            let value = fields.get(attribute.name).unwrap_or(&Value::Null);

            match attribute.kind {
                AttributeKind::Required if value.is_null() => diagnostics.push(
                    Diagnostic::error(
                        "missing required argument",
                        format!("the argument {:?} is required", attribute.name),
                    )
                    .with_path(path.clone()),
                ),
                AttributeKind::Computed if !value.is_null() => diagnostics.push(
                    Diagnostic::error(
                        "value for unconfigurable attribute",
                        format!("{:?} is set by the resource and cannot be configured", attribute.name),
                    )
                    .with_path(path.clone()),
                ),
                _ => {}
            }

            if let Err(e) = attribute.wire_type.check(value, &path) {
                diagnostics.push(
                    Diagnostic::error("incorrect attribute value type", e.to_string())
                        .with_path(e.path().cloned().unwrap_or(path)),
                );
            }
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(1)
            .attribute(Attribute::optional("transport", WireType::Dynamic))
            .attribute(Attribute::required("destination", WireType::String))
            .attribute(Attribute::optional("content", WireType::String).sensitive())
            .attribute(Attribute::computed("sum", WireType::String))
    }

    fn paths(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics
            .iter()
            .filter_map(|d| d.path.as_ref().map(ToString::to_string))
            .collect()
    }

    #[test]
    fn test_valid_config() {
        let config = Value::object([
            ("destination", Value::from("/etc/motd")),
            ("content", Value::Unknown),
            ("transport", Value::object([("ssh", Value::object([("host", Value::from("h"))]))])),
        ]);
        assert!(schema().check_config(&config).is_empty());
    }

    #[test]
    fn test_reports_every_problem() {
        let config = Value::object([
            ("sum", Value::from("abc")),
            ("bogus", Value::Bool(true)),
            ("content", Value::Bool(true)),
        ]);
        let diagnostics = schema().check_config(&config);
        assert_eq!(paths(&diagnostics), ["bogus", "destination", "content", "sum"]);
    }

    #[test]
    fn test_unknown_required_is_fine() {
        let config = Value::object([("destination", Value::Unknown)]);
        assert!(schema().check_config(&config).is_empty());
    }

    #[test]
    fn test_computed_names() {
        let computed: Vec<_> = schema().computed().collect();
        assert_eq!(computed, ["id", "sum"]);
    }

    #[test]
    fn test_serialize_schema() {
        let json = serde_json::to_value(schema()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["attributes"][0]["name"], "id");
        assert_eq!(json["attributes"][0]["kind"], "computed");
        assert_eq!(json["attributes"][1]["wire_type"], "dynamic");
    }
}
