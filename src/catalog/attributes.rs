//! Attribute reconciliation across repeated observations of one object.

use std::collections::BTreeMap;
use std::fmt;

use crate::accessor::{ElementType, VariableHeader};
use crate::config::AttributePolicy;

/// Attribute tracked outside the key/other sets.
const UNITS: &str = "units";

/// How a later observation diverged from the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// An attribute carries a different value.
    Value(String),
    /// An attribute was not present in earlier files.
    Appearance(String),
    /// An attribute present in earlier files is missing.
    Omission(String),
    /// The stored element type differs.
    Type {
        /// Type seen first.
        expected: Option<ElementType>,
        /// Type seen now.
        found: Option<ElementType>,
    },
    /// The units attribute differs.
    Units {
        /// Units seen first.
        expected: String,
        /// Units seen now.
        found: String,
    },
    /// Coordinate values of a dimension differ.
    CoordinateValues,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Value(name) => write!(f, "inconsistent value of \"{}\"", name),
            Mismatch::Appearance(name) => {
                write!(f, "inconsistent appearance of attribute \"{}\"", name)
            },
            Mismatch::Omission(name) => write!(f, "inconsistent omission of attribute \"{}\"", name),
            Mismatch::Type { expected, found } => write!(
                f,
                "inconsistent type ({} / {})",
                type_name(*expected),
                type_name(*found)
            ),
            Mismatch::Units { expected, found } => {
                write!(f, "inconsistent units (\"{}\" / \"{}\")", expected, found)
            },
            Mismatch::CoordinateValues => write!(f, "inconsistent coordinate values"),
        }
    }
}

fn type_name(element_type: Option<ElementType>) -> &'static str {
    element_type.map_or("none", ElementType::name)
}

/// Attributes of one object, split into key and other attributes.
///
/// Classification happens when the set is seeded and never changes
/// afterwards; later observations are only checked against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    key: BTreeMap<String, String>,
    other: BTreeMap<String, String>,
}

impl AttributeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a set from the first observation of an object.
    pub fn classify(attributes: &[(String, String)], policy: &AttributePolicy) -> Self {
        let mut set = Self::new();
        for (name, value) in attributes.iter().filter(|(name, _)| name != UNITS) {
            set.insert(name, value, policy);
        }
        set
    }

    /// Insert one attribute, classifying it by the policy.
    pub fn insert(&mut self, name: &str, value: &str, policy: &AttributePolicy) {
        let target = if policy.is_key(name) {
            &mut self.key
        } else {
            &mut self.other
        };
        target.insert(name.to_string(), value.to_string());
    }

    /// Check a later observation against the seeded set.
    ///
    /// Every attribute must already be classified with the same value, and
    /// no classified attribute may be missing.
    pub fn reconcile(&self, attributes: &[(String, String)]) -> Result<(), Mismatch> {
        let mut seen = 0;
        for (name, value) in attributes.iter().filter(|(name, _)| name != UNITS) {
            match self.get(name) {
                Some(existing) if existing == value => seen += 1,
                Some(_) => return Err(Mismatch::Value(name.clone())),
                None => return Err(Mismatch::Appearance(name.clone())),
            }
        }

        if seen != self.len() {
            let missing = self
                .iter()
                .map(|(name, _)| name)
                .find(|name| !attributes.iter().any(|(n, _)| n == *name));
            if let Some(name) = missing {
                return Err(Mismatch::Omission(name.to_string()));
            }
        }
        Ok(())
    }

    /// Look up an attribute in either set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.key
            .get(name)
            .or_else(|| self.other.get(name))
            .map(String::as_str)
    }

    /// Key attributes, sorted by name.
    pub fn key(&self) -> &BTreeMap<String, String> {
        &self.key
    }

    /// Other attributes, sorted by name.
    pub fn other(&self) -> &BTreeMap<String, String> {
        &self.other
    }

    /// All attributes, key attributes first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.key
            .iter()
            .chain(self.other.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Total number of attributes.
    pub fn len(&self) -> usize {
        self.key.len() + self.other.len()
    }

    /// Check if the set holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.other.is_empty()
    }
}

/// Reconciled metadata of a variable-like object: type, units and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    name: String,
    element_type: Option<ElementType>,
    units: String,
    attributes: AttributeSet,
}

impl ObjectInfo {
    /// Create info without a stored type, as for declared output objects.
    pub fn new(name: impl Into<String>, element_type: Option<ElementType>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            element_type,
            units: units.into(),
            attributes: AttributeSet::new(),
        }
    }

    /// Seed info from the first sighting of a variable.
    pub fn from_header(header: &VariableHeader, policy: &AttributePolicy) -> Self {
        Self {
            name: header.name.clone(),
            element_type: Some(header.element_type),
            units: header.attribute(UNITS).unwrap_or_default().to_string(),
            attributes: AttributeSet::classify(&header.attributes, policy),
        }
    }

    /// Check a later sighting of the same variable.
    pub fn reconcile(&self, header: &VariableHeader, check_units: bool) -> Result<(), Mismatch> {
        assert_eq!(self.name, header.name, "reconciling mismatched objects");

        if self.element_type != Some(header.element_type) {
            return Err(Mismatch::Type {
                expected: self.element_type,
                found: Some(header.element_type),
            });
        }

        let units = header.attribute(UNITS).unwrap_or_default();
        if check_units && self.units != units {
            return Err(Mismatch::Units {
                expected: self.units.clone(),
                found: units.to_string(),
            });
        }

        self.attributes.reconcile(&header.attributes)
    }

    /// Object name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored element type, if the object has data.
    pub fn element_type(&self) -> Option<ElementType> {
        self.element_type
    }

    /// Units, empty when absent.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Reconciled attributes.
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_classify_splits_key_and_other() {
        let policy = AttributePolicy::dataset_default();
        let set = AttributeSet::classify(
            &attrs(&[("Conventions", "CF-1.6"), ("title", "run"), ("units", "K")]),
            &policy,
        );

        assert_eq!(set.key().get("Conventions").map(String::as_str), Some("CF-1.6"));
        assert_eq!(set.other().get("title").map(String::as_str), Some("run"));
        assert_eq!(set.len(), 2);
        assert!(set.get("units").is_none());
    }

    #[test]
    fn test_reconcile_accepts_reordered_attributes() {
        let policy = AttributePolicy::dataset_default();
        let set = AttributeSet::classify(&attrs(&[("a", "1"), ("b", "2")]), &policy);
        assert!(set.reconcile(&attrs(&[("b", "2"), ("a", "1")])).is_ok());
    }

    #[test]
    fn test_reconcile_reports_each_divergence() {
        let policy = AttributePolicy::dataset_default();
        let set = AttributeSet::classify(&attrs(&[("a", "1"), ("b", "2")]), &policy);

        assert_eq!(
            set.reconcile(&attrs(&[("a", "1"), ("b", "3")])),
            Err(Mismatch::Value("b".to_string()))
        );
        assert_eq!(
            set.reconcile(&attrs(&[("a", "1"), ("b", "2"), ("history", "v2")])),
            Err(Mismatch::Appearance("history".to_string()))
        );
        assert_eq!(
            set.reconcile(&attrs(&[("a", "1")])),
            Err(Mismatch::Omission("b".to_string()))
        );
    }

    #[test]
    fn test_object_info_checks_type_and_units() {
        let policy = AttributePolicy::object_default();
        let header = VariableHeader {
            name: "tas".to_string(),
            element_type: ElementType::Float,
            dimensions: Vec::new(),
            attributes: attrs(&[("units", "K"), ("long_name", "Temperature")]),
        };
        let info = ObjectInfo::from_header(&header, &policy);
        assert_eq!(info.units(), "K");
        assert!(info.attributes().key().contains_key("long_name"));
        assert!(info.reconcile(&header, true).is_ok());

        let mut other = header.clone();
        other.element_type = ElementType::Double;
        assert!(matches!(info.reconcile(&other, true), Err(Mismatch::Type { .. })));

        let mut other = header;
        other.attributes = attrs(&[("units", "degC"), ("long_name", "Temperature")]);
        assert!(matches!(info.reconcile(&other, true), Err(Mismatch::Units { .. })));
        assert!(info.reconcile(&other, false).is_ok());
    }
}
