//! Indexing configuration.
//!
//! The attribute allow-lists follow climate-data conventions and are meant
//! to be extended per project, so they live here instead of in the
//! reconciliation code.

use std::collections::BTreeSet;

/// Decides whether an attribute is a "key" attribute or an "other" attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePolicy {
    /// Attribute names classified as key attributes.
    key_names: BTreeSet<String>,
    /// Compare names without regard to ASCII case.
    case_insensitive: bool,
}

impl AttributePolicy {
    /// Create a policy from a list of key attribute names.
    pub fn new<I, S>(key_names: I, case_insensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_names = key_names
            .into_iter()
            .map(|name| {
                let name: String = name.into();
                if case_insensitive {
                    name.to_ascii_lowercase()
                } else {
                    name
                }
            })
            .collect();

        Self {
            key_names,
            case_insensitive,
        }
    }

    /// Default policy for dataset (global) attributes.
    pub fn dataset_default() -> Self {
        Self::new(["conventions", "version", "history"], true)
    }

    /// Default policy for variable and dimension attributes.
    pub fn object_default() -> Self {
        Self::new(
            [
                "missing_value",
                "comments",
                "long_name",
                "grid_name",
                "grid_type",
            ],
            false,
        )
    }

    /// Add another key attribute name.
    pub fn with_key(mut self, name: impl Into<String>) -> Self {
        let name: String = name.into();
        if self.case_insensitive {
            self.key_names.insert(name.to_ascii_lowercase());
        } else {
            self.key_names.insert(name);
        }
        self
    }

    /// Check if the named attribute is a key attribute.
    pub fn is_key(&self, name: &str) -> bool {
        if self.case_insensitive {
            self.key_names.contains(&name.to_ascii_lowercase())
        } else {
            self.key_names.contains(name)
        }
    }
}

/// Configuration for building a dataset index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Name of the record (time) dimension and variable.
    pub record_dim_name: String,
    /// Classification of global attributes.
    pub dataset_attributes: AttributePolicy,
    /// Classification of variable and dimension attributes.
    pub object_attributes: AttributePolicy,
    /// Dimension names treated as vertical coordinates.
    pub vertical_dim_names: Vec<String>,
    /// Dimension names declared as grid dimensions before indexing.
    pub grid_dim_names: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            record_dim_name: "time".to_string(),
            dataset_attributes: AttributePolicy::dataset_default(),
            object_attributes: AttributePolicy::object_default(),
            vertical_dim_names: ["lev", "pres", "z", "plev"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            grid_dim_names: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// Use a different record dimension name.
    pub fn with_record_dim(mut self, name: impl Into<String>) -> Self {
        self.record_dim_name = name.into();
        self
    }

    /// Declare grid dimensions up front.
    pub fn with_grid_dims<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grid_dim_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the dataset attribute policy.
    pub fn with_dataset_attributes(mut self, policy: AttributePolicy) -> Self {
        self.dataset_attributes = policy;
        self
    }

    /// Replace the variable/dimension attribute policy.
    pub fn with_object_attributes(mut self, policy: AttributePolicy) -> Self {
        self.object_attributes = policy;
        self
    }

    /// Check if a dimension name denotes a vertical coordinate.
    pub fn is_vertical(&self, name: &str) -> bool {
        self.vertical_dim_names.iter().any(|v| v == name)
    }
}
