use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// Name of the custom property linking a mirror back to its fork.
pub const FORK_PROPERTY: &str = "fork";

/// A repository as returned by the code-hosting service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub custom_properties: Option<BTreeMap<String, serde_json::Value>>,
}

impl RepositoryRecord {
    /// The `fork` tracking property, if the repository carries one.
    pub fn fork_property(&self) -> Option<&str> {
        self.custom_properties
            .as_ref()
            .and_then(|props| props.get(FORK_PROPERTY))
            .and_then(|value| value.as_str())
    }
}

/// An organization-level custom property definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomProperty {
    pub property_name: String,
    pub value_type: String,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CustomProperty {
    pub fn string(name: &str, description: &str) -> Self {
        CustomProperty {
            property_name: name.to_string(),
            value_type: "string".to_string(),
            required: Some(false),
            description: Some(description.to_string()),
        }
    }

    pub fn is_string_named(&self, name: &str) -> bool {
        self.property_name == name && self.value_type == "string"
    }
}

/// Body of a create-repository call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewRepository {
    pub name: String,
    pub private: bool,
    pub custom_properties: BTreeMap<String, String>,
}

impl NewRepository {
    /// A private repository tagged with `fork = "<owner>/<name>"`.
    pub fn private_mirror(name: &str, fork_owner: &str, fork_name: &str) -> Self {
        let mut custom_properties = BTreeMap::new();
        custom_properties.insert(
            FORK_PROPERTY.to_string(),
            format!("{}/{}", fork_owner, fork_name),
        );

        NewRepository {
            name: name.to_string(),
            private: true,
            custom_properties,
        }
    }
}

#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Canonical login of an organization.
    async fn organization_login(&self, org: &str) -> Result<String, MirrorError>;

    async fn get_repository(&self, owner: &str, name: &str)
        -> Result<RepositoryRecord, MirrorError>;

    async fn create_repository(
        &self,
        org: &str,
        repository: &NewRepository,
    ) -> Result<RepositoryRecord, MirrorError>;

    async fn update_repository_name(
        &self,
        owner: &str,
        name: &str,
        new_name: &str,
    ) -> Result<RepositoryRecord, MirrorError>;

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<(), MirrorError>;

    async fn list_custom_properties(&self, org: &str) -> Result<Vec<CustomProperty>, MirrorError>;

    async fn create_custom_property(
        &self,
        org: &str,
        property: &CustomProperty,
    ) -> Result<CustomProperty, MirrorError>;

    /// Runs a repository search, following every result page in order.
    async fn search_repositories(&self, query: &str)
        -> Result<Vec<RepositoryRecord>, MirrorError>;
}
