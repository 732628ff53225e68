use std::collections::BTreeMap;

use crate::error::BuildError;

/// Everything action factories may depend on while a standard's scenarios
/// are instantiated.
///
/// Passed explicitly to every factory; there is no thread-local or global
/// "current builder".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub standard_name: String,
    pub standard_version: String,
    /// API version the checks compare `API-Version` headers against.
    pub api_version: String,
    parties: BTreeMap<String, String>,
}

impl BuildContext {
    pub fn new(standard_name: &str, standard_version: &str) -> Self {
        Self {
            standard_name: standard_name.to_string(),
            standard_version: standard_version.to_string(),
            api_version: standard_version.to_string(),
            parties: BTreeMap::new(),
        }
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_string();
        self
    }

    /// Register the party that plays `role` in this session.
    pub fn with_party(mut self, role: &str, party_name: &str) -> Self {
        self.parties
            .insert(role.to_string(), party_name.to_string());
        self
    }

    /// Name of the party playing `role`.
    pub fn party(&self, role: &str) -> Result<&str, BuildError> {
        self.parties
            .get(role)
            .map(String::as_str)
            .ok_or_else(|| BuildError::UnknownRole(role.to_string()))
    }

    /// Role played by `party_name`, if any.
    pub fn role_of(&self, party_name: &str) -> Option<&str> {
        self.parties
            .iter()
            .find(|(_, name)| name.as_str() == party_name)
            .map(|(role, _)| role.as_str())
    }

    pub fn parties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parties
            .iter()
            .map(|(role, name)| (role.as_str(), name.as_str()))
    }
}
