use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// An identity issued by the ledger. Opaque to the harness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Party(String);

impl Party {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Party> for serde_json::Value {
    fn from(party: &Party) -> Self {
        serde_json::Value::String(party.0.clone())
    }
}

impl From<Party> for serde_json::Value {
    fn from(party: Party) -> Self {
        serde_json::Value::String(party.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `<package>:<Module>:<Entity>`, or `<Module>:<Entity>` when the ledger
/// resolves the package itself.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TemplateId {
    package: Option<String>,
    module: String,
    entity: String,
}

impl TemplateId {
    pub fn new(package: Option<&str>, module: &str, entity: &str) -> Self {
        Self {
            package: package.map(str::to_string),
            module: module.to_string(),
            entity: entity.to_string(),
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Same template, possibly with one side leaving the package implicit.
    pub fn matches(&self, other: &TemplateId) -> bool {
        self.module == other.module
            && self.entity == other.entity
            && match (&self.package, &other.package) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{package}:{}:{}", self.module, self.entity),
            None => write!(f, "{}:{}", self.module, self.entity),
        }
    }
}

impl FromStr for TemplateId {
    type Err = LedgerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(':').collect();
        let invalid = || LedgerError::InvalidArgument(format!("malformed template id {raw:?}"));
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [package, module, entity] => Ok(Self::new(Some(package), module, entity)),
            [module, entity] => Ok(Self::new(None, module, entity)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for TemplateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TemplateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
