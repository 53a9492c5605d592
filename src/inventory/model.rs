use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A Nautobot secrets-group with its secret associations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretsGroup {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
    #[serde(
        default,
        rename = "secretsgroupassociation_set",
        alias = "secrets_group_associations"
    )]
    pub associations: Option<Vec<SecretAssociation>>,
}

/// Links a secret to a group under an access type and secret type,
/// e.g. `SSH` / `PASSWORD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretAssociation {
    pub access_type: String,
    pub secret_type: String,
    pub secret: SecretDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretDescriptor {
    pub id: String,
    pub provider: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub parameters: SecretParameters,
}

/// Provider-specific locator stored on a Nautobot secret
///
/// Thycotic secrets carry either `secret_id` or `secret_path`, plus the slug
/// of the field to extract in `secret_selected_value`. Nautobot stores the id
/// as a JSON number, so both numbers and strings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretParameters {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_selected_value: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Reference to another Nautobot object as embedded in REST responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub secrets_group: Option<NestedRef>,
    #[serde(default)]
    pub virtual_chassis: Option<NestedRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualChassisRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub master: Option<NestedRef>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "secret_id must be a string or number, got {}",
            other
        ))),
    }
}
