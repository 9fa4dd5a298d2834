//! Server configuration records
//!
//! One record per configured mailing list endpoint. The serde attribute
//! names follow the persisted export format (`name`, `url`, `password`,
//! `overridecertname`, `whitelistedcert`) so records serialized by an
//! external configuration layer can be consumed as data.

use serde::{Deserialize, Serialize};

use crate::fetch::TrustPolicy;

/// Configuration for one mailing list endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// List name; unique key across the registry
    pub name: String,

    /// Root URL of the list manager installation, not including the list name
    pub url: String,

    /// Shared password used for both enumeration and moderation
    pub password: String,

    /// Expected certificate subject CN, overriding hostname verification
    #[serde(
        rename = "overridecertname",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hostname_override: Option<String>,

    /// Pinned certificate SHA-1 fingerprint (hex, case-insensitive)
    #[serde(
        rename = "whitelistedcert",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cert_fingerprint: Option<String>,
}

impl ServerConfig {
    /// Create a configuration with no custom trust policy.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            password: password.into(),
            hostname_override: None,
            cert_fingerprint: None,
        }
    }

    /// Derive the transport trust policy for this server.
    ///
    /// Empty strings are treated the same as absent values, matching how the
    /// persisted format omits unset attributes.
    pub fn trust_policy(&self) -> TrustPolicy {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        TrustPolicy::new(
            non_empty(&self.hostname_override),
            non_empty(&self.cert_fingerprint),
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_persisted_attribute_names() {
        let config = ServerConfig {
            name: "announce".into(),
            url: "https://lists.example.org/admindb".into(),
            password: "hunter2".into(),
            hostname_override: Some("lists.example.org".into()),
            cert_fingerprint: Some("ab".repeat(20)),
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["name"], "announce");
        assert_eq!(json["url"], "https://lists.example.org/admindb");
        assert_eq!(json["password"], "hunter2");
        assert_eq!(json["overridecertname"], "lists.example.org");
        assert_eq!(json["whitelistedcert"], "ab".repeat(20));
    }

    #[test]
    fn optional_attributes_are_omitted_when_unset() {
        let config = ServerConfig::new("announce", "https://example.org/admindb", "pw");
        let json = serde_json::to_value(&config).unwrap();

        assert!(json.get("overridecertname").is_none());
        assert!(json.get("whitelistedcert").is_none());
    }

    #[test]
    fn deserializes_records_without_optional_attributes() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"name":"announce","url":"https://example.org/admindb","password":"pw"}"#,
        )
        .unwrap();

        assert_eq!(config.name, "announce");
        assert!(config.hostname_override.is_none());
        assert!(config.cert_fingerprint.is_none());
    }

    #[test]
    fn empty_strings_do_not_produce_a_custom_trust_policy() {
        let mut config = ServerConfig::new("a", "https://example.org/admindb", "pw");
        config.hostname_override = Some(String::new());
        config.cert_fingerprint = Some("  ".into());

        assert!(!config.trust_policy().is_custom());
    }
}
