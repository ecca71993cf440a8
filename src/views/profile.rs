use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};

use crate::auth::SessionArtifact;

/// Display model for the profile page.
///
/// Missing attributes render as empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileView {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub zip: String,
    pub uuid: String,
    /// Every attribute, in name order.
    pub attributes: Vec<(String, String)>,
    pub payload: String,
}

pub fn present(artifact: &SessionArtifact) -> ProfileView {
    let field = |name: &str| artifact.attributes.get(name).cloned().unwrap_or_default();

    ProfileView {
        fname: field("fname"),
        lname: field("lname"),
        email: field("email"),
        zip: field("zip"),
        uuid: field("uuid"),
        attributes: artifact
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        payload: format_payload(&artifact.raw_payload),
    }
}

/// Structured payloads are pretty-printed with a four-space indent; strings
/// pass through unchanged.
pub fn format_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            let mut buf = Vec::new();
            let mut serializer =
                serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
            match payload.serialize(&mut serializer) {
                Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| payload.to_string()),
                Err(_) => payload.to_string(),
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::auth::AttributeMap;

    fn artifact(attributes: AttributeMap, raw_payload: Value) -> SessionArtifact {
        SessionArtifact {
            raw_payload,
            attributes,
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_zip_is_empty() {
        let view = present(&artifact(
            AttributeMap::from([
                ("fname".into(), "Jane".into()),
                ("email".into(), "jane@example.com".into()),
            ]),
            Value::Null,
        ));

        assert_eq!(view.fname, "Jane");
        assert_eq!(view.email, "jane@example.com");
        assert_eq!(view.zip, "");
        assert_eq!(view.uuid, "");
        assert_eq!(view.attributes.len(), 2);
    }

    #[test]
    fn test_object_payload_pretty_printed() {
        let formatted = format_payload(&json!({"attributes": [{"handle": "fname"}]}));
        assert_eq!(
            formatted,
            "{\n    \"attributes\": [\n        {\n            \"handle\": \"fname\"\n        }\n    ]\n}"
        );
    }

    #[test]
    fn test_string_payload_passed_through() {
        let xml = r#"<Attribute Name="fname"><AttributeValue>Jane</AttributeValue></Attribute>"#;
        assert_eq!(format_payload(&Value::String(xml.into())), xml);
        assert_eq!(format_payload(&Value::Null), "");
    }
}
