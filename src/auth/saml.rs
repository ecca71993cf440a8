//! SAML callback: decode a posted `SAMLResponse` and read its attributes.
//!
//! Assertion signatures are not verified. Elements are matched by local
//! name, so any namespace prefix is accepted.

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use serde_json::Value;

use super::{AttributeMap, UserData};

#[derive(Debug, thiserror::Error)]
pub enum SamlError {
    #[error("SAMLResponse is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("SAMLResponse is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed SAML XML: {0}")]
    Xml(String),

    #[error("no Assertion element found in SAML response")]
    AssertionNotFound,
}

/// Attributes read from the first assertion of a SAML response.
#[derive(Debug, Clone, PartialEq)]
pub struct SamlAttributes {
    /// The assertion's `Attribute` elements as XML, joined with `,`.
    pub raw_payload: String,
    pub attributes: AttributeMap,
}

impl From<SamlAttributes> for UserData {
    fn from(saml: SamlAttributes) -> Self {
        UserData {
            raw_payload: Value::String(saml.raw_payload),
            attributes: saml.attributes,
        }
    }
}

/// Standard alphabet, padding optional.
const SAML_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the base64 form field into the response XML.
///
/// Line breaks and other whitespace inside the encoded value are ignored.
pub fn decode_saml_response(encoded: &str) -> Result<String, SamlError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = SAML_BASE64.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

/// An `Attribute` element currently being read.
struct OpenAttribute {
    name: Option<String>,
    depth: usize,
    start: usize,
}

/// Collect `Name -> AttributeValue` pairs from the first `Assertion` in `xml`.
///
/// Only `AttributeValue` elements that are direct children of an `Attribute`
/// count, and an attribute with several values keeps the last one. Attributes
/// without a `Name` are skipped.
pub fn extract_attributes(xml: &str) -> Result<SamlAttributes, SamlError> {
    let mut reader = Reader::from_str(xml);

    let mut depth = 0usize;
    let mut assertion_depth: Option<usize> = None;
    let mut open: Option<OpenAttribute> = None;
    let mut value: Option<String> = None;
    let mut attributes = AttributeMap::new();
    let mut fragments: Vec<&str> = Vec::new();

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| SamlError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"Assertion" if assertion_depth.is_none() => assertion_depth = Some(depth),
                    b"Attribute" if assertion_depth.is_some() && open.is_none() => {
                        open = Some(OpenAttribute {
                            name: name_attribute(&e)?,
                            depth,
                            start,
                        });
                    }
                    b"AttributeValue"
                        if open.as_ref().is_some_and(|a| depth == a.depth + 1) =>
                    {
                        value = Some(String::new());
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"Assertion" if assertion_depth.is_none() => {
                    assertion_depth = Some(depth + 1);
                    break;
                }
                b"Attribute" if assertion_depth.is_some() && open.is_none() => {
                    let end = reader.buffer_position() as usize;
                    fragments.extend(xml.get(start..end));
                }
                b"AttributeValue" => {
                    if let Some(OpenAttribute {
                        name: Some(name),
                        depth: attr_depth,
                        ..
                    }) = &open
                        && *attr_depth == depth
                    {
                        attributes.insert(name.clone(), String::new());
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(v) = value.as_mut() {
                    let text = t.unescape().map_err(|e| SamlError::Xml(e.to_string()))?;
                    v.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(v) = value.as_mut() {
                    v.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                let attr_depth = open.as_ref().map(|a| a.depth);

                if local.as_ref() == b"AttributeValue" && attr_depth.is_some_and(|d| depth == d + 1)
                {
                    if let (Some(text), Some(OpenAttribute { name: Some(name), .. })) =
                        (value.take(), &open)
                    {
                        attributes.insert(name.clone(), text);
                    }
                } else if local.as_ref() == b"Attribute" && attr_depth == Some(depth) {
                    if let Some(attr) = open.take() {
                        let end = reader.buffer_position() as usize;
                        fragments.extend(xml.get(attr.start..end));
                    }
                } else if local.as_ref() == b"Assertion" && assertion_depth == Some(depth) {
                    break;
                }

                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if assertion_depth.is_none() {
        return Err(SamlError::AssertionNotFound);
    }

    Ok(SamlAttributes {
        raw_payload: fragments.join(","),
        attributes,
    })
}

fn name_attribute(element: &BytesStart<'_>) -> Result<Option<String>, SamlError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SamlError::Xml(e.to_string()))?;
        if attr.key.as_ref() == b"Name" {
            let value = attr
                .unescape_value()
                .map_err(|e| SamlError::Xml(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
