//! Relying-party authentication flows.
//!
//! Route segments are validated into [`Protocol`] and policy handles, the
//! authorization request is built by [`build_redirect`], and the two callback
//! shapes (authorization code and SAML POST) both end in the same flat
//! [`AttributeMap`], which is stored client-side as a [`SessionArtifact`].

mod error;
pub mod policy;
mod protocol;
pub mod redirect;
pub mod saml;
pub mod session;
pub mod token;

use std::collections::BTreeMap;

pub use error::{AuthError, ErrorInfo, ErrorResponse};
pub use policy::{GROUPS_POLICY, contains_policy, list_policies, validate_policy};
pub use protocol::Protocol;
pub use redirect::{AuthorizationFlow, RedirectParams, build_redirect, callback_uri};
pub use saml::{SamlAttributes, SamlError, decode_saml_response, extract_attributes};
pub use session::{SessionArtifact, SessionCodec, SessionError, load_session, store_session};
pub use token::{UserData, complete_token_flow};

/// Flat attribute name to value mapping, identical for every protocol.
pub type AttributeMap = BTreeMap<String, String>;
