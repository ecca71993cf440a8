use std::{fmt, str::FromStr};

use super::AuthError;
use crate::provider::DataEndpoint;

/// Federated authentication protocol selected by the `{protocol}` route segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    OAuth,
    Oidc,
    Saml,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::OAuth, Protocol::Oidc, Protocol::Saml];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::OAuth => "oauth",
            Protocol::Oidc => "oidc",
            Protocol::Saml => "saml",
        }
    }

    /// User data resource read after the token exchange.
    pub fn data_endpoint(&self) -> DataEndpoint {
        match self {
            Protocol::Oidc => DataEndpoint::UserInfo,
            Protocol::OAuth | Protocol::Saml => DataEndpoint::Attributes,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth" => Ok(Protocol::OAuth),
            "oidc" => Ok(Protocol::Oidc),
            "saml" => Ok(Protocol::Saml),
            other => Err(AuthError::UnknownProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("oauth", Protocol::OAuth, DataEndpoint::Attributes)]
    #[case("oidc", Protocol::Oidc, DataEndpoint::UserInfo)]
    #[case("saml", Protocol::Saml, DataEndpoint::Attributes)]
    fn test_parse_known(#[case] raw: &str, #[case] protocol: Protocol, #[case] data: DataEndpoint) {
        let parsed: Protocol = raw.parse().unwrap();
        assert_eq!(parsed, protocol);
        assert_eq!(parsed.as_str(), raw);
        assert_eq!(parsed.data_endpoint(), data);
    }

    #[rstest]
    #[case("OAUTH")]
    #[case("oauth2")]
    #[case("ws-fed")]
    fn test_parse_unknown(#[case] raw: &str) {
        let err = raw.parse::<Protocol>().unwrap_err();
        assert!(matches!(err, AuthError::UnknownProtocol(p) if p == raw));
    }
}
