// Copyright (c) 2026 ledgerprop Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bearer credentials for the ledger JSON API.
//!
//! Tokens are JWT-shaped: `base64url(header).base64url(claims).signature`.
//! The claims object lives under [`LEDGER_API_CLAIM`] and names the ledger,
//! the application, and either the acting/reading parties or the admin flag.
//!
//! Unsigned (`alg: none`) tokens are only for test ledgers and are refused
//! unless the builder is constructed with test mode enabled.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const LEDGER_API_CLAIM: &str = "https://daml.com/ledger-api";

const ALG_NONE: &str = "none";
const ALG_HS256: &str = "HS256";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed party identifier: {0:?}")]
    MalformedParty(String),

    #[error("{field} must not be empty")]
    EmptyContext { field: &'static str },

    #[error("unsigned tokens require test mode")]
    UnsignedOutsideTestMode,

    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("token signature rejected")]
    BadSignature,

    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cannot encode token: {0}")]
    Encoding(String),
}

/// Claims carried under [`LEDGER_API_CLAIM`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerApiClaims {
    pub ledger_id: String,
    pub application_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act_as: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_as: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub admin: bool,
}

impl LedgerApiClaims {
    pub fn acting(&self) -> &[String] {
        self.act_as.as_deref().unwrap_or_default()
    }

    pub fn reading(&self) -> &[String] {
        self.read_as.as_deref().unwrap_or_default()
    }

    /// Parties that may read under these claims: `actAs` plus `readAs`.
    pub fn readers(&self) -> impl Iterator<Item = &str> {
        self.acting()
            .iter()
            .chain(self.reading().iter())
            .map(String::as_str)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize)]
struct ClaimsEnvelope {
    #[serde(rename = "https://daml.com/ledger-api")]
    claims: LedgerApiClaims,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Who a credential speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// Acts as at most one party and reads as any number. With neither set
    /// this is the anonymous profile.
    Standard {
        act_as: Option<String>,
        read_as: Vec<String>,
    },
    /// Privileged; only used for party allocation.
    Admin,
}

impl Profile {
    pub fn anonymous() -> Self {
        Self::Standard {
            act_as: None,
            read_as: Vec::new(),
        }
    }

    pub fn actor(party: impl Into<String>) -> Self {
        Self::Standard {
            act_as: Some(party.into()),
            read_as: Vec::new(),
        }
    }

    pub fn reader(parties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Standard {
            act_as: None,
            read_as: parties.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_parts(act_as: Option<&str>, read_as: &[String], admin: bool) -> Self {
        if admin {
            return Self::Admin;
        }
        Self::Standard {
            act_as: act_as.map(str::to_string),
            read_as: read_as.to_vec(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Standard { act_as: None, read_as } if read_as.is_empty())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Signing {
    /// `alg: none`, empty signature segment.
    Unsigned,
    /// HMAC-SHA256 with a shared secret.
    Hs256(Vec<u8>),
}

impl fmt::Debug for Signing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned => f.write_str("Unsigned"),
            Self::Hs256(_) => f.write_str("Hs256(<redacted>)"),
        }
    }
}

/// A ready-to-send bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    profile: Profile,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct TokenBuilder {
    ledger_id: String,
    application_id: String,
    signing: Signing,
}

impl TokenBuilder {
    pub fn new(
        ledger_id: impl Into<String>,
        application_id: impl Into<String>,
        signing: Signing,
        test_mode: bool,
    ) -> Result<Self, AuthError> {
        let ledger_id = ledger_id.into();
        let application_id = application_id.into();
        if ledger_id.is_empty() {
            return Err(AuthError::EmptyContext { field: "ledgerId" });
        }
        if application_id.is_empty() {
            return Err(AuthError::EmptyContext {
                field: "applicationId",
            });
        }
        if signing == Signing::Unsigned && !test_mode {
            return Err(AuthError::UnsignedOutsideTestMode);
        }
        Ok(Self {
            ledger_id,
            application_id,
            signing,
        })
    }

    pub fn claims(&self, profile: &Profile) -> Result<LedgerApiClaims, AuthError> {
        match profile {
            Profile::Admin => Ok(LedgerApiClaims {
                ledger_id: self.ledger_id.clone(),
                application_id: self.application_id.clone(),
                act_as: None,
                read_as: None,
                admin: true,
            }),
            Profile::Standard { act_as, read_as } => {
                if let Some(party) = act_as {
                    validate_party(party)?;
                }
                for party in read_as {
                    validate_party(party)?;
                }
                Ok(LedgerApiClaims {
                    ledger_id: self.ledger_id.clone(),
                    application_id: self.application_id.clone(),
                    act_as: Some(act_as.iter().cloned().collect()),
                    read_as: Some(read_as.clone()),
                    admin: false,
                })
            }
        }
    }

    pub fn token(&self, profile: &Profile) -> Result<String, AuthError> {
        let claims = self.claims(profile)?;
        encode_token(&claims, &self.signing)
    }

    pub fn credential(&self, profile: Profile) -> Result<Credential, AuthError> {
        let token = self.token(&profile)?;
        Ok(Credential { token, profile })
    }
}

/// Rejects identifiers that no ledger would have issued: empty strings and
/// anything with whitespace or control characters.
pub fn validate_party(party: &str) -> Result<(), AuthError> {
    if party.is_empty()
        || party
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AuthError::MalformedParty(party.to_string()));
    }
    Ok(())
}

pub fn encode_token(claims: &LedgerApiClaims, signing: &Signing) -> Result<String, AuthError> {
    let alg = match signing {
        Signing::Unsigned => ALG_NONE,
        Signing::Hs256(_) => ALG_HS256,
    };
    let header = TokenHeader {
        alg: alg.to_string(),
        typ: "JWT".to_string(),
    };
    let envelope = ClaimsEnvelope {
        claims: claims.clone(),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|err| AuthError::Encoding(err.to_string()))?;
    let claims_json =
        serde_json::to_vec(&envelope).map_err(|err| AuthError::Encoding(err.to_string()))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = match signing {
        Signing::Unsigned => String::new(),
        Signing::Hs256(secret) => {
            URL_SAFE_NO_PAD.encode(hmac_sha256(secret, signing_input.as_bytes()))
        }
    };
    Ok(format!("{signing_input}.{signature}"))
}

/// Parses a token back into its claims.
///
/// With a `secret`, only HS256 tokens carrying a valid signature are accepted.
/// Without one, the signature segment is not checked.
pub fn decode_claims(token: &str, secret: Option<&[u8]>) -> Result<LedgerApiClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::MalformedToken("expected three segments"));
    };

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::MalformedToken("header is not base64url"))?;
    let header: TokenHeader = serde_json::from_slice(&header_json)
        .map_err(|_| AuthError::MalformedToken("header is not a JWT header"))?;

    match (header.alg.as_str(), secret) {
        (ALG_HS256, Some(secret)) => {
            let provided = URL_SAFE_NO_PAD
                .decode(signature_b64)
                .map_err(|_| AuthError::BadSignature)?;
            let signing_input = format!("{header_b64}.{claims_b64}");
            let expected = hmac_sha256(secret, signing_input.as_bytes());
            if !constant_time_eq(&expected, &provided) {
                return Err(AuthError::BadSignature);
            }
        }
        (ALG_NONE, Some(_)) => return Err(AuthError::BadSignature),
        (ALG_NONE | ALG_HS256, None) => {}
        (other, _) => return Err(AuthError::UnsupportedAlgorithm(other.to_string())),
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| AuthError::MalformedToken("claims are not base64url"))?;
    let envelope: ClaimsEnvelope = serde_json::from_slice(&claims_json)
        .map_err(|_| AuthError::MalformedToken("missing ledger-api claims"))?;
    Ok(envelope.claims)
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;
    let mut key_block = [0u8; BLOCK_SIZE];
    if secret.len() > BLOCK_SIZE {
        let digest = Sha256::digest(secret);
        key_block[..digest.len()].copy_from_slice(&digest);
    } else {
        key_block[..secret.len()].copy_from_slice(secret);
    }

    let mut o_key_pad = [0u8; BLOCK_SIZE];
    let mut i_key_pad = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        o_key_pad[i] = key_block[i] ^ 0x5c;
        i_key_pad[i] = key_block[i] ^ 0x36;
    }

    let mut inner = Sha256::new();
    inner.update(i_key_pad);
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(o_key_pad);
    outer.update(inner_hash);
    outer.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_builder() -> TokenBuilder {
        TokenBuilder::new("sandbox", "pbt-tests", Signing::Unsigned, true).unwrap()
    }

    #[test]
    fn unsigned_builder_requires_test_mode() {
        let err = TokenBuilder::new("sandbox", "pbt-tests", Signing::Unsigned, false)
            .expect_err("unsigned outside test mode must fail");
        assert_eq!(err, AuthError::UnsignedOutsideTestMode);
    }

    #[test]
    fn signed_builder_works_without_test_mode() {
        let builder =
            TokenBuilder::new("sandbox", "pbt-tests", Signing::Hs256(b"k".to_vec()), false)
                .expect("hs256 builder");
        let token = builder.token(&Profile::actor("Alice")).unwrap();
        assert!(!token.ends_with('.'));
    }

    #[test]
    fn empty_ledger_id_rejected() {
        let err = TokenBuilder::new("", "pbt-tests", Signing::Unsigned, true).unwrap_err();
        assert_eq!(err, AuthError::EmptyContext { field: "ledgerId" });
    }

    #[test]
    fn unsigned_token_has_empty_signature_segment() {
        let token = test_builder().token(&Profile::actor("Alice")).unwrap();
        assert!(token.ends_with('.'));
        assert_eq!(token.matches('.').count(), 2);
    }

    #[test]
    fn admin_claims_carry_only_the_admin_flag() {
        let claims = test_builder().claims(&Profile::Admin).unwrap();
        assert!(claims.admin);
        assert!(claims.act_as.is_none());
        assert!(claims.read_as.is_none());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["admin"], true);
        assert!(json.get("actAs").is_none());
    }

    #[test]
    fn anonymous_claims_have_empty_party_lists() {
        let profile = Profile::anonymous();
        assert!(profile.is_anonymous());
        let claims = test_builder().claims(&profile).unwrap();
        assert_eq!(claims.act_as, Some(vec![]));
        assert_eq!(claims.read_as, Some(vec![]));
        assert!(!claims.admin);
    }

    #[test]
    fn malformed_party_rejected() {
        for bad in ["", "Ali ce", "Bob\n", "\u{7}"] {
            let err = test_builder().token(&Profile::actor(bad)).unwrap_err();
            assert_eq!(err, AuthError::MalformedParty(bad.to_string()));
        }
        let err = test_builder()
            .token(&Profile::reader(["ok", " "]))
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedParty(_)));
    }

    #[test]
    fn from_parts_prefers_admin() {
        assert_eq!(
            Profile::from_parts(Some("Alice"), &[], true),
            Profile::Admin
        );
        assert_eq!(
            Profile::from_parts(Some("Alice"), &["Bob".to_string()], false),
            Profile::Standard {
                act_as: Some("Alice".to_string()),
                read_as: vec!["Bob".to_string()],
            }
        );
    }

    #[test]
    fn encoded_token_carries_header_and_claims() {
        let claims = test_builder().claims(&Profile::actor("Alice")).unwrap();
        let signing = Signing::Hs256(b"k".to_vec());
        let token = encode_token(&claims, &signing).expect("token encodes");

        let header = token.split('.').next().unwrap();
        let header: TokenHeader =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(header.alg, ALG_HS256);
        assert_eq!(decode_claims(&token, Some(b"k")).unwrap(), claims);
    }

    #[test]
    fn decode_rejects_wrong_secret() {
        let builder =
            TokenBuilder::new("sandbox", "pbt-tests", Signing::Hs256(b"right".to_vec()), false)
                .unwrap();
        let token = builder.token(&Profile::actor("Alice")).unwrap();
        assert_eq!(
            decode_claims(&token, Some(b"wrong")).unwrap_err(),
            AuthError::BadSignature
        );
        assert!(decode_claims(&token, Some(b"right")).is_ok());
    }

    #[test]
    fn decode_rejects_unsigned_when_secret_required() {
        let token = test_builder().token(&Profile::actor("Alice")).unwrap();
        assert_eq!(
            decode_claims(&token, Some(b"secret")).unwrap_err(),
            AuthError::BadSignature
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_claims("not-a-token", None),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            decode_claims("a.b.c.d", None),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn credential_debug_hides_token() {
        let cred = test_builder().credential(Profile::actor("Alice")).unwrap();
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains(cred.token()));
        assert!(cred.header_value().starts_with("Bearer "));
    }

    proptest! {
        #[test]
        fn identical_inputs_build_identical_tokens(
            act in proptest::option::of("[A-Za-z0-9:_-]{1,24}"),
            reads in prop::collection::vec("[A-Za-z0-9:_-]{1,24}", 0..4),
        ) {
            let builder = test_builder();
            let profile = Profile::from_parts(act.as_deref(), &reads, false);
            let first = builder.token(&profile).unwrap();
            let second = builder.token(&profile).unwrap();
            prop_assert_eq!(&first, &second);

            let claims = decode_claims(&first, None).unwrap();
            prop_assert_eq!(claims.acting().to_vec(), act.into_iter().collect::<Vec<_>>());
            prop_assert_eq!(claims.reading(), reads.as_slice());
        }
    }
}
