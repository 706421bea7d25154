//! Connect JWT decoding, verification, and signing.
//!
//! Inbound validation is split into two pure passes: [`decode_unverified_issuer`] reads the `iss`
//! claim so the caller can resolve the tenant secret, then [`verify_and_decode`] re-parses the
//! token enforcing the HMAC signature. Expiry is checked by the caller through
//! [`InboundClaims::is_expired_at`] because `exp == 0` means "never expires" on this protocol.

pub mod qsh;

pub use qsh::CanonicalRequest;

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind,
};
// self
use crate::{
	_prelude::*,
	auth::{SharedSecret, TenantKey},
	error::ConfigError,
};

/// Lifetime of outbound shared-secret tokens.
pub const OUTBOUND_TOKEN_TTL: Duration = Duration::minutes(3);

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims carried by host-issued request tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundClaims {
	/// Tenant client key.
	#[serde(rename = "iss", default)]
	pub issuer: String,
	/// Audience, when the host sets one.
	#[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
	pub audience: Option<String>,
	/// Expiry in epoch seconds; `0` disables expiry checks.
	#[serde(rename = "exp", default, skip_serializing_if = "is_zero")]
	pub expires_at: i64,
	/// Issued-at in epoch seconds.
	#[serde(rename = "iat", default, skip_serializing_if = "is_zero")]
	pub issued_at: i64,
	/// Query-string hash binding the token to one request.
	#[serde(rename = "qsh", default, skip_serializing_if = "String::is_empty")]
	pub query_string_hash: String,
}
impl InboundClaims {
	/// Returns `true` when `exp` is set and `instant` lies after it.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at != 0 && instant.unix_timestamp() > self.expires_at
	}
}

/// Claims attached to every outbound shared-secret request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestClaims {
	/// Add-on key.
	pub iss: String,
	/// Issued-at in epoch seconds.
	pub iat: i64,
	/// Expiry in epoch seconds.
	pub exp: i64,
	/// Query-string hash of the signed request.
	pub qsh: String,
}
impl RequestClaims {
	/// Builds claims for `request`, issued at `now` and valid for [`OUTBOUND_TOKEN_TTL`].
	pub fn new(issuer: impl Into<String>, request: &CanonicalRequest, now: OffsetDateTime) -> Self {
		Self {
			iss: issuer.into(),
			iat: now.unix_timestamp(),
			exp: (now + OUTBOUND_TOKEN_TTL).unix_timestamp(),
			qsh: request.hash(),
		}
	}
}

/// Claims of the assertion posted to the authorization server for the JWT-bearer grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// `urn:atlassian:connect:clientid:<oauth client id>`.
	pub iss: String,
	/// `urn:atlassian:connect:useraccountid:<account id>`.
	pub sub: String,
	/// Tenant base URL.
	pub tnt: String,
	/// Authorization server base URL.
	pub aud: String,
	/// Issued-at in epoch seconds.
	pub iat: i64,
	/// Expiry in epoch seconds.
	pub exp: i64,
}

/// Reads the `iss` claim without checking the signature.
///
/// Only use the result to look up the secret for [`verify_and_decode`].
pub fn decode_unverified_issuer(token: &str) -> Result<TenantKey> {
	let data = jsonwebtoken::dangerous::insecure_decode::<InboundClaims>(token)
		.map_err(|e| Error::MalformedToken { reason: e.to_string() })?;

	TenantKey::new(&data.claims.issuer)
		.map_err(|e| Error::MalformedToken { reason: format!("issuer claim is unusable: {e}") })
}

/// Parses `token` enforcing its HMAC signature against `secret`.
pub fn verify_and_decode(token: &str, secret: &SharedSecret) -> Result<InboundClaims> {
	let validation = lenient_validation();
	let key = DecodingKey::from_secret(secret.expose().as_bytes());

	jsonwebtoken::decode::<InboundClaims>(token, &key, &validation).map(|data| data.claims).map_err(
		|e| match e.kind() {
			JwtErrorKind::InvalidToken
			| JwtErrorKind::Base64(_)
			| JwtErrorKind::Json(_)
			| JwtErrorKind::Utf8(_) => Error::MalformedToken { reason: e.to_string() },
			_ => Error::SignatureInvalid { reason: e.to_string() },
		},
	)
}

/// Signs arbitrary claims with HS256 using `secret`.
pub fn sign_claims<T>(claims: &T, secret: &SharedSecret) -> Result<String>
where
	T: Serialize,
{
	let key = EncodingKey::from_secret(secret.expose().as_bytes());

	jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key)
		.map_err(|source| ConfigError::Signing { source }.into())
}

/// Produces the `Authorization: JWT` token for an outbound request.
pub fn sign_request(
	issuer: &str,
	secret: &SharedSecret,
	request: &CanonicalRequest,
	now: OffsetDateTime,
) -> Result<String> {
	sign_claims(&RequestClaims::new(issuer, request, now), secret)
}

// Signature, expiry, and audience are all handled explicitly by the callers.
fn lenient_validation() -> Validation {
	let mut validation = Validation::new(Algorithm::HS256);

	validation.algorithms = HMAC_ALGORITHMS.to_vec();
	validation.required_spec_claims.clear();
	validation.validate_exp = false;
	validation.validate_nbf = false;
	validation.validate_aud = false;

	validation
}

fn is_zero(value: &i64) -> bool {
	*value == 0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn token_for(issuer: &str, secret: &str, expires_at: i64) -> String {
		let claims = InboundClaims {
			issuer: issuer.into(),
			expires_at,
			issued_at: 1_700_000_000,
			query_string_hash: "abc".into(),
			..Default::default()
		};

		sign_claims(&claims, &SharedSecret::new(secret)).expect("Fixture token should sign.")
	}

	#[test]
	fn unverified_issuer_ignores_signature() {
		let token = token_for("tenant-1", "any-secret", 0);
		let issuer = decode_unverified_issuer(&token).expect("Issuer should decode.");

		assert_eq!(issuer.as_ref(), "tenant-1");
	}

	#[test]
	fn unverified_issuer_rejects_garbage_and_missing_issuer() {
		assert!(matches!(
			decode_unverified_issuer("not-a-token"),
			Err(Error::MalformedToken { .. })
		));
		assert!(matches!(
			decode_unverified_issuer(&token_for("", "secret", 0)),
			Err(Error::MalformedToken { .. })
		));
	}

	#[test]
	fn verification_requires_matching_secret() {
		let token = token_for("tenant-1", "s3cr3t", 0);
		let claims =
			verify_and_decode(&token, &SharedSecret::new("s3cr3t")).expect("Signature should match.");

		assert_eq!(claims.issuer, "tenant-1");
		assert_eq!(claims.query_string_hash, "abc");
		assert!(matches!(
			verify_and_decode(&token, &SharedSecret::new("wrong")),
			Err(Error::SignatureInvalid { .. })
		));
	}

	#[test]
	fn zero_expiry_never_expires() {
		let far_future = OffsetDateTime::now_utc() + Duration::days(365 * 50);
		let claims = InboundClaims { expires_at: 0, ..Default::default() };
		let expiring = InboundClaims { expires_at: 1_700_000_000, ..Default::default() };

		assert!(!claims.is_expired_at(far_future));
		assert!(expiring.is_expired_at(far_future));
		assert!(!expiring.is_expired_at(time::macros::datetime!(2023-11-14 22:13:20 UTC)));
	}

	#[test]
	fn request_token_carries_qsh_and_three_minute_lifetime() {
		let canonical = CanonicalRequest::new("GET", "/rest/api/2/myself", None, "");
		let now = time::macros::datetime!(2025-01-01 00:00 UTC);
		let secret = SharedSecret::new("s3cr3t");
		let token = sign_request("io.example.addon", &secret, &canonical, now)
			.expect("Request token should sign.");
		let mut validation = lenient_validation();

		validation.algorithms = vec![Algorithm::HS256];

		let decoded = jsonwebtoken::decode::<RequestClaims>(
			&token,
			&DecodingKey::from_secret(b"s3cr3t"),
			&validation,
		)
		.expect("Request token should verify.")
		.claims;

		assert_eq!(decoded.iss, "io.example.addon");
		assert_eq!(decoded.qsh, canonical.hash());
		assert_eq!(decoded.exp - decoded.iat, 180);
	}
}
