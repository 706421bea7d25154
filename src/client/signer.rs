//! Authorization strategies attached to every outbound host request.

// crates.io
use oauth2::{
	HttpRequest,
	http::{HeaderValue, header::AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::SharedSecret,
	error::ConfigError,
	jwt::{self, CanonicalRequest},
	oauth::ImpersonationToken,
};

/// Attaches authorization state to a fully built request.
///
/// `base_url` is the tenant base the request targets; signers that hash the request path use it
/// to compute the path relative to the tenant.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Mutates `request` in place, usually by setting the `Authorization` header.
	fn sign(&self, request: &mut HttpRequest, base_url: &Url) -> Result<()>;
}

/// Signs each request with a fresh shared-secret token carrying its query-string hash.
#[derive(Clone, Debug)]
pub struct SharedSecretSigner {
	issuer: String,
	secret: SharedSecret,
}
impl SharedSecretSigner {
	/// Creates a signer issuing tokens as `issuer`.
	pub fn new(issuer: impl Into<String>, secret: SharedSecret) -> Self {
		Self { issuer: issuer.into(), secret }
	}

	/// Issuer claim written into every token.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}
}
impl RequestSigner for SharedSecretSigner {
	fn sign(&self, request: &mut HttpRequest, base_url: &Url) -> Result<()> {
		let target = request.uri();
		let canonical = CanonicalRequest::new(
			request.method().as_str(),
			target.path(),
			target.query(),
			base_url.path(),
		);
		let token = jwt::sign_request(&self.issuer, &self.secret, &canonical, OffsetDateTime::now_utc())?;
		let value = HeaderValue::from_str(&format!("JWT {token}")).map_err(ConfigError::from)?;

		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Presents a negotiated impersonation token as `Authorization: Bearer`.
#[derive(Clone, Debug)]
pub struct BearerSigner {
	token: ImpersonationToken,
}
impl BearerSigner {
	/// Wraps a negotiated token.
	pub fn new(token: ImpersonationToken) -> Self {
		Self { token }
	}

	/// Token presented on every request.
	pub fn token(&self) -> &ImpersonationToken {
		&self.token
	}
}
impl RequestSigner for BearerSigner {
	fn sign(&self, request: &mut HttpRequest, _base_url: &Url) -> Result<()> {
		let mut value =
			HeaderValue::from_str(&format!("Bearer {}", self.token.access_token.expose()))
				.map_err(ConfigError::from)?;

		value.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, value);

		Ok(())
	}
}

#[derive(Clone, Debug)]
pub(crate) enum ClientSigner {
	SharedSecret(SharedSecretSigner),
	Bearer(BearerSigner),
}
impl ClientSigner {
	pub(crate) fn token(&self) -> Option<&ImpersonationToken> {
		match self {
			Self::SharedSecret(_) => None,
			Self::Bearer(signer) => Some(signer.token()),
		}
	}
}
impl RequestSigner for ClientSigner {
	fn sign(&self, request: &mut HttpRequest, base_url: &Url) -> Result<()> {
		match self {
			Self::SharedSecret(signer) => signer.sign(request, base_url),
			Self::Bearer(signer) => signer.sign(request, base_url),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{Algorithm, DecodingKey, Validation};
	// self
	use super::*;
	use crate::{auth::AccessToken, jwt::RequestClaims};

	fn request(uri: &str) -> HttpRequest {
		oauth2::http::Request::builder()
			.method("GET")
			.uri(uri)
			.body(Vec::new())
			.expect("Request fixture should build.")
	}

	#[test]
	fn shared_secret_signer_hashes_path_relative_to_base() {
		let base = Url::parse("https://example.atlassian.net/wiki").expect("Base URL should parse.");
		let signer = SharedSecretSigner::new("io.example.addon", SharedSecret::new("s3cr3t"));
		let mut request =
			request("https://example.atlassian.net/wiki/rest/api/space?limit=5&start=0");

		signer.sign(&mut request, &base).expect("Signing should succeed.");

		let header = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.expect("Authorization header should be set.");
		let token = header.strip_prefix("JWT ").expect("Header should use the JWT scheme.");
		let claims = jsonwebtoken::decode::<RequestClaims>(
			token,
			&DecodingKey::from_secret(b"s3cr3t"),
			&Validation::new(Algorithm::HS256),
		)
		.expect("Outbound token should verify.")
		.claims;
		let expected = CanonicalRequest::new("GET", "/rest/api/space", Some("limit=5&start=0"), "");

		assert_eq!(claims.iss, "io.example.addon");
		assert_eq!(claims.qsh, expected.hash());
	}

	#[test]
	fn bearer_signer_sets_sensitive_header() {
		let now = OffsetDateTime::now_utc();
		let signer = BearerSigner::new(ImpersonationToken {
			access_token: AccessToken::new("user-token"),
			issued_at: now,
			expires_at: now + Duration::seconds(60),
		});
		let base = Url::parse("https://example.atlassian.net").expect("Base URL should parse.");
		let mut request = request("https://example.atlassian.net/rest/api/2/myself");

		signer.sign(&mut request, &base).expect("Signing should succeed.");

		let value = request.headers().get(AUTHORIZATION).expect("Authorization header should be set.");

		assert_eq!(value.to_str().expect("Header should be ASCII."), "Bearer user-token");
		assert!(value.is_sensitive());
	}
}
