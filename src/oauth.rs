//! JWT-bearer token exchange against the Atlassian authorization server.
//!
//! The add-on proves its identity with an assertion signed by the tenant shared secret and
//! receives a short-lived bearer token scoped to one user account. Responses are parsed with the
//! `oauth2` crate's basic token and error shapes; transport failures go through a
//! [`TransportErrorMapper`] so custom HTTP stacks can classify their own errors.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, TokenResponse,
	basic::{BasicErrorResponse, BasicTokenResponse},
	http::{
		Method,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, TenantCredentials, UserAccountId},
	error::{ConfigError, ExchangeError, TransportError},
	http::{ConnectHttpClient, ResponseMetadata, ResponseMetadataSlot},
	jwt::{self, AssertionClaims},
};

/// Grant type sent with every impersonation exchange.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Production authorization server.
pub const DEFAULT_AUTHORIZATION_SERVER: &str =
	"https://oauth-2-authorization-server.services.atlassian.com";
/// Token endpoint path on the authorization server.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth2/token";

const CLIENT_ID_CLAIM_PREFIX: &str = "urn:atlassian:connect:clientid:";
const USER_ACCOUNT_CLAIM_PREFIX: &str = "urn:atlassian:connect:useraccountid:";
const ASSERTION_TTL: Duration = Duration::seconds(59);
const FALLBACK_TOKEN_TTL: Duration = Duration::seconds(60);

/// Maps HTTP transport failures into [`TransportError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> TransportError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => TransportError::Http(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) => TransportError::Other { message },
			_ => TransportError::Other { message: "unclassified transport failure".into() },
		}
	}
}

/// Location of the token endpoint used for impersonation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationServer {
	base_url: String,
	token_path: String,
}
impl AuthorizationServer {
	/// Targets `base_url` with the default token path.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self { base_url: base_url.into(), token_path: DEFAULT_TOKEN_PATH.into() }
	}

	/// Overrides the token endpoint path.
	pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
		self.token_path = token_path.into();

		self
	}

	/// Base URL, also used as the assertion audience.
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Resolves the absolute token endpoint.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		let joined = format!(
			"{}/{}",
			self.base_url.trim_end_matches('/'),
			self.token_path.trim_start_matches('/')
		);

		Url::parse(&joined).map_err(|source| ConfigError::InvalidAuthorizationServer { source })
	}
}
impl Default for AuthorizationServer {
	fn default() -> Self {
		Self::new(DEFAULT_AUTHORIZATION_SERVER)
	}
}

/// Bearer token negotiated for one user on one tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImpersonationToken {
	/// Access token presented as `Authorization: Bearer`.
	pub access_token: AccessToken,
	/// Instant the token was received.
	pub issued_at: OffsetDateTime,
	/// Instant the authorization server stops honoring the token.
	pub expires_at: OffsetDateTime,
}
impl ImpersonationToken {
	/// Returns `true` when the token stays valid for at least `leeway` past `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, leeway: Duration) -> bool {
		now + leeway < self.expires_at
	}
}

/// Builds the signed assertion for `user` on the tenant described by `credentials`.
pub fn build_assertion(
	server: &AuthorizationServer,
	credentials: &TenantCredentials,
	user: &UserAccountId,
	now: OffsetDateTime,
) -> Result<String> {
	let claims = AssertionClaims {
		iss: format!("{CLIENT_ID_CLAIM_PREFIX}{}", credentials.oauth_client_id),
		sub: format!("{USER_ACCOUNT_CLAIM_PREFIX}{user}"),
		tnt: credentials.base_url.clone(),
		aud: server.base_url().to_owned(),
		iat: now.unix_timestamp(),
		exp: (now + ASSERTION_TTL).unix_timestamp(),
	};

	jwt::sign_claims(&claims, &credentials.shared_secret)
}

/// Exchanges a signed assertion for an access token acting as `user`.
pub async fn exchange_jwt_bearer<C, M>(
	http_client: &C,
	mapper: &M,
	server: &AuthorizationServer,
	credentials: &TenantCredentials,
	user: &UserAccountId,
	scopes: &ScopeSet,
) -> Result<ImpersonationToken, ExchangeError>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let now = OffsetDateTime::now_utc();
	let assertion = build_assertion(server, credentials, user, now).map_err(|e| match e {
		Error::Config(config) => ExchangeError::Config(config),
		other => ExchangeError::Unexpected {
			message: other.to_string(),
			status: None,
			retry_after: None,
		},
	})?;
	let request = token_request(&server.token_url()?, &assertion, scopes)?;
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());
	let response = handle.call(request).await.map_err(|err| {
		ExchangeError::Transport(mapper.map_transport_error(slot.take().as_ref(), err))
	})?;

	parse_token_response(&response, slot.take().as_ref(), now)
}

fn token_request(
	token_url: &Url,
	assertion: &str,
	scopes: &ScopeSet,
) -> Result<HttpRequest, ConfigError> {
	let mut form = url::form_urlencoded::Serializer::new(String::new());

	form.append_pair("grant_type", JWT_BEARER_GRANT).append_pair("assertion", assertion);

	if !scopes.is_empty() {
		form.append_pair("scope", &scopes.joined().to_ascii_uppercase());
	}

	let request = oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(token_url.as_str())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json")
		.body(form.finish().into_bytes())?;

	Ok(request)
}

fn parse_token_response(
	response: &HttpResponse,
	meta: Option<&ResponseMetadata>,
	issued_at: OffsetDateTime,
) -> Result<ImpersonationToken, ExchangeError> {
	let status = response.status();
	let status_code = Some(status.as_u16());

	if !status.is_success() {
		if let Ok(error) = serde_json::from_slice::<BasicErrorResponse>(response.body()) {
			let message = error
				.error_description()
				.cloned()
				.unwrap_or_else(|| error.error().as_ref().to_owned());

			return Err(ExchangeError::Rejected {
				error: error.error().as_ref().to_owned(),
				message,
				status: status_code,
			});
		}

		return Err(ExchangeError::Unexpected {
			message: format!("status {status}"),
			status: status_code,
			retry_after: meta.and_then(|m| m.retry_after),
		});
	}

	let mut deserializer = serde_json::Deserializer::from_slice(response.body());
	let token: BasicTokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ExchangeError::Parse { source, status: status_code })?;
	let ttl = token
		.expires_in()
		.and_then(|ttl| i64::try_from(ttl.as_secs()).ok())
		.filter(|secs| *secs > 0)
		.map(Duration::seconds)
		.unwrap_or(FALLBACK_TOKEN_TTL);

	Ok(ImpersonationToken {
		access_token: AccessToken::new(token.access_token().secret().to_owned()),
		issued_at,
		expires_at: issued_at + ttl,
	})
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		return TransportError::Timeout {
			status: meta.and_then(|m| m.status).or_else(|| err.status().map(|s| s.as_u16())),
		};
	}

	TransportError::from(err)
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{Algorithm, DecodingKey, Validation};
	use oauth2::http::StatusCode;
	// self
	use super::*;
	use crate::auth::{ProductType, SharedSecret, TenantKey};

	fn credentials() -> TenantCredentials {
		TenantCredentials {
			key: "io.example.addon".into(),
			client_key: TenantKey::new("T1").expect("Tenant fixture should be valid."),
			oauth_client_id: "oauth-t1".into(),
			public_key: String::new(),
			shared_secret: SharedSecret::new("s3cr3t"),
			server_version: String::new(),
			plugins_version: String::new(),
			base_url: "https://example.atlassian.net".into(),
			product_type: ProductType::Jira,
			description: String::new(),
			event_type: "installed".into(),
		}
	}

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = StatusCode::from_u16(status).expect("Status fixture should be valid.");

		response
	}

	#[test]
	fn token_url_joins_base_and_path() {
		let server = AuthorizationServer::new("http://127.0.0.1:8080/");

		assert_eq!(
			server.token_url().expect("Token URL should resolve.").as_str(),
			"http://127.0.0.1:8080/oauth2/token"
		);
		assert_eq!(
			AuthorizationServer::default().token_url().expect("Default URL should resolve.").as_str(),
			"https://oauth-2-authorization-server.services.atlassian.com/oauth2/token"
		);
		assert!(AuthorizationServer::new("not a url").token_url().is_err());
	}

	#[test]
	fn assertion_names_client_user_and_tenant() {
		let server = AuthorizationServer::default();
		let user = UserAccountId::new("557058:abc").expect("User fixture should be valid.");
		let now = time::macros::datetime!(2025-01-01 00:00 UTC);
		let assertion =
			build_assertion(&server, &credentials(), &user, now).expect("Assertion should sign.");
		let mut validation = Validation::new(Algorithm::HS256);

		validation.validate_exp = false;
		validation.set_audience(&[DEFAULT_AUTHORIZATION_SERVER]);

		let claims = jsonwebtoken::decode::<AssertionClaims>(
			&assertion,
			&DecodingKey::from_secret(b"s3cr3t"),
			&validation,
		)
		.expect("Assertion should verify with the shared secret.")
		.claims;

		assert_eq!(claims.iss, "urn:atlassian:connect:clientid:oauth-t1");
		assert_eq!(claims.sub, "urn:atlassian:connect:useraccountid:557058:abc");
		assert_eq!(claims.tnt, "https://example.atlassian.net");
		assert_eq!(claims.exp - claims.iat, 59);
	}

	#[test]
	fn token_request_uppercases_joined_scopes() {
		let url = AuthorizationServer::default().token_url().expect("Token URL should resolve.");
		let scopes = ScopeSet::new(["read", "act_as_user"]).expect("Scopes should be valid.");
		let request = token_request(&url, "signed", &scopes).expect("Request should build.");
		let body = String::from_utf8(request.body().clone()).expect("Form body should be UTF-8.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(
			body,
			"grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer&assertion=signed&scope=ACT_AS_USER+READ"
		);

		let bare = token_request(&url, "signed", &ScopeSet::default()).expect("Request should build.");

		assert!(!String::from_utf8_lossy(bare.body()).contains("scope="));
	}

	#[test]
	fn success_response_defaults_missing_expiry() {
		let now = OffsetDateTime::now_utc();
		let token = parse_token_response(
			&response(200, r#"{"access_token":"abc","token_type":"Bearer"}"#),
			None,
			now,
		)
		.expect("Token response should parse.");

		assert_eq!(token.access_token.expose(), "abc");
		assert_eq!(token.expires_at - now, Duration::seconds(60));
		assert!(token.is_fresh_at(now, Duration::seconds(5)));
		assert!(!token.is_fresh_at(now + Duration::seconds(56), Duration::seconds(5)));

		let explicit = parse_token_response(
			&response(200, r#"{"access_token":"abc","token_type":"Bearer","expires_in":900}"#),
			None,
			now,
		)
		.expect("Token response should parse.");

		assert_eq!(explicit.expires_at - now, Duration::seconds(900));
	}

	#[test]
	fn error_responses_are_classified() {
		let now = OffsetDateTime::now_utc();
		let rejected = parse_token_response(
			&response(400, r#"{"error":"invalid_grant","error_description":"bad assertion"}"#),
			None,
			now,
		);

		assert!(matches!(
			rejected,
			Err(ExchangeError::Rejected { ref error, ref message, status: Some(400) })
				if error == "invalid_grant" && message == "bad assertion"
		));

		let meta = ResponseMetadata { status: Some(503), retry_after: Some(Duration::seconds(3)) };
		let unexpected = parse_token_response(&response(503, "unavailable"), Some(&meta), now);

		assert!(matches!(
			unexpected,
			Err(ExchangeError::Unexpected { status: Some(503), retry_after: Some(_), .. })
		));
		assert!(matches!(
			parse_token_response(&response(200, r#"{"token_type":"Bearer"}"#), None, now),
			Err(ExchangeError::Parse { status: Some(200), .. })
		));
	}
}
