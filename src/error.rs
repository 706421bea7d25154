//! Crate-level error types shared by the inbound validator, client factory, and executor.
//!
//! Messages name the operation and the tenant/user involved but never carry a shared secret,
//! an access token, or a raw signed token.

// self
use crate::{_prelude::*, auth::ProductType, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The request carried neither a `jwt` query parameter nor an `Authorization: JWT` header.
	#[error("A signed token was expected in the `jwt` query parameter or the Authorization header.")]
	TokenMissing,
	/// The token is not a well-formed three-part signed token or lacks an issuer.
	#[error("Signed token is malformed: {reason}.")]
	MalformedToken {
		/// Parser-supplied reason string.
		reason: String,
	},
	/// No credentials are installed for the token issuer.
	#[error("No install information exists for client key `{tenant}`.")]
	UnknownTenant {
		/// Issuer claim that failed to resolve.
		tenant: String,
	},
	/// The tenant store failed while serving a request.
	#[error("Tenant store failed during {operation}.")]
	StorageFailure {
		/// Store operation label.
		operation: &'static str,
		/// Underlying store failure.
		#[source]
		source: StoreError,
	},
	/// The token signature does not match the tenant's shared secret.
	#[error("Signed token failed verification: {reason}.")]
	SignatureInvalid {
		/// Verifier-supplied reason string.
		reason: String,
	},
	/// The token's `exp` claim lies in the past.
	#[error("Signed token for `{tenant}` expired at {expired_at}.")]
	TokenExpired {
		/// Issuer of the expired token.
		tenant: String,
		/// Expiry claim, in epoch seconds.
		expired_at: i64,
	},
	/// Credentials lack a field required for outbound calls.
	#[error("Install information for `{tenant}` is incomplete: {field} is empty.")]
	IncompleteCredentials {
		/// Tenant whose record is incomplete.
		tenant: String,
		/// Missing field label.
		field: &'static str,
	},
	/// Impersonation was requested for a product that does not allow it.
	#[error("{}", impersonation_message(.product_type))]
	ImpersonationUnsupported {
		/// Product type recorded at install time.
		product_type: ProductType,
	},
	/// The impersonated user identifier is empty or malformed.
	#[error("User account ID is invalid.")]
	InvalidUserId {
		/// Identifier validation failure.
		#[source]
		source: crate::auth::IdentifierError,
	},
	/// The JWT-bearer token exchange failed.
	#[error("Token exchange for user `{user}` failed.")]
	TokenExchangeFailure {
		/// Impersonated user identifier.
		user: String,
		/// Underlying negotiation failure.
		#[source]
		source: ExchangeError,
	},
	/// The outbound HTTP call failed before a response arrived.
	#[error("Querying {method} {path} failed.")]
	RequestFailed {
		/// HTTP method of the failed call.
		method: String,
		/// Request path relative to the tenant base URL.
		path: String,
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
	/// The response body could not be decoded into the requested type.
	#[error("Deserializing the response body (status {status}) failed.")]
	DeserializationFailure {
		/// HTTP status of the decoded response.
		status: u16,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The host answered with a status outside the caller's expected set.
	#[error(transparent)]
	UnexpectedResponse(#[from] UnexpectedResponse),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when the host answered with an unanticipated status code.
	pub fn is_unexpected_response(&self) -> bool {
		matches!(self, Self::UnexpectedResponse(_))
	}

	pub(crate) fn storage(operation: &'static str, source: StoreError) -> Self {
		Self::StorageFailure { operation, source }
	}
}

fn impersonation_message(product_type: &ProductType) -> String {
	match product_type {
		ProductType::Confluence => format!(
			"The as_user method is available for {product_type} add-ons but this plug-in does not support it."
		),
		_ => format!("The as_user method is not available for {product_type} add-ons."),
	}
}

/// Host returned a status code the caller did not list as acceptable.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("obtained code {obtained} expected one of: [{}]", join_codes(.expected))]
pub struct UnexpectedResponse {
	/// Status code returned by the host.
	pub obtained: u16,
	/// Status codes the caller accepted.
	pub expected: Vec<u16>,
}

fn join_codes(codes: &[u16]) -> String {
	codes.iter().map(u16::to_string).collect::<Vec<_>>().join(", ")
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Tenant base URL cannot be parsed.
	#[error("Base URL for `{tenant}` is invalid.")]
	InvalidBaseUrl {
		/// Tenant owning the URL.
		tenant: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Authorization server URL cannot be parsed.
	#[error("Authorization server URL is invalid.")]
	InvalidAuthorizationServer {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A signed token could not be produced.
	#[error("Signing the outbound token failed.")]
	Signing {
		/// Underlying JWT failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// A signed value cannot be placed in an HTTP header.
	#[error("Authorization header value is invalid.")]
	InvalidHeader(#[from] oauth2::http::header::InvalidHeaderValue),
	/// A request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	BodyEncode(#[from] serde_json::Error),
	/// Impersonated clients cannot outlive the tenant client that created them and still cache.
	#[error("Impersonation cache is no longer available.")]
	CacheDropped,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while negotiating an impersonation token.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Authorization server rejected the grant with an OAuth error body.
	#[error("Authorization server rejected the grant: {message}.")]
	Rejected {
		/// OAuth `error` code.
		error: String,
		/// Human-readable summary (description when present).
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Authorization server answered with a non-success status and no OAuth error body.
	#[error("Authorization server returned an unexpected response: {message}.")]
	Unexpected {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Authorization server returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Transport failure reaching the authorization server.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The exchange request could not be assembled.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded its deadline.
	#[error("Request timed out.")]
	Timeout {
		/// HTTP status code, when one was observed.
		status: Option<u16>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred.")]
	Io(#[from] std::io::Error),
	/// Request could not be converted for the transport.
	#[error(transparent)]
	Http(#[from] oauth2::http::Error),
	/// Transport reported an error without a structured source.
	#[error("HTTP client error: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
