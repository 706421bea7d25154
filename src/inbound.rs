//! Inbound request validation.
//!
//! [`validate_request`] accepts a host call only after the issuer's shared secret has been resolved
//! from the [`TenantStore`] and the token signature verified against it. It cannot succeed for the
//! first `installed` lifecycle callback because no record exists yet at that point; see
//! [`LifecycleEvent::requires_verification`](crate::auth::LifecycleEvent::requires_verification).

// crates.io
use oauth2::http::{Request, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::TenantCredentials,
	jwt,
	obs::{self, OpSpan, Operation, Outcome},
	store::TenantStore,
};

/// Query parameter carrying the token on iframe and webhook requests.
pub const TOKEN_QUERY_PARAM: &str = "jwt";
/// `Authorization` header scheme carrying the token on REST-style requests.
pub const TOKEN_HEADER_PREFIX: &str = "JWT ";

/// Pulls the signed token from the `jwt` query parameter, falling back to `Authorization: JWT`.
pub fn extract_token<B>(request: &Request<B>) -> Result<String> {
	let from_query = request.uri().query().and_then(|query| {
		url::form_urlencoded::parse(query.as_bytes())
			.find(|(key, _)| key == TOKEN_QUERY_PARAM)
			.map(|(_, value)| value.into_owned())
	});

	if let Some(token) = from_query.filter(|token| !token.is_empty()) {
		return Ok(token);
	}

	request
		.headers()
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix(TOKEN_HEADER_PREFIX))
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(str::to_owned)
		.ok_or(Error::TokenMissing)
}

/// Validates the signed token on `request` and returns the issuing tenant's credentials.
pub async fn validate_request<B, S>(request: &Request<B>, store: &S) -> Result<Arc<TenantCredentials>>
where
	S: ?Sized + TenantStore,
{
	let token = extract_token(request)?;

	validate_token(&token, store).await
}

/// Validates an already extracted token against the tenant store.
pub async fn validate_token<S>(token: &str, store: &S) -> Result<Arc<TenantCredentials>>
where
	S: ?Sized + TenantStore,
{
	const OP: Operation = Operation::ValidateRequest;

	let span = OpSpan::new(OP, "validate_token");
	let scope = span.clone();

	obs::record_outcome(OP, Outcome::Attempt);

	let result = span
		.instrument(async move {
			let tenant = jwt::decode_unverified_issuer(token)?;

			scope.record_tenant(&tenant);

			let credentials = store
				.lookup(&tenant)
				.await
				.map_err(|e| Error::storage("lookup", e))?
				.ok_or_else(|| Error::UnknownTenant { tenant: tenant.to_string() })?;
			let claims = jwt::verify_and_decode(token, &credentials.shared_secret)?;

			if claims.is_expired_at(OffsetDateTime::now_utc()) {
				return Err(Error::TokenExpired {
					tenant: tenant.to_string(),
					expired_at: claims.expires_at,
				});
			}

			Ok(credentials)
		})
		.await;

	obs::record_result(OP, &result);

	result
}
