//! Outbound clients that call back into the host as the add-on or as an impersonated user.
//!
//! [`HostClientFactory`] owns the transport, the transport error mapper, and the authorization
//! server location. It builds [`HostClient`] values bound to one tenant and one signing strategy:
//!
//! - Tenant clients sign each request with a shared-secret token whose `qsh` claim binds it to
//!   the exact method, path, and query.
//! - Impersonating clients present a bearer token negotiated through the JWT-bearer grant.
//!
//! A tenant client owns an [`ImpersonationCache`]; [`HostClient::as_user`] reuses cached
//! impersonating clients until their token is about to expire. Nothing is retried internally.

pub mod cache;
pub mod request;
pub mod signer;

pub use cache::*;
pub use request::*;
pub use signer::{BearerSigner, RequestSigner, SharedSecretSigner};

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		HeaderValue,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ProductType, ScopeSet, TenantCredentials, UserAccountId},
	client::signer::ClientSigner,
	error::{ConfigError, UnexpectedResponse},
	http::{ConnectHttpClient, RequestDeadline, ResponseMetadataSlot},
	obs::{self, OpSpan, Operation, Outcome},
	oauth::{self, AuthorizationServer, ImpersonationToken, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{
	http::{ReqwestHttpClient, TransportConfig},
	oauth::ReqwestTransportErrorMapper,
};

const JSON: &str = "application/json";

#[cfg(feature = "reqwest")]
/// Factory specialized for the crate's default reqwest transport stack.
pub type ReqwestHostClientFactory = HostClientFactory<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Builds authenticated clients for installed tenants.
pub struct HostClientFactory<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for token exchanges and host calls.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	authorization_server: AuthorizationServer,
}
impl<C, M> HostClientFactory<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a factory that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			authorization_server: AuthorizationServer::default(),
		}
	}

	/// Points token exchanges at a different authorization server.
	pub fn with_authorization_server(mut self, server: AuthorizationServer) -> Self {
		self.authorization_server = server;

		self
	}

	/// Authorization server used for impersonation.
	pub fn authorization_server(&self) -> &AuthorizationServer {
		&self.authorization_server
	}

	/// Builds a client signing as the add-on itself.
	pub fn tenant_client(
		&self,
		credentials: impl Into<Arc<TenantCredentials>>,
		scopes: ScopeSet,
	) -> Result<Arc<HostClient<C, M>>> {
		const OP: Operation = Operation::NewClient;

		let credentials = credentials.into();
		let span = OpSpan::new(OP, "tenant_client");

		span.record_tenant(&credentials.client_key);
		obs::record_outcome(OP, Outcome::Attempt);

		let result = span.in_scope(|| self.shared_secret_client(credentials, scopes));

		obs::record_result(OP, &result);

		result
	}

	/// Builds a client for `credentials`, impersonating `impersonated` when provided.
	///
	/// Impersonation requires a Jira tenant and performs one token exchange; the returned client
	/// starts its own empty impersonation cache.
	pub async fn new_client(
		&self,
		credentials: impl Into<Arc<TenantCredentials>>,
		impersonated: Option<&UserAccountId>,
		scopes: &ScopeSet,
	) -> Result<Arc<HostClient<C, M>>> {
		const OP: Operation = Operation::NewClient;

		let credentials = credentials.into();
		let span = OpSpan::new(OP, "new_client");

		span.record_tenant(&credentials.client_key);
		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				match impersonated {
					None => self.shared_secret_client(credentials, scopes.clone()),
					Some(user) =>
						self.impersonating_client(credentials, user, scopes, CacheHandle::owned())
							.await,
				}
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	/// Negotiates an impersonation token for `user` without building a client.
	pub async fn fetch_access_token(
		&self,
		credentials: &TenantCredentials,
		user: &UserAccountId,
		scopes: &ScopeSet,
	) -> Result<ImpersonationToken> {
		const OP: Operation = Operation::TokenExchange;

		let span = OpSpan::new(OP, "fetch_access_token");

		span.record_tenant(&credentials.client_key);
		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				ensure_impersonation(&credentials.product_type)?;

				oauth::exchange_jwt_bearer(
					self.http_client.as_ref(),
					self.transport_mapper.as_ref(),
					&self.authorization_server,
					credentials,
					user,
					scopes,
				)
				.await
				.map_err(|source| Error::TokenExchangeFailure { user: user.to_string(), source })
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	fn shared_secret_client(
		&self,
		credentials: Arc<TenantCredentials>,
		scopes: ScopeSet,
	) -> Result<Arc<HostClient<C, M>>> {
		let base_url = parse_base_url(&credentials)?;
		// Installs predating the add-on key field fall back to the client key.
		let issuer = if credentials.key.is_empty() {
			credentials.client_key.to_string()
		} else {
			credentials.key.clone()
		};
		let signer = ClientSigner::SharedSecret(SharedSecretSigner::new(
			issuer,
			credentials.shared_secret.clone(),
		));

		Ok(Arc::new(self.assemble(credentials, base_url, signer, scopes, None, CacheHandle::owned())))
	}

	async fn impersonating_client(
		&self,
		credentials: Arc<TenantCredentials>,
		user: &UserAccountId,
		scopes: &ScopeSet,
		cache: CacheHandle<C, M>,
	) -> Result<Arc<HostClient<C, M>>> {
		ensure_impersonation(&credentials.product_type)?;

		let base_url = parse_base_url(&credentials)?;
		let token = self.fetch_access_token(&credentials, user, scopes).await?;
		let signer = ClientSigner::Bearer(BearerSigner::new(token));

		Ok(Arc::new(self.assemble(
			credentials,
			base_url,
			signer,
			scopes.clone(),
			Some(user.clone()),
			cache,
		)))
	}

	fn assemble(
		&self,
		credentials: Arc<TenantCredentials>,
		base_url: Url,
		signer: ClientSigner,
		scopes: ScopeSet,
		impersonated: Option<UserAccountId>,
		cache: CacheHandle<C, M>,
	) -> HostClient<C, M> {
		HostClient {
			factory: self.clone(),
			credentials,
			base_url,
			signer,
			scopes,
			impersonated,
			cache,
		}
	}
}
#[cfg(feature = "reqwest")]
impl HostClientFactory<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a factory with its own reqwest transport built from `config`.
	pub fn new(config: &TransportConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::from_config(config)?;

		Ok(Self::with_http_client(http_client, Arc::new(ReqwestTransportErrorMapper)))
	}
}
impl<C, M> Clone for HostClientFactory<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			authorization_server: self.authorization_server.clone(),
		}
	}
}
impl<C, M> Debug for HostClientFactory<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostClientFactory")
			.field("authorization_server", &self.authorization_server)
			.finish()
	}
}

/// Authenticated client bound to one tenant and one signing strategy.
pub struct HostClient<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	factory: HostClientFactory<C, M>,
	credentials: Arc<TenantCredentials>,
	base_url: Url,
	signer: ClientSigner,
	scopes: ScopeSet,
	impersonated: Option<UserAccountId>,
	cache: CacheHandle<C, M>,
}
impl<C, M> HostClient<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Install record this client acts for.
	pub fn credentials(&self) -> &Arc<TenantCredentials> {
		&self.credentials
	}

	/// Parsed tenant base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Scopes requested for impersonation.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Impersonated user, or `None` for the add-on identity.
	pub fn impersonated_user(&self) -> Option<&UserAccountId> {
		self.impersonated.as_ref()
	}

	/// Expiry of the negotiated bearer token; `None` for shared-secret clients.
	pub fn token_expires_at(&self) -> Option<OffsetDateTime> {
		self.signer.token().map(|token| token.expires_at)
	}

	/// Number of impersonating clients cached behind this client.
	pub fn cached_impersonations(&self) -> usize {
		self.cache.upgrade().map(|cache| cache.len()).unwrap_or_default()
	}

	/// Returns a client acting as `user`, reusing a cached one while its token stays valid.
	///
	/// Two calls with the same user on the same tenant client return the same [`Arc`] until the
	/// token nears expiry; concurrent calls negotiate once.
	pub async fn as_user(&self, user: impl AsRef<str>) -> Result<Arc<HostClient<C, M>>> {
		const OP: Operation = Operation::AsUser;

		let span = OpSpan::new(OP, "as_user");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span
			.instrument(async move {
				let user = UserAccountId::new(user).map_err(|source| Error::InvalidUserId { source })?;

				ensure_impersonation(&self.credentials.product_type)?;

				let cache = self.cache.upgrade().ok_or(ConfigError::CacheDropped)?;
				let shared = CacheHandle::Shared(Arc::downgrade(&cache));

				cache
					.get_or_negotiate(&user, || {
						self.factory.impersonating_client(
							Arc::clone(&self.credentials),
							&user,
							&self.scopes,
							shared,
						)
					})
					.await
			})
			.await;

		obs::record_result(OP, &result);

		result
	}

	/// Sends `request` and returns the undecoded response.
	pub async fn execute(&self, request: HostRequest) -> Result<RawResponse> {
		const OP: Operation = Operation::Execute;

		let span = OpSpan::new(OP, "execute");

		obs::record_outcome(OP, Outcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		obs::record_result(OP, &result);

		result
	}

	/// Sends `request` and decodes the body into `T`.
	///
	/// When `expected` is non-empty, a status outside it fails with
	/// [`Error::UnexpectedResponse`] before any decoding. Decoding a matched (or unchecked) status
	/// that fails yields [`Error::DeserializationFailure`].
	pub async fn execute_typed<T>(
		&self,
		request: HostRequest,
		expected: &[u16],
	) -> Result<TypedResponse<T>>
	where
		T: DeserializeOwned,
	{
		let raw = self.execute(request).await?;

		if !expected.is_empty() && !expected.contains(&raw.status) {
			return Err(UnexpectedResponse { obtained: raw.status, expected: expected.to_vec() }.into());
		}

		let body = raw.json()?;

		Ok(TypedResponse { status: raw.status, body })
	}

	async fn dispatch(&self, request: HostRequest) -> Result<RawResponse> {
		let url = request.url(&self.base_url);
		let method = request.method.clone();
		let path = request.path.clone();
		let mut http_request = oauth2::http::Request::builder()
			.method(method.clone())
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static(JSON))
			.header(CONTENT_TYPE, HeaderValue::from_static(JSON))
			.body(request.body)
			.map_err(ConfigError::from)?;

		if let Some(deadline) = request.deadline {
			http_request.extensions_mut().insert(RequestDeadline(deadline));
		}

		self.signer.sign(&mut http_request, &self.base_url)?;

		let slot = ResponseMetadataSlot::default();
		let handle = self.factory.http_client.with_metadata(slot.clone());
		let response = handle.call(http_request).await.map_err(|err| Error::RequestFailed {
			method: method.to_string(),
			path,
			source: self.factory.transport_mapper.map_transport_error(slot.take().as_ref(), err),
		})?;
		let status = response.status().as_u16();
		let (parts, body) = response.into_parts();

		Ok(RawResponse { status, headers: parts.headers, body })
	}
}
impl<C, M> Debug for HostClient<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostClient")
			.field("tenant", self.credentials.tenant_key())
			.field("base_url", &self.base_url.as_str())
			.field("impersonated", &self.impersonated)
			.field("token_expires_at", &self.token_expires_at())
			.finish()
	}
}

enum CacheHandle<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	Owned(Arc<ImpersonationCache<C, M>>),
	// Impersonating clients live inside the cache they point at.
	Shared(Weak<ImpersonationCache<C, M>>),
}
impl<C, M> CacheHandle<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn owned() -> Self {
		Self::Owned(Arc::new(ImpersonationCache::new()))
	}

	fn upgrade(&self) -> Option<Arc<ImpersonationCache<C, M>>> {
		match self {
			Self::Owned(cache) => Some(Arc::clone(cache)),
			Self::Shared(cache) => cache.upgrade(),
		}
	}
}

fn ensure_impersonation(product_type: &ProductType) -> Result<()> {
	if product_type.supports_impersonation() {
		Ok(())
	} else {
		Err(Error::ImpersonationUnsupported { product_type: product_type.clone() })
	}
}

fn parse_base_url(credentials: &TenantCredentials) -> Result<Url> {
	if credentials.base_url.trim().is_empty() {
		return Err(Error::IncompleteCredentials {
			tenant: credentials.tenant_key().to_string(),
			field: "baseUrl",
		});
	}

	Url::parse(&credentials.base_url).map_err(|source| {
		ConfigError::InvalidBaseUrl { tenant: credentials.tenant_key().to_string(), source }.into()
	})
}
