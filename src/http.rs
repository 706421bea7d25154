//! Transport primitives shared by token exchanges and outbound host calls.
//!
//! The module exposes [`ConnectHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in their own HTTP stack. Implementations
//! call [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known, so error mapping
//! sees consistent metadata. [`TransportConfig`] replaces process-wide transport defaults with an
//! explicit value injected into the client factory.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Abstraction over HTTP transports able to carry token exchanges and host API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back every client a
/// factory builds. The handles they return own whatever state the request needs, which keeps
/// their futures `Send`.
pub trait ConnectHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across calls.
	/// - Once a response provides status headers, save them with [`ResponseMetadataSlot::store`].
	/// - Honor a [`RequestDeadline`] extension on the request when the transport supports it.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Per-request deadline carried as an `http` request extension.
///
/// Dropping the request future cancels the call; the deadline bounds it from the transport side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestDeadline(pub StdDuration);

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Fixed connection settings for the outbound transport.
///
/// Defaults: 30 s connect timeout (covers the TLS handshake), 30 s TCP keep-alive, 90 s idle
/// pool timeout, at most 100 idle connections per host, no overall request timeout, and no
/// redirect following.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
	/// TCP connect + TLS handshake timeout.
	pub connect_timeout: StdDuration,
	/// TCP keep-alive interval.
	pub tcp_keepalive: StdDuration,
	/// How long idle pooled connections stay open.
	pub pool_idle_timeout: StdDuration,
	/// Maximum idle connections kept per host.
	pub pool_max_idle_per_host: usize,
	/// Overall timeout applied to every request unless a [`RequestDeadline`] overrides it.
	pub request_timeout: Option<StdDuration>,
}
impl TransportConfig {
	/// Overrides the connect timeout.
	pub fn with_connect_timeout(mut self, timeout: StdDuration) -> Self {
		self.connect_timeout = timeout;

		self
	}

	/// Overrides the idle pool timeout.
	pub fn with_pool_idle_timeout(mut self, timeout: StdDuration) -> Self {
		self.pool_idle_timeout = timeout;

		self
	}

	/// Overrides the idle pool size.
	pub fn with_pool_max_idle_per_host(mut self, max: usize) -> Self {
		self.pool_max_idle_per_host = max;

		self
	}

	/// Sets an overall request timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Builds a reqwest client honoring this configuration.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest(&self) -> Result<ReqwestClient, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.connect_timeout(self.connect_timeout)
			.tcp_keepalive(self.tcp_keepalive)
			.pool_idle_timeout(self.pool_idle_timeout)
			.pool_max_idle_per_host(self.pool_max_idle_per_host)
			.redirect(reqwest::redirect::Policy::none());

		if let Some(timeout) = self.request_timeout {
			builder = builder.timeout(timeout);
		}

		Ok(builder.build()?)
	}
}
impl Default for TransportConfig {
	fn default() -> Self {
		Self {
			connect_timeout: StdDuration::from_secs(30),
			tcp_keepalive: StdDuration::from_secs(30),
			pool_idle_timeout: StdDuration::from_secs(90),
			pool_max_idle_per_host: 100,
			request_timeout: None,
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints and host APIs answer directly, so any custom client passed to
/// [`with_client`](Self::with_client) should disable redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client from a [`TransportConfig`].
	pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
		config.build_reqwest().map(Self)
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[cfg(feature = "reqwest")]
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

#[cfg(feature = "reqwest")]
/// Public handle returned by [`ReqwestHttpClient`] that satisfies [`ConnectHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let deadline = request.extensions().get::<RequestDeadline>().copied();
			let mut request: reqwest::Request = request.try_into().map_err(Box::new)?;

			if let Some(RequestDeadline(timeout)) = deadline {
				*request.timeout_mut() = Some(timeout);
			}

			let response = client.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
#[cfg(feature = "reqwest")]
impl ConnectHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn transport_defaults_match_documented_values() {
		let config = TransportConfig::default();

		assert_eq!(config.connect_timeout, StdDuration::from_secs(30));
		assert_eq!(config.pool_idle_timeout, StdDuration::from_secs(90));
		assert_eq!(config.pool_max_idle_per_host, 100);
		assert_eq!(config.request_timeout, None);

		let tuned = config.with_request_timeout(StdDuration::from_secs(5));

		assert_eq!(tuned.request_timeout, Some(StdDuration::from_secs(5)));
		ReqwestHttpClient::from_config(&tuned).expect("Configured client should build.");
	}

	#[test]
	fn retry_after_accepts_delta_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, "7".parse().expect("Header value should parse."));

		assert_eq!(parse_retry_after(&headers), Some(Duration::seconds(7)));
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}
}
