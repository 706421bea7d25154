//! Request and response shapes for calls back into the host.

// crates.io
use oauth2::http::{HeaderMap, Method};
// self
use crate::{_prelude::*, error::ConfigError};

/// Outbound call relative to the tenant base URL.
#[derive(Clone, Debug)]
pub struct HostRequest {
	pub(crate) method: Method,
	pub(crate) path: String,
	pub(crate) query: Vec<(String, String)>,
	pub(crate) body: Vec<u8>,
	pub(crate) deadline: Option<StdDuration>,
}
impl HostRequest {
	/// Starts a request for `path`, appended to the tenant base URL path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: Vec::new(), body: Vec::new(), deadline: None }
	}

	/// Starts a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Starts a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Starts a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Starts a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends one query argument. Repeating a key sends it more than once.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a pre-encoded body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `value` as the JSON body.
	pub fn json<T>(mut self, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(value).map_err(ConfigError::from)?;

		Ok(self)
	}

	/// Bounds the call; the transport abandons it once `deadline` elapses.
	pub fn deadline(mut self, deadline: StdDuration) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path relative to the tenant base URL.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Resolves the absolute URL against `base`.
	pub fn url(&self, base: &Url) -> Url {
		let mut url = base.clone();
		let path = format!(
			"{}/{}",
			base.path().trim_end_matches('/'),
			self.path.trim_start_matches('/')
		);

		url.set_path(&path);
		url.set_query(None);

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		url
	}
}

/// Undecoded host response.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON into `T`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::DeserializationFailure { status: self.status, source })
	}
}

/// Decoded host response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypedResponse<T> {
	/// HTTP status code.
	pub status: u16,
	/// Decoded body.
	pub body: T,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn url_appends_to_base_path_and_encodes_query() {
		let base = Url::parse("https://example.atlassian.net/wiki/").expect("Base URL should parse.");
		let url = HostRequest::get("/rest/api/search")
			.query("cql", "type = page")
			.query("expand", "body")
			.url(&base);

		assert_eq!(
			url.as_str(),
			"https://example.atlassian.net/wiki/rest/api/search?cql=type+%3D+page&expand=body"
		);
		assert_eq!(
			HostRequest::get("rest/api/2/myself")
				.url(&Url::parse("https://host.example").expect("Base URL should parse."))
				.as_str(),
			"https://host.example/rest/api/2/myself"
		);
	}

	#[test]
	fn json_decode_failure_reports_path_and_status() {
		#[derive(Debug, Deserialize)]
		struct Issue {
			#[allow(dead_code)]
			key: String,
		}

		let raw = RawResponse {
			status: 200,
			headers: HeaderMap::new(),
			body: br#"{"key": 7}"#.to_vec(),
		};
		let err = raw.json::<Issue>().expect_err("Numeric key should not decode.");

		assert!(matches!(
			err,
			Error::DeserializationFailure { status: 200, ref source } if source.path().to_string() == "key"
		));
		assert!(raw.is_success());
	}
}
