//! Query-string hash (`qsh`) computation.
//!
//! The canonical request is `METHOD&path&query`, where `path` is relative to the tenant base URL
//! (`/` when empty, no trailing slash, `&` escaped as `%26`) and `query` lists every parameter
//! except `jwt`, sorted by key, with RFC 3986 percent-encoding and repeated values sorted and
//! joined by `,`. The hash is the lowercase hex SHA-256 digest of that string.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Canonical form of an HTTP request as the host hashes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalRequest {
	method: String,
	path: String,
	query: String,
}
impl CanonicalRequest {
	/// Builds the canonical form from request components.
	///
	/// `raw_query` is the undecoded query string (without `?`); `base_path` is the path prefix of
	/// the tenant base URL and is stripped from `path` before canonicalization.
	pub fn new(method: &str, path: &str, raw_query: Option<&str>, base_path: &str) -> Self {
		Self {
			method: method.to_ascii_uppercase(),
			path: canonical_path(path, base_path),
			query: raw_query.map(canonical_query).unwrap_or_default(),
		}
	}

	/// Builds the canonical form of an absolute URL relative to `base`.
	pub fn from_url(method: &str, url: &Url, base: &Url) -> Self {
		Self::new(method, url.path(), url.query(), base.path())
	}

	/// Returns the `METHOD&path&query` string.
	pub fn canonical(&self) -> String {
		format!("{}&{}&{}", self.method, self.path, self.query)
	}

	/// Returns the hex SHA-256 digest of [`canonical`](Self::canonical).
	pub fn hash(&self) -> String {
		let digest = Sha256::digest(self.canonical().as_bytes());

		format!("{digest:x}")
	}
}

fn canonical_path(path: &str, base_path: &str) -> String {
	let base_path = base_path.trim_end_matches('/');
	let relative = path.strip_prefix(base_path).unwrap_or(path);
	let trimmed = relative.trim_matches('/');

	format!("/{}", trimmed.replace('&', "%26"))
}

fn canonical_query(raw: &str) -> String {
	let mut params = BTreeMap::<String, Vec<String>>::new();

	for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
		if key == "jwt" {
			continue;
		}

		params
			.entry(urlencoding::encode(&key).into_owned())
			.or_default()
			.push(urlencoding::encode(&value).into_owned());
	}

	params
		.into_iter()
		.map(|(key, mut values)| {
			values.sort_unstable();

			format!("{key}={}", values.join(","))
		})
		.collect::<Vec<_>>()
		.join("&")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn canonical_request_sorts_and_encodes_parameters() {
		let canonical = CanonicalRequest::new(
			"get",
			"/rest/api/2/search/",
			Some("maxResults=10&jql=project+%3D+TEST&expand=names&expand=changelog&jwt=ignored"),
			"",
		);

		assert_eq!(
			canonical.canonical(),
			"GET&/rest/api/2/search&expand=changelog,names&jql=project%20%3D%20TEST&maxResults=10"
		);
	}

	#[test]
	fn repeated_values_are_kept_and_sorted() {
		let canonical = CanonicalRequest::new(
			"GET",
			"/rest/api/2/search",
			Some("fields=summary&fields=key&fields=key"),
			"",
		);

		assert_eq!(canonical.canonical(), "GET&/rest/api/2/search&fields=key,key,summary");
	}

	#[test]
	fn empty_path_and_query_use_defaults() {
		let canonical = CanonicalRequest::new("POST", "", None, "");

		assert_eq!(canonical.canonical(), "POST&/&");
	}

	#[test]
	fn base_path_is_stripped_and_ampersands_escaped() {
		let base = Url::parse("https://example.atlassian.net/wiki").expect("Base URL should parse.");
		let url = Url::parse("https://example.atlassian.net/wiki/rest/a&b?x=1")
			.expect("Request URL should parse.");
		let canonical = CanonicalRequest::from_url("PUT", &url, &base);

		assert_eq!(canonical.canonical(), "PUT&/rest/a%26b&x=1");
	}

	#[test]
	fn hash_is_lowercase_hex_sha256() {
		let canonical = CanonicalRequest::new("GET", "/", None, "");
		let hash = canonical.hash();

		assert_eq!(hash.len(), 64);
		assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_eq!(hash, format!("{:x}", Sha256::digest(b"GET&/&")));
	}
}
