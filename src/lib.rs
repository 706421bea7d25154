//! Atlassian Connect request authentication: verify inbound host JWTs against per-tenant shared
//! secrets, then call back into the host as the add-on itself or as an impersonated user.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod inbound;
pub mod jwt;
pub mod oauth;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ProductType, SharedSecret, TenantCredentials, TenantKey},
		client::{HostClientFactory, ReqwestHostClientFactory},
		http::ReqwestHttpClient,
		jwt::{self, InboundClaims},
		oauth::{AuthorizationServer, ReqwestTransportErrorMapper},
		store::{MemoryStore, TenantStore},
	};

	/// Factory type alias used by reqwest-backed integration tests.
	pub type ReqwestTestFactory = ReqwestHostClientFactory;

	/// Builds a reqwest HTTP client suitable for `httpmock` servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a factory whose token exchanges target the provided authorization server base.
	pub fn build_reqwest_test_factory(authorization_base: &str) -> ReqwestTestFactory {
		HostClientFactory::with_http_client(
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_authorization_server(AuthorizationServer::new(authorization_base))
	}

	/// Returns credentials for `tenant` installed against `base_url`.
	pub fn credentials_fixture(
		tenant: &str,
		secret: &str,
		base_url: &str,
		product_type: ProductType,
	) -> TenantCredentials {
		TenantCredentials {
			key: "io.example.connect-addon".into(),
			client_key: TenantKey::new(tenant).expect("Tenant fixture key should be valid."),
			oauth_client_id: format!("oauth-{tenant}"),
			public_key: "MIIBIjANBgkq".into(),
			shared_secret: SharedSecret::new(secret),
			server_version: "100000".into(),
			plugins_version: "1001.0.0".into(),
			base_url: base_url.into(),
			product_type,
			description: "Atlassian JIRA at https://example.atlassian.net".into(),
			event_type: "installed".into(),
		}
	}

	/// Saves `credentials` into a fresh in-memory store.
	pub async fn seeded_store(credentials: TenantCredentials) -> Arc<MemoryStore> {
		let store = Arc::new(MemoryStore::default());

		store.save(credentials).await.expect("Seeding the memory store should succeed.");

		store
	}

	/// Signs an inbound-style token for `tenant`, expiring `ttl_secs` from now (0 disables expiry).
	pub fn inbound_token(tenant: &str, secret: &str, ttl_secs: i64) -> String {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let claims = InboundClaims {
			issuer: tenant.into(),
			expires_at: if ttl_secs == 0 { 0 } else { now + ttl_secs },
			issued_at: now,
			..Default::default()
		};

		jwt::sign_claims(&claims, &SharedSecret::new(secret))
			.expect("Inbound token fixture should sign successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{Arc, Weak},
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
