//! Thread-safe in-memory [`TenantStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TenantCredentials, TenantKey},
	store::{StoreFuture, TenantStore},
};

type StoreMap = Arc<RwLock<HashMap<TenantKey, Arc<TenantCredentials>>>>;

/// Storage backend that keeps install records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of installed tenants.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no tenant is installed.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, credentials: TenantCredentials) {
		let key = credentials.tenant_key().clone();

		map.write().insert(key, Arc::new(credentials));
	}

	fn lookup_now(map: StoreMap, tenant: &TenantKey) -> Option<Arc<TenantCredentials>> {
		map.read().get(tenant).cloned()
	}
}
impl TenantStore for MemoryStore {
	fn save(&self, credentials: TenantCredentials) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::save_now(map, credentials);

			Ok(())
		})
	}

	fn lookup<'a>(
		&'a self,
		tenant: &'a TenantKey,
	) -> StoreFuture<'a, Option<Arc<TenantCredentials>>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::lookup_now(map, tenant)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ProductType, SharedSecret};

	fn credentials(secret: &str) -> TenantCredentials {
		TenantCredentials {
			key: "io.example.addon".into(),
			client_key: TenantKey::new("T1").expect("Tenant fixture should be valid."),
			oauth_client_id: String::new(),
			public_key: String::new(),
			shared_secret: SharedSecret::new(secret),
			server_version: String::new(),
			plugins_version: String::new(),
			base_url: "https://host.example".into(),
			product_type: ProductType::Jira,
			description: String::new(),
			event_type: "installed".into(),
		}
	}

	#[tokio::test]
	async fn save_is_idempotent_and_lookup_signals_absence() {
		let store = MemoryStore::default();
		let tenant = TenantKey::new("T1").expect("Tenant fixture should be valid.");
		let missing = TenantKey::new("T2").expect("Tenant fixture should be valid.");

		assert!(store.is_empty());

		store.save(credentials("first")).await.expect("Save should succeed.");
		store.save(credentials("second")).await.expect("Repeated save should succeed.");

		let found = store
			.lookup(&tenant)
			.await
			.expect("Lookup should succeed.")
			.expect("Saved tenant should be present.");

		assert_eq!(store.len(), 1);
		assert_eq!(found.shared_secret.expose(), "second");
		assert!(store.lookup(&missing).await.expect("Lookup should succeed.").is_none());
	}
}
