//! Tenant credential storage contract and the in-memory implementation used by tests and demos.
//!
//! Persistence itself belongs to the embedding service; implement [`TenantStore`] over whatever
//! database holds install records.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TenantCredentials, TenantKey},
};

/// Boxed future returned by [`TenantStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Lookup from tenant key to install record.
///
/// Every method must be idempotent; [`save`](Self::save) replaces any existing record whole.
pub trait TenantStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record keyed by its client key.
	fn save(&self, credentials: TenantCredentials) -> StoreFuture<'_, ()>;

	/// Fetches the record for `tenant`; `Ok(None)` signals "not installed".
	fn lookup<'a>(
		&'a self,
		tenant: &'a TenantKey,
	) -> StoreFuture<'a, Option<Arc<TenantCredentials>>>;
}

/// Error type produced by [`TenantStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_storage_failure_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let err = Error::storage("lookup", store_error.clone());

		assert!(matches!(err, Error::StorageFailure { operation: "lookup", .. }));

		let source = StdError::source(&err)
			.expect("Storage failure should expose the underlying store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
