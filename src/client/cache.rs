//! Per-tenant-client cache of impersonating clients.
//!
//! Entries remember the expiry of the token they were built with. A lookup only reuses an entry
//! while that token stays valid for [`CACHE_LEEWAY`]; otherwise the caller renegotiates and the
//! new client replaces the stale one. Concurrent lookups for the same user share one negotiation
//! through a per-user async guard.

// self
use crate::{
	_prelude::*,
	auth::UserAccountId,
	client::HostClient,
	http::ConnectHttpClient,
	oauth::TransportErrorMapper,
};

/// Remaining lifetime below which a cached impersonation token is renegotiated.
pub const CACHE_LEEWAY: Duration = Duration::seconds(5);

type Guards = Mutex<HashMap<UserAccountId, Arc<AsyncMutex<()>>>>;

/// Map from user account to the impersonating client built for it.
pub struct ImpersonationCache<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	entries: Mutex<HashMap<UserAccountId, Arc<HostClient<C, M>>>>,
	guards: Guards,
	leeway: Duration,
}
impl<C, M> ImpersonationCache<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an empty cache using [`CACHE_LEEWAY`].
	pub fn new() -> Self {
		Self { entries: Default::default(), guards: Default::default(), leeway: CACHE_LEEWAY }
	}

	/// Number of cached clients, fresh or not.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing has been cached yet.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Returns the cached client for `user` while its token is still usable at `now`.
	pub fn fresh(&self, user: &UserAccountId, now: OffsetDateTime) -> Option<Arc<HostClient<C, M>>> {
		let entries = self.entries.lock();
		let client = entries.get(user)?;

		match client.signer.token() {
			Some(token) if !token.is_fresh_at(now, self.leeway) => None,
			_ => Some(Arc::clone(client)),
		}
	}

	/// Returns the fresh entry for `user`, running `negotiate` at most once across concurrent
	/// callers when the entry is missing or stale.
	pub async fn get_or_negotiate<F, Fut>(
		&self,
		user: &UserAccountId,
		negotiate: F,
	) -> Result<Arc<HostClient<C, M>>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Arc<HostClient<C, M>>>>,
	{
		if let Some(client) = self.fresh(user, OffsetDateTime::now_utc()) {
			return Ok(client);
		}

		let guard = self.guard(user);
		let result = self.fill(user, &guard, negotiate).await;

		self.release(user, guard);

		result
	}

	/// Drops the entry for `user`, returning it when present.
	pub fn evict(&self, user: &UserAccountId) -> Option<Arc<HostClient<C, M>>> {
		self.entries.lock().remove(user)
	}

	async fn fill<F, Fut>(
		&self,
		user: &UserAccountId,
		guard: &AsyncMutex<()>,
		negotiate: F,
	) -> Result<Arc<HostClient<C, M>>>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Arc<HostClient<C, M>>>>,
	{
		let _singleflight = guard.lock().await;

		if let Some(client) = self.fresh(user, OffsetDateTime::now_utc()) {
			return Ok(client);
		}

		let client = negotiate().await?;

		self.entries.lock().insert(user.clone(), Arc::clone(&client));

		Ok(client)
	}

	fn guard(&self, user: &UserAccountId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(user.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	// Clones are only taken under the map lock, so a count of two (map plus `guard`) means no
	// other caller is waiting on this user.
	fn release(&self, user: &UserAccountId, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.guards.lock();

		let idle = guards
			.get(user)
			.is_some_and(|held| Arc::ptr_eq(held, &guard) && Arc::strong_count(held) == 2);

		if idle {
			guards.remove(user);
		}
	}

	#[cfg(test)]
	pub(crate) fn pending_guards(&self) -> usize {
		self.guards.lock().len()
	}
}
impl<C, M> Default for ImpersonationCache<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<C, M> Debug for ImpersonationCache<C, M>
where
	C: ?Sized + ConnectHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let users = self.entries.lock().keys().cloned().collect::<Vec<_>>();

		f.debug_struct("ImpersonationCache").field("users", &users).field("leeway", &self.leeway).finish()
	}
}
