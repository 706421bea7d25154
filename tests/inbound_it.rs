// self
use atlassian_connect_broker::{
	_preludet::*,
	auth::{LifecycleEvent, ProductType},
	inbound::{self, TOKEN_HEADER_PREFIX},
	oauth::oauth2::http::{Request, header::AUTHORIZATION},
	store::TenantStore,
};

const TENANT: &str = "T1";
const SECRET: &str = "s3cr3t";
const BASE_URL: &str = "https://host.example";

fn iframe_request(token: &str) -> Request<()> {
	Request::builder()
		.uri(format!("https://addon.example/issue-glance?issueKey=TEST-1&jwt={token}"))
		.body(())
		.expect("Iframe request fixture should build.")
}

#[tokio::test]
async fn valid_query_token_returns_tenant_credentials() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;
	let request = iframe_request(&inbound_token(TENANT, SECRET, 300));
	let credentials = inbound::validate_request(&request, store.as_ref())
		.await
		.expect("Token signed with the tenant secret should validate.");

	assert_eq!(credentials.tenant_key().as_ref(), TENANT);
	assert_eq!(credentials.base_url, BASE_URL);
}

#[tokio::test]
async fn header_token_is_accepted_when_query_is_absent() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;
	let request = Request::builder()
		.method("POST")
		.uri("https://addon.example/webhooks/issue-updated")
		.header(AUTHORIZATION, format!("{TOKEN_HEADER_PREFIX}{}", inbound_token(TENANT, SECRET, 60)))
		.body(())
		.expect("Webhook request fixture should build.");

	inbound::validate_request(&request, store.as_ref())
		.await
		.expect("Header token should validate.");
}

#[tokio::test]
async fn wrong_secret_fails_signature_check() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;
	let request = iframe_request(&inbound_token(TENANT, "wrong", 300));
	let err = inbound::validate_request(&request, store.as_ref())
		.await
		.expect_err("Token signed with the wrong secret should fail.");

	assert!(matches!(err, Error::SignatureInvalid { .. }));
	assert!(!err.to_string().contains(SECRET));
}

#[tokio::test]
async fn expiry_is_enforced_only_when_set() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;
	let expired = iframe_request(&inbound_token(TENANT, SECRET, -30));

	assert!(matches!(
		inbound::validate_request(&expired, store.as_ref()).await,
		Err(Error::TokenExpired { expired_at, .. }) if expired_at > 0
	));

	let unbounded = iframe_request(&inbound_token(TENANT, SECRET, 0));

	inbound::validate_request(&unbounded, store.as_ref())
		.await
		.expect("Tokens without expiry should validate.");
}

#[tokio::test]
async fn missing_malformed_and_unknown_tokens_are_distinguished() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;
	let bare = Request::builder()
		.uri("https://addon.example/issue-glance")
		.body(())
		.expect("Bare request fixture should build.");

	assert!(matches!(
		inbound::validate_request(&bare, store.as_ref()).await,
		Err(Error::TokenMissing)
	));
	assert!(matches!(
		inbound::validate_request(&iframe_request("only.two"), store.as_ref()).await,
		Err(Error::MalformedToken { .. })
	));
	assert!(matches!(
		inbound::validate_request(&iframe_request(&inbound_token("T2", SECRET, 300)), store.as_ref())
			.await,
		Err(Error::UnknownTenant { tenant }) if tenant == "T2"
	));
}

#[tokio::test]
async fn reinstall_replaces_the_record_and_rotates_the_secret() {
	let store = seeded_store(credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira)).await;

	store
		.save(credentials_fixture(TENANT, "rotated", BASE_URL, ProductType::Jira))
		.await
		.expect("Reinstall should replace the record.");

	assert_eq!(store.len(), 1);
	assert!(matches!(
		inbound::validate_request(&iframe_request(&inbound_token(TENANT, SECRET, 300)), store.as_ref())
			.await,
		Err(Error::SignatureInvalid { .. })
	));
	inbound::validate_request(&iframe_request(&inbound_token(TENANT, "rotated", 300)), store.as_ref())
		.await
		.expect("Token signed with the rotated secret should validate.");
}

#[test]
fn installed_callback_bypasses_validation() {
	let credentials = credentials_fixture(TENANT, SECRET, BASE_URL, ProductType::Jira);
	let event = credentials.lifecycle_event().expect("Fixture should carry a lifecycle event.");

	assert_eq!(event, LifecycleEvent::Installed);
	assert!(!event.requires_verification());
}
