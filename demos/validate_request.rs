//! Demonstrates persisting an `installed` payload, then validating a later host request signed
//! with the tenant's shared secret.

// crates.io
use color_eyre::Result;
use time::OffsetDateTime;
// self
use atlassian_connect_broker::{
	auth::{SharedSecret, TenantCredentials},
	inbound,
	jwt::{self, InboundClaims},
	oauth::oauth2::http::Request,
	store::{MemoryStore, TenantStore},
};

const INSTALL_PAYLOAD: &str = r#"{
	"key": "io.example.connect-addon",
	"clientKey": "tenant-acme",
	"oauthClientId": "oauth-acme",
	"sharedSecret": "demo-shared-secret",
	"baseUrl": "https://acme.atlassian.net",
	"productType": "jira",
	"eventType": "installed"
}"#;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store = MemoryStore::default();
	let install: TenantCredentials = serde_json::from_str(INSTALL_PAYLOAD)?;

	// The install callback itself cannot be validated; persist it directly.
	store.save(install).await?;

	let now = OffsetDateTime::now_utc().unix_timestamp();
	let claims = InboundClaims {
		issuer: "tenant-acme".into(),
		issued_at: now,
		expires_at: now + 180,
		..Default::default()
	};
	let token = jwt::sign_claims(&claims, &SharedSecret::new("demo-shared-secret"))?;
	let request = Request::builder()
		.uri(format!("https://addon.example/issue-glance?issueKey=ACME-1&jwt={token}"))
		.body(())?;
	let credentials = inbound::validate_request(&request, &store).await?;

	println!("Validated request from {} ({}).", credentials.tenant_key(), credentials.base_url);

	let forged = jwt::sign_claims(&claims, &SharedSecret::new("not-the-secret"))?;

	match inbound::validate_token(&forged, &store).await {
		Ok(_) => println!("Forged token was accepted."),
		Err(e) => println!("Forged token rejected: {e}"),
	}

	Ok(())
}
