//! Demonstrates calling the host as the add-on and as an impersonated user against a mock
//! server standing in for both the tenant site and the authorization server.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
// self
use atlassian_connect_broker::{
	auth::{ProductType, ScopeSet, SharedSecret, TenantCredentials, TenantKey},
	client::{HostRequest, ReqwestHostClientFactory},
	http::TransportConfig,
	oauth::AuthorizationServer,
};

#[derive(Debug, Deserialize)]
struct Myself {
	#[serde(rename = "accountId")]
	account_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-user-token\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let myself_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/rest/api/3/myself");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accountId\":\"557058:demo\"}");
		})
		.await;
	let credentials = TenantCredentials {
		key: "io.example.connect-addon".into(),
		client_key: TenantKey::new("tenant-acme")?,
		oauth_client_id: "oauth-acme".into(),
		public_key: String::new(),
		shared_secret: SharedSecret::new("demo-shared-secret"),
		server_version: String::new(),
		plugins_version: String::new(),
		base_url: server.base_url(),
		product_type: ProductType::Jira,
		description: String::new(),
		event_type: "installed".into(),
	};
	let factory = ReqwestHostClientFactory::new(&TransportConfig::default())?
		.with_authorization_server(AuthorizationServer::new(server.base_url()));
	let tenant = factory.tenant_client(credentials, ScopeSet::new(["READ", "ACT_AS_USER"])?)?;
	let as_addon = tenant
		.execute_typed::<Myself>(HostRequest::get("/rest/api/3/myself"), &[200])
		.await?;

	println!("Add-on identity resolved to {}.", as_addon.body.account_id);

	let user = tenant.as_user("557058:demo").await?;
	let again = tenant.as_user("557058:demo").await?;
	let as_user =
		user.execute_typed::<Myself>(HostRequest::get("/rest/api/3/myself"), &[200]).await?;

	println!(
		"Impersonated {} (cached client reused: {}).",
		as_user.body.account_id,
		std::sync::Arc::ptr_eq(&user, &again)
	);

	token_mock.assert_async().await;
	myself_mock.assert_calls_async(2).await;

	Ok(())
}
