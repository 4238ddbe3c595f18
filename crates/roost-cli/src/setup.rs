//! The interactive setup pipeline.
//!
//! Strictly sequential: PKCE generation → listener bind → browser
//! authorization → code exchange → backend sign-in → device registration →
//! credential write. Each stage blocks on the previous one, nothing is
//! retried within a run (the authorization code is single-use), and every
//! stage wraps its failure with a stage-naming context so the user can see
//! *which* leg failed without a backtrace.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use roost_auth::{
    CallbackListener, DEFAULT_PORT_RANGE, OAuthConfig, OAuthFlow, PkceChallenge,
    callback::DEFAULT_CALLBACK_TIMEOUT,
};
use roost_device::{CredentialRecord, CredentialStore};

use crate::config::ClientConfig;

// ---------------------------------------------------------------------------
// Backend wire shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigninRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigninResponse {
    session_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupDeviceRequest<'a> {
    device_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupDeviceResponse {
    device_id: String,
    auth_code: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full setup pipeline and persist the resulting credential.
pub async fn run_setup(
    config: &ClientConfig,
    store: &dyn CredentialStore,
    device_name: &str,
    existing_device_id: Option<&str>,
) -> Result<()> {
    // Stage 1: fresh PKCE material for this attempt.
    let challenge =
        PkceChallenge::generate().context("setup failed generating the PKCE challenge")?;

    // Stage 2: claim a loopback port before showing the URL — the redirect
    // URI must name the port we actually hold.
    let listener = CallbackListener::bind(DEFAULT_PORT_RANGE)
        .await
        .context("setup failed starting the local callback listener")?;

    let flow = OAuthFlow::new(OAuthConfig {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        auth_url: config.auth_url.clone(),
        token_url: config.token_url.clone(),
        redirect_uri: listener.redirect_uri(),
    });

    let auth_url = flow
        .authorization_url(&challenge)
        .context("setup failed building the authorization URL")?;

    println!();
    println!("Open this URL in your browser to authorize the device:");
    println!();
    println!("  {auth_url}");
    println!();
    println!("Waiting for the browser redirect (5 minute timeout)...");

    // Stage 3: suspend until the callback or the timeout.
    let callback = listener
        .wait_for_callback(&challenge.state, DEFAULT_CALLBACK_TIMEOUT)
        .await
        .context("OAuth authorization failed")?;

    // Stage 4: redeem the single-use authorization code.
    let tokens = flow
        .exchange_code(&callback.code, &challenge.code_verifier)
        .await
        .context("token exchange failed")?;

    let client = reqwest::Client::new();

    // Stage 5: the sign-in bridge — distinct failure from registration so
    // the user can tell "login failed" from "registration failed".
    let session_token = sign_in(&client, &config.backend_url, &tokens.id_token)
        .await
        .context("backend sign-in failed")?;

    // Stage 6: mint (or rotate) the device credential.
    let provisioned = register_device(
        &client,
        &config.backend_url,
        &session_token,
        device_name,
        existing_device_id,
    )
    .await
    .context("device registration failed")?;

    // Stage 7: persist locally. The record is overwritten wholesale.
    store
        .save(&CredentialRecord {
            device_id: provisioned.device_id.clone(),
            device_name: device_name.to_string(),
            auth_code: provisioned.auth_code,
        })
        .context("failed to store the device credential")?;

    println!();
    println!("Device '{device_name}' provisioned.");
    println!("  device id: {}", provisioned.device_id);

    Ok(())
}

/// Exchange the provider ID token for a backend session token.
async fn sign_in(client: &reqwest::Client, backend_url: &str, id_token: &str) -> Result<String> {
    let response = client
        .post(format!("{backend_url}/v1/identity/signin"))
        .json(&SigninRequest { id_token })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("{}", error_message(response).await);
    }

    let body: SigninResponse = response.json().await?;
    Ok(body.session_token)
}

/// Call the setup RPC with the user session.
async fn register_device(
    client: &reqwest::Client,
    backend_url: &str,
    session_token: &str,
    device_name: &str,
    existing_device_id: Option<&str>,
) -> Result<SetupDeviceResponse> {
    let response = client
        .post(format!("{backend_url}/v1/devices/setup"))
        .bearer_auth(session_token)
        .json(&SetupDeviceRequest {
            device_name,
            device_id: existing_device_id,
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("{}", error_message(response).await);
    }

    Ok(response.json().await?)
}

/// Pull the backend's `{error}` message out of a failed response.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    response
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| format!("HTTP {status}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
