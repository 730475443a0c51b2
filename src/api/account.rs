//! Login, registration and logout.
//!
//! Login and registration are sent without a credential and outside the
//! refresh chain: a 401 here means bad credentials, not an expired token.

use super::client::ApiClient;
use super::error::ApiError;
use super::session::CredentialPair;
use super::types::{LoginRequest, LoginResponse, NewUser, User};

/// Authenticate with email and password and install the returned token pair.
///
/// POST /login/ returns `{access, refresh, email, username}`.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    log::info!("Login attempt for {}", email);

    let req = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let resp = ApiError::check(client.post("/login/", &req).await?).await?;

    let login: LoginResponse = resp
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("login response: {}", e)))?;

    client
        .session()
        .establish(&CredentialPair {
            access_token: login.access.clone(),
            refresh_token: login.refresh.clone(),
        })
        .await?;

    log::info!("Login successful for {}", email);
    Ok(login)
}

/// Create an account. POST /register/ returns the created user; it does not log in.
pub async fn register(client: &ApiClient, user: &NewUser) -> Result<User, ApiError> {
    let resp = ApiError::check(client.post("/register/", user).await?).await?;

    let created: User = resp
        .json()
        .await
        .map_err(|e| ApiError::Decode(format!("register response: {}", e)))?;

    log::info!("Registered user {} ({})", created.email, created.id);
    Ok(created)
}

/// Drop both stored tokens. There is no server-side logout endpoint.
pub async fn logout(client: &ApiClient) -> Result<(), ApiError> {
    client.session().clear().await?;
    log::info!("Logged out");
    Ok(())
}
