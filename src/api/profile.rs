//! Profile and address book operations for the logged-in user.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{Address, AddressFields, Profile, ProfileUpdate};

/// GET /profile/, including the user's addresses.
pub async fn get_profile(client: &ApiClient) -> Result<Profile, ApiError> {
    let resp = ApiError::check(client.authenticated_get("/profile/").await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("profile response: {}", e)))
}

/// PUT /profile/. Only username and phone number are changed by the backend.
pub async fn update_profile(client: &ApiClient, update: &ProfileUpdate) -> Result<Profile, ApiError> {
    let resp = ApiError::check(client.authenticated_put("/profile/", update).await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("profile response: {}", e)))
}

/// GET /addresses/.
pub async fn list_addresses(client: &ApiClient) -> Result<Vec<Address>, ApiError> {
    let resp = ApiError::check(client.authenticated_get("/addresses/").await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("address list: {}", e)))
}

/// POST /addresses/. Returns the created address with its id.
pub async fn create_address(client: &ApiClient, fields: &AddressFields) -> Result<Address, ApiError> {
    let resp = ApiError::check(client.authenticated_post("/addresses/", fields).await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("address response: {}", e)))
}

/// PUT /addresses/{id}/ with the full set of fields.
pub async fn update_address(
    client: &ApiClient,
    id: u64,
    fields: &AddressFields,
) -> Result<Address, ApiError> {
    let path = format!("/addresses/{}/", id);
    let resp = ApiError::check(client.authenticated_put(&path, fields).await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("address response: {}", e)))
}

/// DELETE /addresses/{id}/.
pub async fn delete_address(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    let path = format!("/addresses/{}/", id);
    ApiError::check(client.authenticated_delete(&path).await?).await?;
    log::info!("Deleted address {}", id);
    Ok(())
}
