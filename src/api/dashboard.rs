//! Aggregate upload statistics.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::DashboardStats;

/// GET /dashboard/. `users_files` is only filled in for staff accounts.
pub async fn get_dashboard(client: &ApiClient) -> Result<DashboardStats, ApiError> {
    let resp = ApiError::check(client.authenticated_get("/dashboard/").await?).await?;
    resp.json()
        .await
        .map_err(|e| ApiError::Decode(format!("dashboard response: {}", e)))
}
