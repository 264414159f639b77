use axum::Json;

use crate::models::AuthenticatedClient;

/// The caller as resolved from its API key.
pub async fn show(client: AuthenticatedClient) -> Json<AuthenticatedClient> {
    Json(client)
}
