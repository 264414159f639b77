//! Commission rate settings.

use axum::{Json, extract::State};
use dropship_core::commission::CommissionRates;

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

pub async fn commission_rates(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<CommissionRates>, AppError> {
    let rates = SettingsRepository::new(state.pool()).commission_rates().await?;
    Ok(Json(rates))
}

/// Replace the commission rates. Rates apply to orders delivered afterwards.
pub async fn update_commission_rates(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(rates): Json<CommissionRates>,
) -> Result<Json<CommissionRates>, AppError> {
    rates.validate()?;
    SettingsRepository::new(state.pool())
        .set_commission_rates(&rates)
        .await?;

    tracing::info!(
        dropshipper = %rates.dropshipper,
        sub_dropshipper = %rates.sub_dropshipper,
        sub_sub_dropshipper = %rates.sub_sub_dropshipper,
        "Commission rates updated"
    );
    Ok(Json(rates))
}
