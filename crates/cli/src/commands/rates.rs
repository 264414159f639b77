//! Commission rate commands.

use dropship_api::db::SettingsRepository;
use dropship_core::commission::CommissionRates;
use rust_decimal::Decimal;

use super::{CliError, connect, print_json};

/// Print the stored rates (defaults when none are stored).
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn show() -> Result<(), CliError> {
    let pool = connect().await?;
    let rates = SettingsRepository::new(&pool).commission_rates().await?;
    print_json(&rates)
}

/// Replace the rates after validating them.
///
/// # Errors
///
/// Returns `Rates` for out-of-range values or a database error.
pub async fn set(
    dropshipper: Decimal,
    sub_dropshipper: Decimal,
    sub_sub_dropshipper: Decimal,
) -> Result<(), CliError> {
    let rates = CommissionRates {
        dropshipper,
        sub_dropshipper,
        sub_sub_dropshipper,
    };
    rates.validate()?;

    let pool = connect().await?;
    SettingsRepository::new(&pool)
        .set_commission_rates(&rates)
        .await?;

    tracing::info!("Commission rates updated");
    print_json(&rates)
}
