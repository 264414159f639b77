//! Commission distribution command.

use dropship_api::services::CommissionService;
use dropship_core::OrderId;

use super::{CliError, connect, print_json};

/// Distribute commissions for a delivered order. Safe to repeat.
///
/// # Errors
///
/// Returns an error if the order is missing or not delivered.
pub async fn distribute(order_id: OrderId) -> Result<(), CliError> {
    let pool = connect().await?;
    let outcome = CommissionService::new(pool)
        .distribute_for_order(order_id)
        .await?;
    print_json(&outcome)
}
