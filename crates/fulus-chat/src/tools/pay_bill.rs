//! `pay-bill` tool: a write tool with the same intent-confirmation and
//! anti-speculation guard as `send-money`. Modeled as a transfer to the
//! biller's account id.

use crate::error::ChatError;
use crate::tools::ToolContext;
use chrono::{DateTime, Utc};
use fulus_sync::ledger::Ledger;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PayBillOutcome {
    pub new_balance: Decimal,
    pub reference: String,
}

pub async fn handle(
    ledger: &dyn Ledger,
    ctx: &ToolContext,
    biller_id: String,
    amount: Decimal,
    intent_confirmed: bool,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, ChatError> {
    if ctx.speculative {
        return Err(ChatError::SpeculativeWriteRefused("pay-bill"));
    }
    if !intent_confirmed {
        return Err(ChatError::IntentNotConfirmed("pay-bill"));
    }

    let reference = format!("CHAT-BILL-{}", uuid::Uuid::new_v4());
    let outcome = ledger
        .transfer(&ctx.user_id, &biller_id, &ctx.user_phone, &biller_id, amount, &reference, None, now)
        .await
        .map_err(|e| ChatError::SyncCollaborator(e.to_string()))?;

    Ok(serde_json::to_value(PayBillOutcome {
        new_balance: outcome.new_sender_balance,
        reference,
    })
    .unwrap())
}
