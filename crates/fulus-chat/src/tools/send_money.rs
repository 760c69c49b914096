//! `send-money` tool: a write tool. Refuses unless the call carries an
//! explicit `intentConfirmed` flag and is not part of a speculative plan
//! (spec §4.9: "write tools MUST NOT execute as part of a plan the model is
//! merely describing to the user").

use crate::error::ChatError;
use crate::tools::ToolContext;
use chrono::{DateTime, Utc};
use fulus_sync::ledger::Ledger;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SendMoneyOutcome {
    pub new_balance: Decimal,
    pub reference: String,
}

pub async fn handle(
    ledger: &dyn Ledger,
    ctx: &ToolContext,
    recipient_phone: String,
    amount: Decimal,
    intent_confirmed: bool,
    now: DateTime<Utc>,
) -> Result<serde_json::Value, ChatError> {
    if ctx.speculative {
        return Err(ChatError::SpeculativeWriteRefused("send-money"));
    }
    if !intent_confirmed {
        return Err(ChatError::IntentNotConfirmed("send-money"));
    }

    let reference = format!("CHAT-SEND-{}", uuid::Uuid::new_v4());
    let outcome = ledger
        .transfer(&ctx.user_id, &recipient_phone, &ctx.user_phone, &recipient_phone, amount, &reference, None, now)
        .await
        .map_err(|e| ChatError::SyncCollaborator(e.to_string()))?;

    Ok(serde_json::to_value(SendMoneyOutcome {
        new_balance: outcome.new_sender_balance,
        reference,
    })
    .unwrap())
}
