//! C11: Function registry.
//!
//! Each tool is described by a `{name, description, inputSchema}` tuple
//! exposed to the LLM, fixed at process startup. Dispatch from the model's
//! chosen function name into a handler is done by parsing into the
//! [`ToolCall`] tagged union and matching on it — not by reflection — per
//! the design notes' "dynamic tool dispatch" guidance.

mod budget_assistant;
mod offline_query;
mod pay_bill;
mod savings_calculator;
mod send_money;
mod statement_generator;
mod transaction_query;

pub use budget_assistant::{BudgetAssistantProvider, BudgetCategoryTotal, InMemoryBudgetAssistant};
pub use offline_query::OfflineQueryResult;
pub use pay_bill::PayBillOutcome;
pub use savings_calculator::{InMemorySavingsCalculator, SavingsCalculatorProvider, SavingsProjection};
pub use send_money::SendMoneyOutcome;
pub use statement_generator::{InMemoryStatementProvider, StatementProvider, StatementSummary};
pub use transaction_query::{InMemoryTransactionHistory, TransactionHistoryProvider};

use crate::error::ChatError;
use chrono::{DateTime, Utc};
use fulus_sync::chain_state_store::ChainStateStore;
use fulus_sync::conflict_store::ConflictStore;
use fulus_sync::ledger::Ledger;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// The closed set of tools exposed to the LLM (spec §4.9: "transaction-query,
/// statement-generator, savings-calculator, budget-assistant, send-money,
/// pay-bill, offline-query").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    TransactionQuery,
    StatementGenerator,
    SavingsCalculator,
    BudgetAssistant,
    SendMoney,
    PayBill,
    OfflineQuery,
}

impl ToolName {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::TransactionQuery => "transaction-query",
            ToolName::StatementGenerator => "statement-generator",
            ToolName::SavingsCalculator => "savings-calculator",
            ToolName::BudgetAssistant => "budget-assistant",
            ToolName::SendMoney => "send-money",
            ToolName::PayBill => "pay-bill",
            ToolName::OfflineQuery => "offline-query",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "transaction-query" => Some(ToolName::TransactionQuery),
            "statement-generator" => Some(ToolName::StatementGenerator),
            "savings-calculator" => Some(ToolName::SavingsCalculator),
            "budget-assistant" => Some(ToolName::BudgetAssistant),
            "send-money" => Some(ToolName::SendMoney),
            "pay-bill" => Some(ToolName::PayBill),
            "offline-query" => Some(ToolName::OfflineQuery),
            _ => None,
        }
    }

    /// Whether this tool mutates state. Write tools require an explicit
    /// user intent flag and refuse inside a speculative plan.
    pub fn is_write(self) -> bool {
        matches!(self, ToolName::SendMoney | ToolName::PayBill)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::TransactionQuery => "Look up a user's recent ledger transactions.",
            ToolName::StatementGenerator => "Summarize a user's activity over a period as a statement.",
            ToolName::SavingsCalculator => "Project a savings goal given a contribution and rate.",
            ToolName::BudgetAssistant => "Break down a user's spend by category over a period.",
            ToolName::SendMoney => "Transfer funds from the user to a recipient. Requires explicit confirmation.",
            ToolName::PayBill => "Pay a biller on the user's behalf. Requires explicit confirmation.",
            ToolName::OfflineQuery => "Inspect a user's offline sync chain state and unresolved conflicts.",
        }
    }

    /// JSON Schema for this tool's arguments, as handed to the LLM.
    pub fn input_schema(self) -> serde_json::Value {
        use serde_json::json;
        match self {
            ToolName::TransactionQuery => json!({
                "type": "object",
                "properties": { "limit": { "type": "integer", "minimum": 1, "maximum": 50 } },
                "required": []
            }),
            ToolName::StatementGenerator => json!({
                "type": "object",
                "properties": { "periodDays": { "type": "integer", "minimum": 1, "maximum": 365 } },
                "required": ["periodDays"]
            }),
            ToolName::SavingsCalculator => json!({
                "type": "object",
                "properties": {
                    "monthlyContribution": { "type": "string" },
                    "months": { "type": "integer", "minimum": 1 },
                    "annualRateBps": { "type": "integer", "minimum": 0 }
                },
                "required": ["monthlyContribution", "months"]
            }),
            ToolName::BudgetAssistant => json!({
                "type": "object",
                "properties": { "periodDays": { "type": "integer", "minimum": 1, "maximum": 365 } },
                "required": ["periodDays"]
            }),
            ToolName::SendMoney => json!({
                "type": "object",
                "properties": {
                    "recipientPhone": { "type": "string" },
                    "amount": { "type": "string" },
                    "intentConfirmed": { "type": "boolean" }
                },
                "required": ["recipientPhone", "amount", "intentConfirmed"]
            }),
            ToolName::PayBill => json!({
                "type": "object",
                "properties": {
                    "billerId": { "type": "string" },
                    "amount": { "type": "string" },
                    "intentConfirmed": { "type": "boolean" }
                },
                "required": ["billerId", "amount", "intentConfirmed"]
            }),
            ToolName::OfflineQuery => json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
}

/// A parsed, validated function call chosen by the LLM.
#[derive(Debug, Clone)]
pub enum ToolCall {
    TransactionQuery { limit: usize },
    StatementGenerator { period_days: i64 },
    SavingsCalculator { monthly_contribution: Decimal, months: u32, annual_rate_bps: u32 },
    BudgetAssistant { period_days: i64 },
    SendMoney { recipient_phone: String, amount: Decimal, intent_confirmed: bool },
    PayBill { biller_id: String, amount: Decimal, intent_confirmed: bool },
    OfflineQuery,
}

/// Context carried alongside a tool call: who is asking, and whether this
/// invocation is a live user turn or a speculative plan the LLM is drafting
/// before presenting it to the user.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub user_phone: String,
    pub speculative: bool,
}

/// Parses a raw `(name, args)` pair from the LLM into a [`ToolCall`],
/// validating required fields per the tool's input schema.
pub fn parse_tool_call(name: &str, args: &serde_json::Value) -> Result<ToolCall, ChatError> {
    let tool = ToolName::parse(name).ok_or_else(|| ChatError::UnknownTool(name.to_string()))?;
    let obj = |field: &str| args.get(field);
    let require_str = |field: &'static str| -> Result<String, ChatError> {
        obj(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ChatError::InvalidToolArgs { tool: tool.as_str(), reason: format!("missing field `{field}`") })
    };
    let require_decimal = |field: &'static str| -> Result<Decimal, ChatError> {
        let raw = require_str(field)?;
        raw.parse::<Decimal>()
            .map_err(|_| ChatError::InvalidToolArgs { tool: tool.as_str(), reason: format!("field `{field}` is not a decimal") })
    };
    let require_i64 = |field: &'static str| -> Result<i64, ChatError> {
        obj(field)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ChatError::InvalidToolArgs { tool: tool.as_str(), reason: format!("missing field `{field}`") })
    };
    let optional_bool = |field: &'static str| -> bool { obj(field).and_then(|v| v.as_bool()).unwrap_or(false) };

    let call = match tool {
        ToolName::TransactionQuery => ToolCall::TransactionQuery {
            limit: obj("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize,
        },
        ToolName::StatementGenerator => ToolCall::StatementGenerator { period_days: require_i64("periodDays")? },
        ToolName::SavingsCalculator => ToolCall::SavingsCalculator {
            monthly_contribution: require_decimal("monthlyContribution")?,
            months: require_i64("months")? as u32,
            annual_rate_bps: obj("annualRateBps").and_then(|v| v.as_i64()).unwrap_or(0) as u32,
        },
        ToolName::BudgetAssistant => ToolCall::BudgetAssistant { period_days: require_i64("periodDays")? },
        ToolName::SendMoney => ToolCall::SendMoney {
            recipient_phone: require_str("recipientPhone")?,
            amount: require_decimal("amount")?,
            intent_confirmed: optional_bool("intentConfirmed"),
        },
        ToolName::PayBill => ToolCall::PayBill {
            biller_id: require_str("billerId")?,
            amount: require_decimal("amount")?,
            intent_confirmed: optional_bool("intentConfirmed"),
        },
        ToolName::OfflineQuery => ToolCall::OfflineQuery,
    };
    Ok(call)
}

/// The fixed set of tool handlers, composed at startup. Holds its
/// collaborators directly rather than behind a reflective `name -> handler`
/// map, since the call site already has a concrete [`ToolCall`] variant to
/// match on.
pub struct FunctionRegistry {
    ledger: Arc<dyn Ledger>,
    chain_state_store: Arc<dyn ChainStateStore>,
    conflict_store: Arc<dyn ConflictStore>,
    transaction_history: Arc<dyn TransactionHistoryProvider>,
    statement_provider: Arc<dyn StatementProvider>,
    savings_calculator: Arc<dyn SavingsCalculatorProvider>,
    budget_assistant: Arc<dyn BudgetAssistantProvider>,
}

impl FunctionRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        chain_state_store: Arc<dyn ChainStateStore>,
        conflict_store: Arc<dyn ConflictStore>,
        transaction_history: Arc<dyn TransactionHistoryProvider>,
        statement_provider: Arc<dyn StatementProvider>,
        savings_calculator: Arc<dyn SavingsCalculatorProvider>,
        budget_assistant: Arc<dyn BudgetAssistantProvider>,
    ) -> Self {
        FunctionRegistry {
            ledger,
            chain_state_store,
            conflict_store,
            transaction_history,
            statement_provider,
            savings_calculator,
            budget_assistant,
        }
    }

    /// The specs handed to the LLM at context-assembly time, in the fixed
    /// registry order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        [
            ToolName::TransactionQuery,
            ToolName::StatementGenerator,
            ToolName::SavingsCalculator,
            ToolName::BudgetAssistant,
            ToolName::SendMoney,
            ToolName::PayBill,
            ToolName::OfflineQuery,
        ]
        .into_iter()
        .map(|tool| ToolSpec {
            name: tool.as_str(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
    }

    /// Dispatches a validated [`ToolCall`] to its handler. Read tools
    /// (transaction-query, statement-generator, savings-calculator,
    /// budget-assistant, offline-query) are idempotent. Write tools
    /// (send-money, pay-bill) refuse unless `ctx.speculative` is false and
    /// the call carries an explicit `intent_confirmed` flag.
    #[tracing::instrument(skip_all, fields(user_id = %ctx.user_id))]
    pub async fn invoke(&self, call: ToolCall, ctx: &ToolContext, now: DateTime<Utc>) -> Result<serde_json::Value, ChatError> {
        match call {
            ToolCall::TransactionQuery { limit } => {
                let rows = self.transaction_history.recent(&ctx.user_id, limit).await;
                Ok(serde_json::to_value(rows).unwrap())
            }
            ToolCall::StatementGenerator { period_days } => {
                let summary = self.statement_provider.generate(&ctx.user_id, period_days).await;
                Ok(serde_json::to_value(summary).unwrap())
            }
            ToolCall::SavingsCalculator { monthly_contribution, months, annual_rate_bps } => {
                let projection = self.savings_calculator.project(monthly_contribution, months, annual_rate_bps).await;
                Ok(serde_json::to_value(projection).unwrap())
            }
            ToolCall::BudgetAssistant { period_days } => {
                let totals = self.budget_assistant.categorize(&ctx.user_id, period_days).await;
                Ok(serde_json::to_value(totals).unwrap())
            }
            ToolCall::SendMoney { recipient_phone, amount, intent_confirmed } => {
                send_money::handle(
                    self.ledger.as_ref(),
                    ctx,
                    recipient_phone,
                    amount,
                    intent_confirmed,
                    now,
                )
                .await
            }
            ToolCall::PayBill { biller_id, amount, intent_confirmed } => {
                pay_bill::handle(self.ledger.as_ref(), ctx, biller_id, amount, intent_confirmed, now).await
            }
            ToolCall::OfflineQuery => {
                offline_query::handle(self.chain_state_store.as_ref(), self.conflict_store.as_ref(), &ctx.user_id, now).await
            }
        }
    }
}
