//! `savings-calculator` tool collaborator: a pure projection, no persisted
//! state. Out of scope as a full goal-tracking feature (spec Non-goals);
//! the chat tool surfaces a plain compound-interest projection.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

#[async_trait]
pub trait SavingsCalculatorProvider: Send + Sync {
    async fn project(&self, monthly_contribution: Decimal, months: u32, annual_rate_bps: u32) -> SavingsProjection;
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsProjection {
    pub months: u32,
    pub total_contributed: Decimal,
    pub projected_balance: Decimal,
}

#[derive(Clone, Copy, Default)]
pub struct InMemorySavingsCalculator;

impl InMemorySavingsCalculator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SavingsCalculatorProvider for InMemorySavingsCalculator {
    async fn project(&self, monthly_contribution: Decimal, months: u32, annual_rate_bps: u32) -> SavingsProjection {
        let monthly_rate = Decimal::new(annual_rate_bps as i64, 4) / Decimal::new(12, 0);
        let mut balance = Decimal::ZERO;
        for _ in 0..months {
            balance += monthly_contribution;
            balance += balance * monthly_rate;
        }
        SavingsProjection {
            months,
            total_contributed: monthly_contribution * Decimal::from(months),
            projected_balance: balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_rate_projection_equals_total_contributed() {
        let calculator = InMemorySavingsCalculator::new();
        let projection = calculator.project(Decimal::new(10000, 2), 12, 0).await;
        assert_eq!(projection.total_contributed, Decimal::new(1_200_00, 2));
        assert_eq!(projection.projected_balance, projection.total_contributed);
    }

    #[tokio::test]
    async fn positive_rate_grows_balance_beyond_contributions() {
        let calculator = InMemorySavingsCalculator::new();
        let projection = calculator.project(Decimal::new(10000, 2), 12, 1200).await;
        assert!(projection.projected_balance > projection.total_contributed);
    }
}
