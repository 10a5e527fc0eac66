use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,

    // Derived from the latest generation run
    pub total_lifetime_tax: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For creating new plans (no id, aggregate or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlan {
    pub user_id: Option<i64>,
    pub name: String,
}

/// Plan fields derived from generated data.
///
/// `total_lifetime_tax` is `None` when the plan has no generated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAggregate {
    pub total_lifetime_tax: Option<Decimal>,
}
