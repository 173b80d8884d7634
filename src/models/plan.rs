use chrono::Duration;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Premium plans sold through checkout. Durations are fixed and counted from
/// the moment the confirming webhook is processed.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema, DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PremiumPlan {
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "half_yearly")]
    HalfYearly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
    #[sea_orm(string_value = "three_years")]
    ThreeYears,
}

/// Who the purchase is for; advocates pay the professional rate.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "advocate")]
    Advocate,
}

impl PremiumPlan {
    pub const ALL: [PremiumPlan; 4] = [
        PremiumPlan::Monthly,
        PremiumPlan::HalfYearly,
        PremiumPlan::Yearly,
        PremiumPlan::ThreeYears,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumPlan::Monthly => "monthly",
            PremiumPlan::HalfYearly => "half_yearly",
            PremiumPlan::Yearly => "yearly",
            PremiumPlan::ThreeYears => "three_years",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }

    pub fn duration_days(&self) -> i64 {
        match self {
            PremiumPlan::Monthly => 30,
            PremiumPlan::HalfYearly => 182,
            PremiumPlan::Yearly => 365,
            PremiumPlan::ThreeYears => 1095,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::days(self.duration_days())
    }

    /// Server-side price table, in the smallest currency unit.
    pub fn price_cents(&self, user_type: UserType) -> i64 {
        match (self, user_type) {
            (PremiumPlan::Monthly, UserType::Standard) => 199,
            (PremiumPlan::HalfYearly, UserType::Standard) => 999,
            (PremiumPlan::Yearly, UserType::Standard) => 1799,
            (PremiumPlan::ThreeYears, UserType::Standard) => 4499,
            (PremiumPlan::Monthly, UserType::Advocate) => 499,
            (PremiumPlan::HalfYearly, UserType::Advocate) => 2499,
            (PremiumPlan::Yearly, UserType::Advocate) => 4499,
            (PremiumPlan::ThreeYears, UserType::Advocate) => 9999,
        }
    }
}

impl std::fmt::Display for PremiumPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Standard => "standard",
            UserType::Advocate => "advocate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(UserType::Standard),
            "advocate" => Some(UserType::Advocate),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlanPrice {
    pub plan_id: PremiumPlan,
    pub user_type: UserType,
    pub amount: i64,
    pub currency: String,
    pub duration_days: i64,
}

/// The full price table, as shown on the pricing page and in upsell views.
pub fn price_table(currency: &str) -> Vec<PlanPrice> {
    [UserType::Standard, UserType::Advocate]
        .into_iter()
        .flat_map(|user_type| {
            PremiumPlan::ALL.into_iter().map(move |plan| PlanPrice {
                plan_id: plan,
                user_type,
                amount: plan.price_cents(user_type),
                currency: currency.to_string(),
                duration_days: plan.duration_days(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_wire_names() {
        for plan in PremiumPlan::ALL {
            assert_eq!(PremiumPlan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(PremiumPlan::parse("weekly"), None);
        assert_eq!(UserType::parse("advocate"), Some(UserType::Advocate));
        assert_eq!(UserType::parse("admin"), None);
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        let json = serde_json::to_string(&PremiumPlan::HalfYearly).unwrap();
        assert_eq!(json, "\"half_yearly\"");
        let plan: PremiumPlan = serde_json::from_str("\"three_years\"").unwrap();
        assert_eq!(plan, PremiumPlan::ThreeYears);
    }

    #[test]
    fn test_advocates_pay_more_for_every_plan() {
        for plan in PremiumPlan::ALL {
            assert!(plan.price_cents(UserType::Advocate) > plan.price_cents(UserType::Standard));
        }
    }

    #[test]
    fn test_price_table_covers_every_combination() {
        let table = price_table("usd");
        assert_eq!(table.len(), 8);
        let monthly = table
            .iter()
            .find(|p| p.plan_id == PremiumPlan::Monthly && p.user_type == UserType::Standard)
            .unwrap();
        assert_eq!(monthly.amount, 199);
        assert_eq!(monthly.duration_days, 30);
    }
}
