use serde::{Deserialize, Serialize};

/// The fixed set of account buckets tracked by a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    TaxDeferred,
    Roth,
    TaxableBrokerage,
    Cash,
}

/// Which growth rate a bucket compounds at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthClass {
    Equity,
    Bond,
}

impl AccountType {
    /// Every bucket, in the order account states are reported.
    pub const ALL: [AccountType; 4] = [
        Self::TaxDeferred,
        Self::Roth,
        Self::TaxableBrokerage,
        Self::Cash,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::TaxDeferred => 0,
            Self::Roth => 1,
            Self::TaxableBrokerage => 2,
            Self::Cash => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaxDeferred => "tax_deferred",
            Self::Roth => "roth",
            Self::TaxableBrokerage => "taxable_brokerage",
            Self::Cash => "cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tax_deferred" => Some(Self::TaxDeferred),
            "roth" => Some(Self::Roth),
            "taxable_brokerage" => Some(Self::TaxableBrokerage),
            "cash" => Some(Self::Cash),
            _ => None,
        }
    }

    /// Human readable name persisted alongside each account state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TaxDeferred => "Tax-Deferred Retirement",
            Self::Roth => "Roth Retirement",
            Self::TaxableBrokerage => "Taxable Brokerage",
            Self::Cash => "Cash & Savings",
        }
    }

    pub fn growth_class(&self) -> GrowthClass {
        match self {
            Self::Cash => GrowthClass::Bond,
            _ => GrowthClass::Equity,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_accepts_every_as_str_value() {
        for account in AccountType::ALL {
            assert_eq!(AccountType::parse(account.as_str()), Some(account));
        }
    }

    #[test]
    fn parse_rejects_unknown_code() {
        assert_eq!(AccountType::parse("401k"), None);
    }

    #[test]
    fn indices_follow_report_order() {
        let indices: Vec<_> = AccountType::ALL.iter().map(|a| a.index()).collect();

        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn only_cash_grows_at_bond_rate() {
        assert_eq!(AccountType::Cash.growth_class(), GrowthClass::Bond);
        assert_eq!(AccountType::Roth.growth_class(), GrowthClass::Equity);
        assert_eq!(AccountType::TaxDeferred.growth_class(), GrowthClass::Equity);
        assert_eq!(
            AccountType::TaxableBrokerage.growth_class(),
            GrowthClass::Equity
        );
    }
}
