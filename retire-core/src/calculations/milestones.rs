//! Age-anchored milestones for a plan.
//!
//! Standard milestones come from a fixed catalog of statutory ages and are
//! only emitted when their age falls inside the plan's simulated range.
//! Personal milestones are attached to the plan as entered.

use crate::models::{MilestoneType, NewMilestone, PersonalMilestone, PlanParameters};

/// One entry of the standard catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardMilestone {
    pub target_age: i32,
    pub category: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

/// Statutory ages every plan is checked against, in age order.
pub const STANDARD_MILESTONES: [StandardMilestone; 6] = [
    StandardMilestone {
        target_age: 50,
        category: "savings",
        title: "Catch-up contributions",
        description: "Eligible for additional catch-up contributions to retirement accounts.",
        color: "#10b981",
        icon: "trending-up",
    },
    StandardMilestone {
        target_age: 62,
        category: "social_security",
        title: "Early Social Security",
        description: "Earliest age to claim Social Security, at a permanently reduced benefit.",
        color: "#f59e0b",
        icon: "landmark",
    },
    StandardMilestone {
        target_age: 65,
        category: "healthcare",
        title: "Medicare eligibility",
        description: "Eligible to enroll in Medicare.",
        color: "#3b82f6",
        icon: "heart-pulse",
    },
    StandardMilestone {
        target_age: 67,
        category: "social_security",
        title: "Full Social Security age",
        description: "Full retirement age for Social Security benefits.",
        color: "#f59e0b",
        icon: "landmark",
    },
    StandardMilestone {
        target_age: 70,
        category: "social_security",
        title: "Maximum delayed credits",
        description: "Social Security delayed retirement credits stop accruing.",
        color: "#f59e0b",
        icon: "badge-check",
    },
    StandardMilestone {
        target_age: 73,
        category: "distributions",
        title: "Required Minimum Distributions",
        description: "Required minimum distributions from tax-deferred accounts begin.",
        color: "#ef4444",
        icon: "alert-circle",
    },
];

/// Builds the milestone records for one plan.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneDeriver<'a> {
    params: &'a PlanParameters,
    catalog: &'a [StandardMilestone],
}

impl<'a> MilestoneDeriver<'a> {
    pub fn new(params: &'a PlanParameters) -> Self {
        Self::with_catalog(params, &STANDARD_MILESTONES)
    }

    pub fn with_catalog(
        params: &'a PlanParameters,
        catalog: &'a [StandardMilestone],
    ) -> Self {
        Self { params, catalog }
    }

    /// Standard milestones in range followed by the personal ones.
    ///
    /// `plan_id` is stamped on every record so regenerating the plan
    /// replaces them together with the snapshots.
    pub fn derive(
        &self,
        plan_id: Option<i64>,
        personal: &[PersonalMilestone],
    ) -> Vec<NewMilestone> {
        let mut milestones: Vec<NewMilestone> = self
            .catalog
            .iter()
            .filter(|m| self.in_range(m.target_age))
            .map(|m| NewMilestone {
                plan_id,
                user_id: None,
                milestone_type: MilestoneType::Standard,
                title: m.title.to_string(),
                description: m.description.to_string(),
                target_year: Some(self.params.year_for_age(m.target_age)),
                target_age: Some(m.target_age),
                category: m.category.to_string(),
                color: m.color.to_string(),
                icon: m.icon.to_string(),
            })
            .collect();

        milestones.extend(personal.iter().map(|m| NewMilestone {
            plan_id,
            user_id: m.user_id,
            milestone_type: MilestoneType::Personal,
            title: m.title.clone(),
            description: m.description.clone(),
            target_year: m.target_year,
            target_age: m.target_age,
            category: m.category.clone(),
            color: m.color.clone(),
            icon: m.icon.clone(),
        }));

        milestones
    }

    fn in_range(
        &self,
        age: i32,
    ) -> bool {
        (self.params.start_age..=self.params.end_age).contains(&age)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn params(
        start_age: i32,
        retirement_age: i32,
        end_age: i32,
    ) -> PlanParameters {
        PlanParameters {
            start_year: 2025,
            start_age,
            retirement_age,
            end_age,
            portfolio_growth_rate: dec!(0.07),
            bond_growth_rate: dec!(0.03),
            inflation_rate: dec!(0.03),
            social_security_start_age: 67,
            estimated_social_security_benefit: dec!(24000),
            spouse_social_security_start_age: None,
            spouse_estimated_social_security_benefit: None,
            current_annual_income: dec!(90000),
            working_annual_expenses: None,
            desired_annual_retirement_spending: dec!(60000),
            pension_income: Decimal::ZERO,
            initial_net_worth: dec!(50000),
            liability: None,
        }
    }

    fn ages(milestones: &[NewMilestone]) -> Vec<Option<i32>> {
        milestones.iter().map(|m| m.target_age).collect()
    }

    #[test]
    fn full_range_gets_whole_catalog() {
        let params = params(30, 65, 95);

        let milestones = MilestoneDeriver::new(&params).derive(Some(7), &[]);

        assert_eq!(
            ages(&milestones),
            vec![Some(50), Some(62), Some(65), Some(67), Some(70), Some(73)]
        );
        assert!(milestones.iter().all(|m| m.plan_id == Some(7)));
        assert!(
            milestones
                .iter()
                .all(|m| m.milestone_type == MilestoneType::Standard)
        );
    }

    #[test]
    fn late_start_drops_earlier_milestones() {
        let params = params(55, 60, 90);

        let milestones = MilestoneDeriver::new(&params).derive(None, &[]);

        assert_eq!(
            ages(&milestones),
            vec![Some(62), Some(65), Some(67), Some(70), Some(73)]
        );
    }

    #[test]
    fn early_end_drops_later_milestones() {
        let params = params(30, 60, 68);

        let milestones = MilestoneDeriver::new(&params).derive(None, &[]);

        assert_eq!(
            ages(&milestones),
            vec![Some(50), Some(62), Some(65), Some(67)]
        );
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let params = params(50, 60, 73);

        let milestones = MilestoneDeriver::new(&params).derive(None, &[]);

        assert_eq!(milestones.first().unwrap().target_age, Some(50));
        assert_eq!(milestones.last().unwrap().target_age, Some(73));
    }

    #[test]
    fn target_year_follows_start_year() {
        let params = params(30, 65, 95);

        let milestones = MilestoneDeriver::new(&params).derive(None, &[]);

        let medicare = milestones
            .iter()
            .find(|m| m.target_age == Some(65))
            .unwrap();
        assert_eq!(medicare.target_year, Some(2060));
        assert_eq!(medicare.category, "healthcare");
    }

    #[test]
    fn personal_milestones_pass_through() {
        let params = params(55, 60, 90);
        let personal = PersonalMilestone {
            user_id: Some(3),
            title: "Sail around the world".to_string(),
            description: String::new(),
            target_year: None,
            target_age: Some(40),
            category: "personal".to_string(),
            color: "#6366f1".to_string(),
            icon: "star".to_string(),
        };

        let milestones = MilestoneDeriver::new(&params).derive(Some(1), &[personal]);

        let last = milestones.last().unwrap();
        assert_eq!(last.milestone_type, MilestoneType::Personal);
        assert_eq!(last.title, "Sail around the world");
        assert_eq!(last.target_age, Some(40));
        assert_eq!(last.target_year, None);
        assert_eq!(last.user_id, Some(3));
        assert_eq!(last.plan_id, Some(1));
    }

    #[test]
    fn custom_catalog_replaces_standard_one() {
        let params = params(30, 65, 95);
        let catalog = [StandardMilestone {
            target_age: 59,
            category: "savings",
            title: "Penalty-free withdrawals",
            description: "",
            color: "#10b981",
            icon: "unlock",
        }];

        let milestones = MilestoneDeriver::with_catalog(&params, &catalog).derive(None, &[]);

        assert_eq!(ages(&milestones), vec![Some(59)]);
    }
}
