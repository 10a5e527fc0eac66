use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneType {
    /// Drawn from the fixed catalog of age thresholds.
    Standard,
    /// Supplied by the user for their own plan.
    Personal,
}

impl MilestoneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Personal => "personal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "personal" => Some(Self::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: i64,
    pub plan_id: Option<i64>,
    pub user_id: Option<i64>,
    pub milestone_type: MilestoneType,
    pub title: String,
    pub description: String,
    pub target_year: Option<i32>,
    pub target_age: Option<i32>,
    pub category: String,
    pub color: String,
    pub icon: String,
}

/// For creating new milestones (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMilestone {
    pub plan_id: Option<i64>,
    pub user_id: Option<i64>,
    pub milestone_type: MilestoneType,
    pub title: String,
    pub description: String,
    pub target_year: Option<i32>,
    pub target_age: Option<i32>,
    pub category: String,
    pub color: String,
    pub icon: String,
}

impl Milestone {
    pub fn values(&self) -> NewMilestone {
        NewMilestone {
            plan_id: self.plan_id,
            user_id: self.user_id,
            milestone_type: self.milestone_type,
            title: self.title.clone(),
            description: self.description.clone(),
            target_year: self.target_year,
            target_age: self.target_age,
            category: self.category.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
        }
    }
}

/// A user-defined milestone as entered, before it is attached to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalMilestone {
    #[serde(default)]
    pub user_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_year: Option<i32>,
    #[serde(default)]
    pub target_age: Option<i32>,
    #[serde(default = "default_personal_category")]
    pub category: String,
    #[serde(default = "default_personal_color")]
    pub color: String,
    #[serde(default = "default_personal_icon")]
    pub icon: String,
}

fn default_personal_category() -> String {
    "personal".to_string()
}

fn default_personal_color() -> String {
    "#6366f1".to_string()
}

fn default_personal_icon() -> String {
    "star".to_string()
}
