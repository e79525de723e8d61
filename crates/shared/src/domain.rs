use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub i64);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Employee];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Front,
    Back,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Front => "front",
            ImageKind::Back => "back",
        }
    }
}

/// Branch columns embedded in an employee row through the `branch_id` join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSummary {
    pub id: BranchId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub salary: Option<f64>,
    #[serde(default)]
    pub cnic_number: Option<String>,
    #[serde(default)]
    pub cnic_front_url: Option<String>,
    #[serde(default)]
    pub cnic_back_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchSummary>,
}

impl Employee {
    /// Salary as used by aggregates; missing values count as zero.
    pub fn salary_or_zero(&self) -> f64 {
        self.salary.filter(|value| value.is_finite()).unwrap_or(0.0)
    }

    pub fn image_url(&self, kind: ImageKind) -> Option<&str> {
        match kind {
            ImageKind::Front => self.cnic_front_url.as_deref(),
            ImageKind::Back => self.cnic_back_url.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Cached branch together with the number of employees that reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchEntry {
    pub branch: Branch,
    pub employee_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<BranchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnic_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<BranchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnic_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnic_front_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnic_back_url: Option<String>,
}

impl EmployeeChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fields an employee may edit on their own profile page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<ProfileChanges> for EmployeeChanges {
    fn from(value: ProfileChanges) -> Self {
        Self {
            full_name: value.full_name,
            phone: value.phone,
            address: value.address,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBranch {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse::<f64>().ok(),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(salary: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "6f1f2c1e-0c43-4a8e-9a7e-6b3c8f1d2a10",
            "full_name": "Sana",
            "email": "sana@example.com",
            "role": "manager",
            "salary": salary,
            "created_at": "2024-03-01T09:30:00+00:00"
        })
    }

    #[test]
    fn salary_accepts_numeric_strings_and_numbers() {
        let employee: Employee = serde_json::from_value(row(json!("72000.5"))).expect("row");
        assert_eq!(employee.salary, Some(72_000.5));
        let employee: Employee = serde_json::from_value(row(json!(64000))).expect("row");
        assert_eq!(employee.salary, Some(64_000.0));
        let employee: Employee = serde_json::from_value(row(json!(null))).expect("row");
        assert_eq!(employee.salary_or_zero(), 0.0);
        assert!(employee.branch.is_none());
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(
            "owner".parse::<Role>(),
            Err(UnknownRole("owner".to_string()))
        );
        assert_eq!(
            UnknownRole("owner".to_string()).to_string(),
            "unknown role: owner"
        );
        assert!(Role::Admin < Role::Manager && Role::Manager < Role::Employee);
    }

    #[test]
    fn partial_updates_skip_unset_columns() {
        let changes = EmployeeChanges::from(ProfileChanges {
            phone: Some("0300".into()),
            ..ProfileChanges::default()
        });
        assert_eq!(
            serde_json::to_value(&changes).expect("json"),
            json!({ "phone": "0300" })
        );
        assert!(EmployeeChanges::default().is_empty());
    }
}
