//! Dashboard figures derived from already-fetched rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use shared::domain::{Branch, BranchId, Employee, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCount {
    pub role: Role,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchSalary {
    pub branch_id: BranchId,
    pub branch_name: String,
    pub average_salary: f64,
    pub employee_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub total_employees: usize,
    pub total_branches: usize,
    pub average_salary: f64,
    /// Share of employees created within the last month, in percent with one
    /// decimal.
    pub monthly_growth: f64,
    pub role_distribution: Vec<RoleCount>,
    pub salary_by_branch: Vec<BranchSalary>,
}

/// What a manager sees for their own branch.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchView {
    pub branch_id: BranchId,
    pub employee_count: usize,
    pub role_distribution: Vec<RoleCount>,
}

pub fn compute(employees: &[Employee], branches: &[Branch], now: DateTime<Utc>) -> DashboardStats {
    DashboardStats {
        total_employees: employees.len(),
        total_branches: branches.len(),
        average_salary: average_salary(employees.iter()),
        monthly_growth: monthly_growth(employees, now),
        role_distribution: role_distribution(employees.iter()),
        salary_by_branch: branches
            .iter()
            .map(|branch| {
                let members: Vec<&Employee> = employees
                    .iter()
                    .filter(|employee| employee.branch_id == Some(branch.id))
                    .collect();
                BranchSalary {
                    branch_id: branch.id,
                    branch_name: branch.name.clone(),
                    average_salary: average_salary(members.iter().copied()),
                    employee_count: members.len(),
                }
            })
            .collect(),
    }
}

pub fn branch_view(employees: &[Employee], branch_id: BranchId) -> BranchView {
    let members = || {
        employees
            .iter()
            .filter(move |employee| employee.branch_id == Some(branch_id))
    };
    BranchView {
        branch_id,
        employee_count: members().count(),
        role_distribution: role_distribution(members()),
    }
}

/// Zero for an empty set.
pub fn average_salary<'a>(employees: impl Iterator<Item = &'a Employee>) -> f64 {
    let (total, count) = employees.fold((0.0_f64, 0_usize), |(total, count), employee| {
        (total + employee.salary_or_zero(), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Non-zero counts only, ordered admin, manager, employee.
pub fn role_distribution<'a>(employees: impl Iterator<Item = &'a Employee>) -> Vec<RoleCount> {
    let mut counts = BTreeMap::<Role, usize>::new();
    for employee in employees {
        *counts.entry(employee.role).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(role, count)| RoleCount { role, count })
        .collect()
}

pub fn monthly_growth(employees: &[Employee], now: DateTime<Utc>) -> f64 {
    if employees.is_empty() {
        return 0.0;
    }
    let Some(month_ago) = now.checked_sub_months(Months::new(1)) else {
        return 0.0;
    };
    let recent = employees
        .iter()
        .filter(|employee| employee.created_at >= month_ago)
        .count();
    let percent = recent as f64 / employees.len() as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}
