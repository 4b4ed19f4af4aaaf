//! Role-specific navigation

use crate::domain::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

const ADMIN_NAV: &[NavItem] = &[
    item("Dashboard", "/admin/dashboard"),
    item("Users", "/admin/users"),
    item("Jobs", "/admin/jobs"),
    item("Transactions", "/admin/transactions"),
];

const WORKER_NAV: &[NavItem] = &[
    item("Dashboard", "/worker/dashboard"),
    item("Live tracking", "/worker/live-tracking"),
];

const CUSTOMER_NAV: &[NavItem] = &[
    item("Home", "/customer/home"),
    item("Create Job", "/customer/create-job"),
    item("History", "/customer/history"),
    item("Recommendations", "/customer/recommendations"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sidebar {
    Admin,
    Worker,
    Customer,
}

impl Sidebar {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Sidebar::Admin,
            Role::Worker => Sidebar::Worker,
            Role::Customer => Sidebar::Customer,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Sidebar::Admin => "Admin Panel",
            Sidebar::Worker => "Worker Panel",
            Sidebar::Customer => "Zovo",
        }
    }

    pub fn items(&self) -> &'static [NavItem] {
        match self {
            Sidebar::Admin => ADMIN_NAV,
            Sidebar::Worker => WORKER_NAV,
            Sidebar::Customer => CUSTOMER_NAV,
        }
    }

    /// Landing page after sign-in
    pub fn home_path(&self) -> &'static str {
        self.items()[0].path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_per_role() {
        let admin = Sidebar::for_role(Role::Admin);
        let labels: Vec<_> = admin.items().iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["Dashboard", "Users", "Jobs", "Transactions"]);

        let worker = Sidebar::for_role(Role::Worker);
        assert_eq!(worker.items()[1], item("Live tracking", "/worker/live-tracking"));
        assert_eq!(worker.title(), "Worker Panel");
    }

    #[test]
    fn test_home_paths() {
        assert_eq!(Sidebar::Admin.home_path(), "/admin/dashboard");
        assert_eq!(Sidebar::Worker.home_path(), "/worker/dashboard");
        assert_eq!(Sidebar::Customer.home_path(), "/customer/home");
    }
}
