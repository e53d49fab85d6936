/*!
 * # Permissions Module
 *
 * Permission strings are `<resource>:<action>`. A grant of `<resource>:*`
 * covers every action on the resource and a bare `*` covers everything.
 */

/// Wildcard action
pub const ALL: &str = "*";

/// Permission string constants for route gating
pub mod consts {
    // Orders
    pub const ORDERS_CREATE: &str = "orders:create";

    // Planning board: catalog lookups, order listing, scheduling
    pub const PLANNING_VIEW: &str = "planning:view";

    // Shop floor: machine panel, start/report/downtime/scrap/finish
    pub const PRODUCTION_VIEW: &str = "production:view";

    // KPI dashboard
    pub const REPORTS_VIEW: &str = "reports:view";
}

/// Returns true when `granted` satisfies `required`
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == ALL || granted == required {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, ALL)), Some((required_resource, _))) => {
            granted_resource == required_resource
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("production:view", "production:view", true)]
    #[case("production:*", "production:view", true)]
    #[case("*", "orders:create", true)]
    #[case("planning:view", "production:view", false)]
    #[case("orders:*", "planning:view", false)]
    #[case("orders", "orders:create", false)]
    fn wildcard_grants(#[case] granted: &str, #[case] required: &str, #[case] expected: bool) {
        assert_eq!(permission_matches(granted, required), expected);
    }
}
