//! Role and permission requirements with ANY-of semantics.
//!
//! A requirement is satisfied when the subject holds at least one of the
//! required roles and at least one of the required permissions; an empty set
//! places no constraint of that kind. The same [`satisfies`] check backs the
//! route guard, the view filter and the server-side middleware so the three
//! layers cannot disagree.

use serde::{Deserialize, Serialize};

/// Role or permission sets attached to a route, a UI fragment or an endpoint.
///
/// Declaring neither set means "authenticated is enough". Declaring both
/// means both checks must pass, each with ANY-of semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    permissions: Vec<String>,
}

impl AccessRequirement {
    /// Requirement that only asks for an authenticated session.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Requirement satisfied by any one of the given roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_roles(roles)
    }

    /// Requirement satisfied by any one of the given permissions.
    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_permissions(permissions)
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn required_roles(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn required_permissions(&self) -> &[String] {
        &self.permissions
    }

    /// True when no role or permission is required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.permissions.is_empty()
    }
}

/// Pure policy check: no IO, no session access, no panics.
///
/// Returns true iff every non-empty set in `requirement` intersects the
/// subject's corresponding set.
#[must_use]
pub fn satisfies(
    requirement: &AccessRequirement,
    roles: &[String],
    permissions: &[String],
) -> bool {
    let role_ok = requirement.roles.is_empty()
        || requirement
            .roles
            .iter()
            .any(|required| roles.contains(required));
    let permission_ok = requirement.permissions.is_empty()
        || requirement
            .permissions
            .iter()
            .any(|required| permissions.contains(required));

    role_ok && permission_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_requirement_is_authenticated_only() {
        let requirement = AccessRequirement::authenticated();
        assert!(requirement.is_empty());
        assert!(satisfies(&requirement, &[], &[]));
    }

    #[test]
    fn any_of_permissions_not_all_of() {
        let requirement = AccessRequirement::permissions(["A", "B"]);
        assert!(satisfies(&requirement, &[], &held(&["B"])));
        assert!(!satisfies(&requirement, &[], &held(&["C"])));
    }

    #[test]
    fn any_of_roles() {
        let requirement = AccessRequirement::roles(["admin", "auditor"]);
        assert!(satisfies(&requirement, &held(&["auditor"]), &[]));
        assert!(!satisfies(&requirement, &held(&["member"]), &[]));
    }

    #[test]
    fn both_sets_must_hold_when_both_declared() {
        let requirement = AccessRequirement::roles(["admin"]).with_permissions(["tenants.read"]);

        assert!(satisfies(
            &requirement,
            &held(&["admin"]),
            &held(&["tenants.read"])
        ));
        // Matching role alone is not enough.
        assert!(!satisfies(&requirement, &held(&["admin"]), &held(&["other"])));
        // Matching permission alone is not enough.
        assert!(!satisfies(
            &requirement,
            &held(&["member"]),
            &held(&["tenants.read"])
        ));
    }

    #[test]
    fn matching_is_exact() {
        let requirement = AccessRequirement::permissions(["tenants.read"]);
        assert!(!satisfies(&requirement, &[], &held(&["Tenants.Read"])));
        assert!(!satisfies(&requirement, &[], &held(&["tenants.reader"])));
    }

    #[test]
    fn serde_roundtrip_skips_empty_sets() -> Result<(), serde_json::Error> {
        let requirement = AccessRequirement::permissions(["tenants.read"]);
        let json = serde_json::to_string(&requirement)?;
        assert_eq!(json, r#"{"permissions":["tenants.read"]}"#);
        let back: AccessRequirement = serde_json::from_str(&json)?;
        assert_eq!(back, requirement);
        Ok(())
    }
}
