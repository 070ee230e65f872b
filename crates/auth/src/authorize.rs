use thiserror::Error;

use crate::Role;

/// Roles that admit a caller to an operation (any one of them suffices).
///
/// Configured statically per protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredRoles {
    roles: Vec<Role>,
}

impl RequiredRoles {
    pub fn any_of<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

impl core::fmt::Display for RequiredRoles {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, role) in self.roles.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(role.as_str())?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires one of [{required}]")]
    Denied { required: String },
}

/// Admit iff the principal holds at least one of the required roles.
///
/// - No IO
/// - No panics
/// - Stops at the first matching role
pub fn authorize(principal_roles: &[Role], required: &RequiredRoles) -> Result<(), AuthzError> {
    let admitted = principal_roles
        .iter()
        .any(|held| required.roles.iter().any(|r| r == held));

    if admitted {
        Ok(())
    } else {
        Err(AuthzError::Denied {
            required: required.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::roles::{ADMIN, MODIFIER, WATCHER};

    fn roles(names: &[&'static str]) -> Vec<Role> {
        names.iter().map(|n| Role::from(*n)).collect()
    }

    #[test]
    fn single_matching_role_is_enough() {
        let required = RequiredRoles::any_of([ADMIN, MODIFIER]);
        assert!(authorize(&roles(&[WATCHER, MODIFIER]), &required).is_ok());
    }

    #[test]
    fn no_overlap_is_denied() {
        let required = RequiredRoles::any_of([ADMIN]);
        let err = authorize(&roles(&[WATCHER]), &required).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Denied {
                required: "Admin".to_string()
            }
        );
    }

    #[test]
    fn principal_without_roles_is_denied() {
        let required = RequiredRoles::any_of([ADMIN, MODIFIER, WATCHER]);
        assert!(authorize(&[], &required).is_err());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let required = RequiredRoles::any_of([ADMIN]);
        assert!(authorize(&roles(&["admin"]), &required).is_err());
    }

    #[test]
    fn display_joins_required_roles() {
        let required = RequiredRoles::any_of([ADMIN, MODIFIER]);
        assert_eq!(required.to_string(), "Admin|Modifier");
    }

    fn role_set() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec(
            prop_oneof![
                Just("Admin".to_string()),
                Just("Modifier".to_string()),
                Just("Watcher".to_string()),
                Just("Auditor".to_string()),
                Just("Guest".to_string()),
            ],
            0..5,
        )
    }

    proptest! {
        #[test]
        fn admitted_iff_sets_intersect(held in role_set(), required in role_set()) {
            let held_roles: Vec<Role> = held.iter().cloned().map(Role::from).collect();
            let gate = RequiredRoles::any_of(required.iter().cloned());

            let held_set: HashSet<&String> = held.iter().collect();
            let required_set: HashSet<&String> = required.iter().collect();
            let intersects = !held_set.is_disjoint(&required_set);

            prop_assert_eq!(authorize(&held_roles, &gate).is_ok(), intersects);
        }

        #[test]
        fn order_does_not_matter(held in role_set(), required in role_set()) {
            let forward: Vec<Role> = held.iter().cloned().map(Role::from).collect();
            let reversed: Vec<Role> = held.iter().rev().cloned().map(Role::from).collect();
            let gate = RequiredRoles::any_of(required.iter().cloned());

            prop_assert_eq!(
                authorize(&forward, &gate).is_ok(),
                authorize(&reversed, &gate).is_ok()
            );
        }
    }
}
