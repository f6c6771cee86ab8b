use serde::{Deserialize, Serialize};

use crate::{
    error::ActionError,
    permissions::ActionType,
    schema::{Id, UserRole},
};

/// The resolved caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User {
        id: Id,
        username: String,
        role: UserRole,
    },
}

impl Identity {
    pub fn user(id: Id, username: &str, role: UserRole) -> Self {
        Self::User {
            id,
            username: username.to_string(),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn user_id(&self) -> Option<Id> {
        match self {
            Self::Anonymous => None,
            Self::User { id, .. } => Some(*id),
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        match self {
            Self::Anonymous => None,
            Self::User { role, .. } => Some(*role),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }

    /// The caller's id, or `Unauthenticated` for anonymous callers.
    pub fn require_user(&self) -> Result<Id, ActionError> {
        self.user_id().ok_or(ActionError::Unauthenticated)
    }

    /// Checks `action` against the permission table, returning the caller's id.
    pub fn authenticate(&self, action: ActionType) -> Result<Id, ActionError> {
        let id = self.require_user()?;
        if !action.authenticate(self) {
            return Err(ActionError::Forbidden);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn anonymous_has_no_user() {
        let identity = Identity::Anonymous;
        assert!(!identity.is_authenticated());
        assert_eq!(identity.user_id(), None);
        assert!(matches!(
            identity.require_user(),
            Err(ActionError::Unauthenticated)
        ));
    }

    #[rstest]
    fn identities_compare_by_value() {
        let a = Identity::user(1, "chef", UserRole::User);
        assert_eq!(a, Identity::user(1, "chef", UserRole::User));
        assert_ne!(a, Identity::user(2, "chef", UserRole::User));
    }

    #[rstest]
    fn only_admin_role_is_admin() {
        assert!(Identity::user(1, "root", UserRole::Admin).is_admin());
        assert!(!Identity::user(2, "chef", UserRole::User).is_admin());
        assert!(!Identity::Anonymous.is_admin());
    }
}
