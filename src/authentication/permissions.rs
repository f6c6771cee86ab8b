use crate::{identity::Identity, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::ManageOwnRelations,
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::ManageOwnRelations,
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageAllRecipes,
            ActionType::ManageUsers,
            ActionType::ManageReferenceData,
        ],
    ),
];

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRelations,
    ManageOwnRecipes,

    ManageUsers,
    ManageAllRecipes,
    ManageReferenceData,
}

impl ActionType {
    pub fn authenticate(self, identity: &Identity) -> bool {
        let Some(role) = identity.role() else {
            return false;
        };

        ACTION_TABLE
            .iter()
            .find_map(|(uid, actions)| {
                if &role != uid {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

/// Author-or-admin rule for mutating a recipe.
pub fn can_manage_recipe(identity: &Identity, author_id: i32) -> bool {
    if ActionType::ManageAllRecipes.authenticate(identity) {
        return true;
    }

    ActionType::ManageOwnRecipes.authenticate(identity) && identity.user_id() == Some(author_id)
}
