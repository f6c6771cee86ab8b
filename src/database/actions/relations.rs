//! Favorites and the shopping cart: per-user marks on recipes, unique per
//! (user, recipe) pair.

use sqlx::{Pool, Postgres};

use crate::{
    error::ActionError,
    identity::Identity,
    permissions::ActionType,
    schema::{CartIngredient, Id, RecipeMinified, ShoppingListEntry},
    shopping_list::{aggregate, ShoppingListFile},
};

use super::recipes::fetch_recipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Favorite,
    ShoppingCart,
}

impl Relation {
    fn table(&self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping_cart",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping cart",
        }
    }
}

async fn add_relation(
    relation: Relation,
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinified, ActionError> {
    let user_id = identity.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = fetch_recipe(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return ActionError::NotFound(String::from("recipe"));
            }
        }
        ActionError::from_sqlx(e, relation.label())
    })?;

    if result.rows_affected() == 0 {
        log::debug!("Recipe {recipe_id} already in {} of user {user_id}", relation.label());
        return Err(ActionError::AlreadyExists(format!(
            "Recipe in {}",
            relation.label()
        )));
    }

    Ok(RecipeMinified::from(recipe))
}

async fn remove_relation(
    relation: Relation,
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    let user_id = identity.authenticate(ActionType::ManageOwnRelations)?;
    fetch_recipe(recipe_id, pool).await?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, relation.label()))?;

    if result.rows_affected() == 0 {
        log::debug!("Recipe {recipe_id} not in {} of user {user_id}", relation.label());
        return Err(ActionError::NotPresent(format!(
            "Recipe in {}",
            relation.label()
        )));
    }

    Ok(())
}

pub async fn add_to_favorites(
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinified, ActionError> {
    add_relation(Relation::Favorite, identity, recipe_id, pool).await
}

pub async fn remove_from_favorites(
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    remove_relation(Relation::Favorite, identity, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinified, ActionError> {
    add_relation(Relation::ShoppingCart, identity, recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    identity: &Identity,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    remove_relation(Relation::ShoppingCart, identity, recipe_id, pool).await
}

/// Ingredient lines of every recipe in the caller's cart, ungrouped.
pub async fn list_cart_ingredients(
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredient>, ActionError> {
    let user_id = identity.require_user()?;

    let rows: Vec<CartIngredient> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount::BIGINT AS amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "shopping cart"))?;

    Ok(rows)
}

pub async fn shopping_list(
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListEntry>, ActionError> {
    Ok(aggregate(list_cart_ingredients(identity, pool).await?))
}

pub async fn download_shopping_list(
    identity: &Identity,
    pool: &Pool<Postgres>,
) -> Result<ShoppingListFile, ActionError> {
    let entries = shopping_list(identity, pool).await?;
    Ok(ShoppingListFile::from_entries(&entries))
}
