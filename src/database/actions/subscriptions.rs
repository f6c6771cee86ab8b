use sqlx::{Pool, Postgres};

use crate::{
    error::ActionError,
    identity::Identity,
    pagination::{PageContext, Pagination},
    permissions::ActionType,
    query::{assemble_authors, author_with_count_query, authored_recipes_query, subscription_listing_query},
    schema::{AuthorRow, AuthorWithRecipes, AuthoredRecipe, Id},
};

async fn load_authors(
    rows: Vec<AuthorRow>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorWithRecipes>, ActionError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let author_ids: Vec<Id> = rows.iter().map(|r| r.id).collect();
    let mut query = authored_recipes_query(author_ids, recipes_limit);
    let recipes: Vec<AuthoredRecipe> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    Ok(assemble_authors(rows, recipes))
}

/// An author with their recipe count and newest recipes, as seen by `identity`.
pub async fn get_author_with_recipes(
    identity: &Identity,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<AuthorWithRecipes, ActionError> {
    let mut query = author_with_count_query(identity.user_id(), author_id);
    let row: Option<AuthorRow> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    let row = row.ok_or_else(|| ActionError::NotFound(String::from("user")))?;

    load_authors(vec![row], recipes_limit, pool)
        .await?
        .pop()
        .ok_or_else(|| ActionError::NotFound(String::from("user")))
}

pub async fn list_subscriptions(
    identity: &Identity,
    pagination: Pagination,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<AuthorWithRecipes>, ActionError> {
    let user_id = identity.require_user()?;

    let mut query = subscription_listing_query(user_id, pagination);
    let rows: Vec<AuthorRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "subscription"))?;

    let total_rows = rows.first().map(|r| r.count).unwrap_or(0);
    let authors = load_authors(rows, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(authors, total_rows, pagination))
}

async fn ensure_user_exists(id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    row.map(|_| ())
        .ok_or_else(|| ActionError::NotFound(String::from("user")))
}

/// Subscribes the caller to `author_id`. Subscribing to yourself is refused
/// here and again by the `prevent_self_subscription` constraint.
pub async fn subscribe(
    identity: &Identity,
    author_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<AuthorWithRecipes, ActionError> {
    let user_id = identity.authenticate(ActionType::ManageOwnRelations)?;
    ensure_user_exists(author_id, pool).await?;

    if user_id == author_id {
        log::debug!("User {user_id} tried to subscribe to themselves");
        return Err(ActionError::SelfSubscription);
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT (user_id, author_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_foreign_key_violation() {
                return ActionError::NotFound(String::from("user"));
            }
        }
        ActionError::from_sqlx(e, "subscription")
    })?;

    if result.rows_affected() == 0 {
        log::debug!("User {user_id} already subscribed to {author_id}");
        return Err(ActionError::AlreadyExists(String::from("Subscription")));
    }

    log::info!("User {user_id} subscribed to {author_id}");

    get_author_with_recipes(identity, author_id, recipes_limit, pool).await
}

pub async fn unsubscribe(identity: &Identity, author_id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    let user_id = identity.authenticate(ActionType::ManageOwnRelations)?;
    ensure_user_exists(author_id, pool).await?;

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "subscription"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotPresent(String::from("Subscription")));
    }

    log::info!("User {user_id} unsubscribed from {author_id}");

    Ok(())
}
