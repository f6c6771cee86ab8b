use std::collections::HashSet;

use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::ActionError,
    identity::Identity,
    images::{discard_on_error, ImageKind, ImageStore},
    pagination::{PageContext, Pagination},
    permissions::{can_manage_recipe, ActionType},
    query::{assemble_recipes, recipe_listing_query, users_by_id_query, RecipeFilter, RecipeScope},
    schema::{Id, LinkedRecipeTag, Recipe, RecipePart, RecipeRow, RecipeView, ShortLink, UserView},
    validation::{validate_recipe, RecipeDraft},
};

/// Loads authors, tags and ingredient lines for a page of recipe rows with
/// one statement each.
async fn load_views(
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, ActionError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = rows.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<Id> = rows.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut author_query = users_by_id_query(viewer, author_ids);
    let authors: Vec<UserView> = author_query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    let tags: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids[..])
    .fetch_all(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    let parts: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(&recipe_ids[..])
    .fetch_all(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    Ok(assemble_recipes(rows, authors, tags, parts))
}

pub async fn list_recipes(
    identity: &Identity,
    filter: &RecipeFilter,
    pagination: Pagination,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, ActionError> {
    let viewer = identity.user_id();

    let mut query = recipe_listing_query(viewer, RecipeScope::Page(filter, pagination));
    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    let total_rows = rows.first().map(|r| r.count).unwrap_or(0);
    let views = load_views(rows, viewer, pool).await?;

    Ok(PageContext::from_rows(views, total_rows, pagination))
}

pub async fn get_recipe(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<RecipeView, ActionError> {
    let viewer = identity.user_id();

    let mut query = recipe_listing_query(viewer, RecipeScope::Single(id));
    let row: Option<RecipeRow> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    let row = row.ok_or_else(|| ActionError::NotFound(String::from("recipe")))?;

    load_views(vec![row], viewer, pool)
        .await?
        .pop()
        .ok_or_else(|| ActionError::NotFound(String::from("recipe")))
}

pub async fn fetch_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Recipe, ActionError> {
    let recipe: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    recipe.ok_or_else(|| ActionError::NotFound(String::from("recipe")))
}

/// Fetches a recipe the caller is about to modify, checking they are its
/// author or an admin.
pub async fn get_recipe_mut(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<Recipe, ActionError> {
    identity.authenticate(ActionType::ManageOwnRecipes)?;
    let recipe = fetch_recipe(id, pool).await?;

    if !can_manage_recipe(identity, recipe.author_id) {
        log::debug!("{identity:?} may not modify recipe {id}");
        return Err(ActionError::Forbidden);
    }

    Ok(recipe)
}

fn first_missing(requested: &[Id], found: Vec<(Id,)>) -> Option<Id> {
    let found: HashSet<Id> = found.into_iter().map(|(id,)| id).collect();
    requested.iter().copied().find(|id| !found.contains(id))
}

/// Every referenced ingredient and tag must exist before anything is written.
async fn ensure_references(draft: &RecipeDraft, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    let ingredient_ids: Vec<Id> = draft.ingredients.iter().map(|i| i.id).collect();
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids[..])
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;
    if let Some(id) = first_missing(&ingredient_ids, found) {
        return Err(ActionError::Validation {
            field: "ingredients",
            info: format!("Ingredient with id {id} does not exist"),
        });
    }

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(&draft.tags[..])
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;
    if let Some(id) = first_missing(&draft.tags, found) {
        return Err(ActionError::Validation {
            field: "tags",
            info: format!("Tag with id {id} does not exist"),
        });
    }

    Ok(())
}

async fn insert_links(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    draft: &RecipeDraft,
) -> Result<(), ActionError> {
    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::INTEGER[])")
        .bind(recipe_id)
        .bind(&draft.tags[..])
        .execute(&mut **tx)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    let ingredient_ids: Vec<Id> = draft.ingredients.iter().map(|i| i.id).collect();
    let amounts: Vec<i32> = draft.ingredients.iter().map(|i| i.amount).collect();

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, i.id, i.amount FROM UNNEST($2::INTEGER[], $3::INTEGER[]) AS i(id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(&ingredient_ids[..])
    .bind(&amounts[..])
    .execute(&mut **tx)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    Ok(())
}

async fn insert_recipe(
    author_id: Id,
    draft: &RecipeDraft,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, ActionError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    let (recipe_id,): (Id,) = sqlx::query_as(
        "INSERT INTO recipes (author_id, name, text, image, cooking_time) VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(author_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(image)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    insert_links(&mut tx, recipe_id, draft).await?;

    tx.commit()
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    Ok(recipe_id)
}

async fn update_recipe(
    id: Id,
    draft: &RecipeDraft,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    let result = sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(image)
    .bind(draft.cooking_time)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(String::from("recipe")));
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    insert_links(&mut tx, id, draft).await?;

    tx.commit()
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))
}

/// Creates a recipe with its tags and ingredient lines in one transaction.
/// The stored image is discarded again if that transaction fails.
pub async fn create_recipe(
    identity: &Identity,
    draft: RecipeDraft,
    images: &dyn ImageStore,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ActionError> {
    let author_id = identity.authenticate(ActionType::CreateRecipes)?;

    validate_recipe(&draft, true)?;
    ensure_references(&draft, pool).await?;

    let image = match &draft.image {
        Some(bytes) => images.store(bytes, ImageKind::Recipe).await?,
        None => return Err(ActionError::validation("image", "This field is required")),
    };

    let inserted = insert_recipe(author_id, &draft, &image, pool).await;
    let recipe_id = discard_on_error(images, Some(image.as_str()), inserted).await?;

    log::info!("User {author_id} created recipe {recipe_id}");

    get_recipe(identity, recipe_id, pool).await
}

/// Replaces every field of a recipe. Tags and ingredient lines are deleted
/// and reinserted inside one transaction so readers never see a partial list.
/// A draft without an image keeps the stored one.
pub async fn replace_recipe(
    identity: &Identity,
    id: Id,
    draft: RecipeDraft,
    images: &dyn ImageStore,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ActionError> {
    let recipe = get_recipe_mut(identity, id, pool).await?;

    validate_recipe(&draft, false)?;
    ensure_references(&draft, pool).await?;

    let stored = match &draft.image {
        Some(bytes) => Some(images.store(bytes, ImageKind::Recipe).await?),
        None => None,
    };
    let image = stored.as_deref().unwrap_or(&recipe.image);

    let updated = update_recipe(id, &draft, image, pool).await;
    discard_on_error(images, stored.as_deref(), updated).await?;

    log::info!("Recipe {id} replaced");

    get_recipe(identity, id, pool).await
}

pub async fn delete_recipe(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    let recipe = get_recipe_mut(identity, id, pool).await?;

    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "recipe"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(String::from("recipe")));
    }

    log::info!("Recipe {id} deleted");

    Ok(())
}

pub fn short_link(id: Id, base_url: &str) -> String {
    format!("{}/s/{id}", base_url.trim_end_matches('/'))
}

pub async fn recipe_short_link(id: Id, base_url: &str, pool: &Pool<Postgres>) -> Result<ShortLink, ActionError> {
    let recipe = fetch_recipe(id, pool).await?;

    Ok(ShortLink {
        short_link: short_link(recipe.id, base_url),
    })
}

/// Frontend path a short link resolves to.
pub fn recipe_path(id: Id) -> String {
    format!("/recipes/{id}")
}

/// Resolves `/s/{id}` to the recipe's page, `NotFound` once the recipe is gone.
pub async fn resolve_short_link(id: Id, pool: &Pool<Postgres>) -> Result<String, ActionError> {
    let recipe = fetch_recipe(id, pool).await?;
    Ok(recipe_path(recipe.id))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://foodgram.example", "https://foodgram.example/s/42")]
    #[case("https://foodgram.example/", "https://foodgram.example/s/42")]
    fn builds_short_link(#[case] base_url: &str, #[case] expected: &str) {
        assert_eq!(short_link(42, base_url), expected);
    }

    #[rstest]
    fn short_link_target_is_recipe_page() {
        assert_eq!(recipe_path(42), "/recipes/42");
    }

    #[rstest]
    fn finds_first_missing_reference() {
        assert_eq!(first_missing(&[3, 5, 7], vec![(3,), (7,)]), Some(5));
        assert_eq!(first_missing(&[3, 5], vec![(5,), (3,)]), None);
    }
}
