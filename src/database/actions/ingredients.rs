use crate::{
    error::ActionError,
    identity::Identity,
    permissions::ActionType,
    schema::{Id, Ingredient},
    validation::validate_ingredient,
};

use sqlx::{Pool, Postgres};

/// Escapes `LIKE` wildcards so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Lists ingredients, optionally only those whose name starts with
/// `name_prefix` (case-insensitive).
pub async fn list_ingredients(
    name_prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ActionError> {
    let rows: Vec<Ingredient> = match name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE LOWER(name) LIKE LOWER($1) || '%' ORDER BY id",
        )
        .bind(escape_like(prefix))
        .fetch_all(pool)
        .await,
        None => sqlx::query_as::<_, Ingredient>("SELECT id, name, measurement_unit FROM ingredients ORDER BY id")
            .fetch_all(pool)
            .await,
    }
    .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    Ok(rows)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, ActionError> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    row.ok_or_else(|| ActionError::NotFound(String::from("ingredient")))
}

pub async fn create_ingredient(
    identity: &Identity,
    name: &str,
    measurement_unit: &str,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ActionError> {
    identity.authenticate(ActionType::ManageReferenceData)?;

    validate_ingredient(name.trim(), measurement_unit.trim())?;

    let row: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id, name, measurement_unit",
    )
    .bind(name.trim())
    .bind(measurement_unit.trim())
    .fetch_one(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    log::info!("Created ingredient {} ({})", row.id, row.name);

    Ok(row)
}

/// Removes the ingredient from every recipe using it; the recipes stay with
/// a reduced ingredient list.
pub async fn delete_ingredient(
    identity: &Identity,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    identity.authenticate(ActionType::ManageReferenceData)?;

    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "ingredient"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(String::from("ingredient")));
    }

    log::info!("Deleted ingredient {id}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::escape_like;

    #[rstest]
    #[case("flour", "flour")]
    #[case("100%", "100\\%")]
    #[case("a_b", "a\\_b")]
    #[case("back\\slash", "back\\\\slash")]
    fn escapes_like_wildcards(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(escape_like(raw), expected);
    }
}
