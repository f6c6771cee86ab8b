use crate::{
    constants::TAG_FIELD_MAX_LENGTH,
    error::ActionError,
    identity::Identity,
    permissions::ActionType,
    schema::{Id, Tag},
};

use sqlx::{Pool, Postgres};

fn validate_tag(name: &str, slug: &str) -> Result<(), ActionError> {
    if name.trim().is_empty() {
        return Err(ActionError::validation("name", "This field is required"));
    }
    if name.chars().count() > TAG_FIELD_MAX_LENGTH {
        return Err(ActionError::validation("name", "Name is too long"));
    }
    if slug.is_empty()
        || slug.len() > TAG_FIELD_MAX_LENGTH
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ActionError::validation(
            "slug",
            "Enter a valid slug of at most 32 letters, digits, hyphens or underscores",
        ));
    }

    Ok(())
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ActionError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, slug FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, ActionError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    tag.ok_or_else(|| ActionError::NotFound(String::from("tag")))
}

pub async fn create_tag(
    identity: &Identity,
    name: &str,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Tag, ActionError> {
    identity.authenticate(ActionType::ManageReferenceData)?;

    validate_tag(name, slug)?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
    )
    .bind(name.trim())
    .bind(slug)
    .fetch_one(pool)
    .await
    .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    log::info!("Created tag {} ({})", tag.id, tag.slug);

    Ok(tag)
}

/// Removes the tag from every recipe carrying it; the recipes stay.
pub async fn delete_tag(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    identity.authenticate(ActionType::ManageReferenceData)?;

    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "tag"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(String::from("tag")));
    }

    log::info!("Deleted tag {id}");

    Ok(())
}
