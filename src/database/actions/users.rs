use sqlx::{Pool, Postgres};

use crate::{
    cryptography::{hash_password, verify_password},
    error::{ActionError, QueryError},
    identity::Identity,
    images::{discard_on_error, ImageKind, ImageStore},
    jwt::{generate_jwt_session, SessionKeys},
    pagination::{PageContext, Pagination},
    permissions::ActionType,
    query::{user_listing_query, users_by_id_query},
    schema::{Id, User, UserRow, UserView},
    validation::{validate_email, validate_password, validate_person_name, validate_username},
};

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Duplicate email or username is reported against the colliding field.
fn registration_error(e: sqlx::Error) -> ActionError {
    if let sqlx::Error::Database(db) = &e {
        match db.constraint() {
            Some("users_email_key") => return ActionError::AlreadyExists(String::from("email")),
            Some("users_username_key") => {
                return ActionError::AlreadyExists(String::from("username"))
            }
            _ => {}
        }
    }
    ActionError::from_sqlx(e, "user")
}

pub async fn register_user(registration: Registration, pool: &Pool<Postgres>) -> Result<UserView, ActionError> {
    validate_email(&registration.email)?;
    validate_username(&registration.username)?;
    validate_person_name(&registration.first_name, &registration.last_name)?;
    validate_password(&registration.password)?;

    let password = hash_password(&registration.password)?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (email, username, first_name, last_name, password) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&registration.email)
    .bind(&registration.username)
    .bind(&registration.first_name)
    .bind(&registration.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(registration_error)?;

    log::info!("Registered user {} ({})", user.id, user.username);

    Ok(UserView {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        avatar: user.avatar,
        is_subscribed: false,
    })
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, ActionError> {
    sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))
}

/// Checks credentials and hands back a signed session token.
pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<String, ActionError> {
    let invalid = || ActionError::validation("non_field_errors", "Invalid email or password");

    let user = get_user_by_email(email, pool).await?.ok_or_else(invalid)?;

    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    generate_jwt_session(&user, keys).map_err(|e| {
        log::error!("Failed to sign session for user {}: {:?}", user.id, e.info);
        ActionError::Query(QueryError::new(String::from("Session could not be created")))
    })
}

pub async fn get_user(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<UserView, ActionError> {
    let mut query = users_by_id_query(identity.user_id(), vec![id]);
    let user: Option<UserView> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    user.ok_or_else(|| ActionError::NotFound(String::from("user")))
}

pub async fn current_user(identity: &Identity, pool: &Pool<Postgres>) -> Result<UserView, ActionError> {
    let id = identity.require_user()?;
    get_user(identity, id, pool).await
}

pub async fn list_users(
    identity: &Identity,
    pagination: Pagination,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserView>, ActionError> {
    let mut query = user_listing_query(identity.user_id(), pagination);
    let rows: Vec<UserRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    let total_rows = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(rows, total_rows, pagination).map(UserView::from))
}

pub async fn set_password(
    identity: &Identity,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    let id = identity.require_user()?;

    let stored: Option<(String,)> = sqlx::query_as("SELECT password FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;
    let (stored,) = stored.ok_or_else(|| ActionError::NotFound(String::from("user")))?;

    if !verify_password(current_password, &stored)? {
        return Err(ActionError::validation("current_password", "Wrong password"));
    }
    validate_password(new_password)?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash_password(new_password)?)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    log::info!("User {id} changed their password");

    Ok(())
}

pub async fn set_avatar(
    identity: &Identity,
    bytes: &[u8],
    images: &dyn ImageStore,
    pool: &Pool<Postgres>,
) -> Result<String, ActionError> {
    let id = identity.require_user()?;
    let reference = images.store(bytes, ImageKind::Avatar).await?;

    let updated = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&reference)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"));
    discard_on_error(images, Some(reference.as_str()), updated).await?;

    Ok(reference)
}

pub async fn delete_avatar(identity: &Identity, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    let id = identity.require_user()?;

    sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    Ok(())
}

/// Removes a user together with their recipes and every relation row
/// pointing at them.
pub async fn delete_user(identity: &Identity, id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    identity.authenticate(ActionType::ManageUsers)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| ActionError::from_sqlx(e, "user"))?;

    if result.rows_affected() == 0 {
        return Err(ActionError::NotFound(String::from("user")));
    }

    log::info!("Deleted user {id}");

    Ok(())
}
