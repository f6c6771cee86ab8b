//! Per-request recipe and author views.
//!
//! Listing pages are fetched with one statement carrying the per-identity
//! flags, then authors, tags and ingredient lines for the whole page are
//! batch loaded with one statement each and stitched together here.

use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};

use crate::{
    form::Form,
    pagination::Pagination,
    schema::{
        AuthorRow, AuthorWithRecipes, AuthoredRecipe, Id, LinkedRecipeTag, RecipeMinified,
        RecipePart, RecipeRow, RecipeView, Tag, UserView,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthorFilter {
    #[default]
    Any,
    Id(Id),
    /// The caller sent an author that can't be an id; nothing matches.
    Unmatchable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: AuthorFilter,
    pub tag_slugs: Vec<String>,
    pub favorited_only: bool,
    pub in_cart_only: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Self {
        let author = match form.get_str("author").map(str::trim) {
            None | Some("") => AuthorFilter::Any,
            Some(raw) => raw
                .parse::<Id>()
                .map(AuthorFilter::Id)
                .unwrap_or(AuthorFilter::Unmatchable),
        };

        let mut tag_slugs = form.get_all("tags");
        tag_slugs.sort();
        tag_slugs.dedup();

        Self {
            author,
            tag_slugs,
            favorited_only: form.get_flag("is_favorited"),
            in_cart_only: form.get_flag("is_in_shopping_cart"),
        }
    }
}

/// Which recipes a listing statement should select.
#[derive(Debug, Clone, Copy)]
pub enum RecipeScope<'a> {
    Page(&'a RecipeFilter, Pagination),
    Single(Id),
}

fn push_flag(builder: &mut QueryBuilder<'static, Postgres>, table: &str, viewer: Id, alias: &str) {
    builder.push(format!(
        "EXISTS (SELECT 1 FROM {table} x WHERE x.recipe_id = r.id AND x.user_id = "
    ));
    builder.push_bind(viewer);
    builder.push(format!(") AS {alias}, "));
}

/// Builds the recipe listing statement for `viewer`.
///
/// Anonymous viewers get constant `FALSE` flags and their favorite/cart
/// filters are dropped instead of rejected.
pub fn recipe_listing_query(viewer: Option<Id>, scope: RecipeScope) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time, r.created_at, ",
    );

    match viewer {
        Some(viewer) => {
            push_flag(&mut builder, "favorites", viewer, "is_favorited");
            push_flag(&mut builder, "shopping_cart", viewer, "is_in_shopping_cart");
        }
        None => {
            builder.push("FALSE AS is_favorited, FALSE AS is_in_shopping_cart, ");
        }
    }

    builder.push("COUNT(*) OVER () AS count FROM recipes r WHERE TRUE");

    let filter = match scope {
        RecipeScope::Single(id) => {
            builder.push(" AND r.id = ");
            builder.push_bind(id);
            return builder;
        }
        RecipeScope::Page(filter, _) => filter,
    };

    match filter.author {
        AuthorFilter::Any => {}
        AuthorFilter::Id(author_id) => {
            builder.push(" AND r.author_id = ");
            builder.push_bind(author_id);
        }
        AuthorFilter::Unmatchable => {
            builder.push(" AND FALSE");
        }
    }

    if !filter.tag_slugs.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        builder.push_bind(filter.tag_slugs.clone());
        builder.push("))");
    }

    if let Some(viewer) = viewer {
        if filter.favorited_only {
            builder.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
            builder.push_bind(viewer);
            builder.push(")");
        }
        if filter.in_cart_only {
            builder.push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ");
            builder.push_bind(viewer);
            builder.push(")");
        }
    }

    builder.push(" ORDER BY r.created_at DESC, r.id DESC");

    if let RecipeScope::Page(_, pagination) = scope {
        builder.push(" LIMIT ");
        builder.push_bind(pagination.limit());
        builder.push(" OFFSET ");
        builder.push_bind(pagination.offset());
    }

    builder
}

/// Columns of a [`UserView`] as seen by `viewer`, selected from alias `u`.
pub fn push_user_columns(builder: &mut QueryBuilder<'static, Postgres>, viewer: Option<Id>) {
    builder.push("u.id, u.email, u.username, u.first_name, u.last_name, u.avatar, ");

    match viewer {
        Some(viewer) => {
            builder.push(
                "EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = ",
            );
            builder.push_bind(viewer);
            builder.push(") AS is_subscribed");
        }
        None => {
            builder.push("FALSE AS is_subscribed");
        }
    }
}

pub fn users_by_id_query(viewer: Option<Id>, ids: Vec<Id>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    push_user_columns(&mut builder, viewer);
    builder.push(" FROM users u WHERE u.id = ANY(");
    builder.push_bind(ids);
    builder.push(")");
    builder
}

pub fn user_listing_query(viewer: Option<Id>, pagination: Pagination) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    push_user_columns(&mut builder, viewer);
    builder.push(", COUNT(*) OVER () AS count FROM users u ORDER BY u.id LIMIT ");
    builder.push_bind(pagination.limit());
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());
    builder
}

/// Authors `subscriber` follows, each annotated with their recipe count.
pub fn subscription_listing_query(
    subscriber: Id,
    pagination: Pagination,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar, TRUE AS is_subscribed, \
         (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count, \
         COUNT(*) OVER () AS count \
         FROM subscriptions s INNER JOIN users u ON u.id = s.author_id WHERE s.user_id = ",
    );
    builder.push_bind(subscriber);
    builder.push(" ORDER BY u.username, u.id LIMIT ");
    builder.push_bind(pagination.limit());
    builder.push(" OFFSET ");
    builder.push_bind(pagination.offset());
    builder
}

/// Same row shape as [`subscription_listing_query`] for a single author.
pub fn author_with_count_query(viewer: Option<Id>, author_id: Id) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    push_user_columns(&mut builder, viewer);
    builder.push(
        ", (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count, \
         COUNT(*) OVER () AS count FROM users u WHERE u.id = ",
    );
    builder.push_bind(author_id);
    builder
}

/// Newest-first recipes of each author, at most `limit` per author.
pub fn authored_recipes_query(
    author_ids: Vec<Id>,
    limit: Option<i64>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT author_id, id, name, image, cooking_time FROM ( \
         SELECT r.author_id, r.id, r.name, r.image, r.cooking_time, \
         ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.created_at DESC, r.id DESC) AS position \
         FROM recipes r WHERE r.author_id = ANY(",
    );
    builder.push_bind(author_ids);
    builder.push(")) ranked");

    if let Some(limit) = limit {
        builder.push(" WHERE position <= ");
        builder.push_bind(limit);
    }

    builder.push(" ORDER BY author_id, position");
    builder
}

/// `recipes_limit`: omitted, unparsable or non-positive means unlimited.
pub fn recipes_limit(form: &Form) -> Option<i64> {
    form.get_number::<i64>("recipes_limit").filter(|limit| *limit > 0)
}

fn group_by_key<T, F>(items: Vec<T>, key: F) -> HashMap<Id, Vec<T>>
where
    F: Fn(&T) -> Id,
{
    let mut map: HashMap<Id, Vec<T>> = HashMap::new();
    for item in items {
        map.entry(key(&item)).or_default().push(item);
    }
    map
}

/// Stitches batch loaded authors, tags and ingredient lines onto a page of
/// recipe rows, keeping the row order.
pub fn assemble_recipes(
    rows: Vec<RecipeRow>,
    authors: Vec<UserView>,
    tags: Vec<LinkedRecipeTag>,
    parts: Vec<RecipePart>,
) -> Vec<RecipeView> {
    let authors: HashMap<Id, UserView> = authors.into_iter().map(|a| (a.id, a)).collect();
    let mut tags = group_by_key(tags, |t| t.recipe_id);
    let mut parts = group_by_key(parts, |p| p.recipe_id);

    rows.into_iter()
        .filter_map(|row| {
            let Some(author) = authors.get(&row.author_id).cloned() else {
                log::warn!("Recipe {} lost its author {} mid-request", row.id, row.author_id);
                return None;
            };

            Some(RecipeView {
                id: row.id,
                tags: tags
                    .remove(&row.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Tag::from)
                    .collect(),
                author,
                ingredients: parts.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: row.image,
                text: row.text,
                cooking_time: row.cooking_time,
                created_at: row.created_at,
            })
        })
        .collect()
}

pub fn assemble_authors(rows: Vec<AuthorRow>, recipes: Vec<AuthoredRecipe>) -> Vec<AuthorWithRecipes> {
    let mut recipes = group_by_key(recipes, |r| r.author_id);

    rows.into_iter()
        .map(|row| AuthorWithRecipes {
            recipes: recipes
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(RecipeMinified::from)
                .collect(),
            recipes_count: row.recipes_count,
            author: UserView {
                id: row.id,
                email: row.email,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
                avatar: row.avatar,
                is_subscribed: row.is_subscribed,
            },
        })
        .collect()
}
