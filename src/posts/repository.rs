// All SQL touching the posts table lives here.
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{
    format_timestamp, normalize_tags, parse_timestamp, NewPost, Post, PostPatch,
};
use crate::error::{is_unique_violation, AppError, AppResult};

const POST_COLUMNS: &str = "id, title, slug, content, excerpt, category, tags, series, \
                            series_order, published, created_at, updated_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let tags_json: String = row.get(6)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let created_at: Option<String> = row.get(10)?;
    let updated_at: Option<String> = row.get(11)?;

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        category: row.get(5)?,
        tags,
        series: row.get(7)?,
        series_order: row.get(8)?,
        published: row.get(9)?,
        created_at: created_at.as_deref().and_then(parse_timestamp),
        updated_at: updated_at.as_deref().and_then(parse_timestamp),
    })
}

fn slug_conflict(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("A post with this slug already exists".into())
    } else {
        AppError::Database(err)
    }
}

/// Newest first. `published` restricts to published posts or drafts.
pub fn list_posts(conn: &Connection, published: Option<bool>) -> AppResult<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts
         WHERE (?1 IS NULL OR published = ?1)
         ORDER BY created_at DESC, id DESC",
        POST_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![published], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn get_post(conn: &Connection, id: i64) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
            params![id],
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

pub fn get_post_by_slug(conn: &Connection, slug: &str) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            &format!("SELECT {} FROM posts WHERE slug = ?1", POST_COLUMNS),
            params![slug],
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

/// Distinct tags across all posts, ascending.
pub fn distinct_tags(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT tag.value FROM posts, json_each(posts.tags) AS tag
         ORDER BY tag.value ASC",
    )?;
    let tags = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tags)
}

pub fn create_post(conn: &Connection, new: NewPost) -> AppResult<Post> {
    let missing: Vec<&str> = [
        ("title", &new.title),
        ("slug", &new.slug),
        ("content", &new.content),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
    .map(|(field, _)| field)
    .collect();
    if !missing.is_empty() {
        return Err(missing_fields(&missing));
    }

    let title = new.title.as_deref().unwrap_or_default().trim().to_string();
    let slug = new.slug.as_deref().unwrap_or_default().trim().to_string();
    validate_slug(&slug)?;
    let content = new.content.clone().unwrap_or_default();

    let now = format_timestamp(Utc::now());
    let tags = serde_json::to_string(&normalize_tags(&new.tags))?;

    conn.execute(
        "INSERT INTO posts (title, slug, content, excerpt, category, tags, series,
                            series_order, published, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            title,
            slug,
            content,
            clean_optional(new.excerpt),
            clean_optional(new.category),
            tags,
            clean_optional(new.series),
            new.series_order,
            new.published,
            now,
        ],
    )
    .map_err(slug_conflict)?;

    let id = conn.last_insert_rowid();
    tracing::info!("Created post {} ({})", id, slug);
    get_post(conn, id)?.ok_or_else(|| AppError::Internal("Created post vanished".into()))
}

/// Apply `patch` field by field to the stored post. Refreshes `updated_at`
/// unless the patch sets nothing.
pub fn update_post(conn: &mut Connection, id: i64, patch: PostPatch) -> AppResult<Post> {
    let tx = conn.transaction()?;

    let mut post = get_post(&tx, id)?.ok_or(AppError::NotFound)?;
    if patch.is_empty() {
        return Ok(post);
    }

    patch.apply(&mut post);
    post.title = required(&post.title, "title")?;
    post.slug = required(&post.slug, "slug")?;
    validate_slug(&post.slug)?;
    if post.content.trim().is_empty() {
        return Err(AppError::BadRequest("content cannot be empty".into()));
    }
    post.excerpt = clean_optional(post.excerpt.take());
    post.category = clean_optional(post.category.take());
    post.series = clean_optional(post.series.take());

    let now = Utc::now();
    tx.execute(
        "UPDATE posts SET title = ?1, slug = ?2, content = ?3, excerpt = ?4, category = ?5,
                          tags = ?6, series = ?7, series_order = ?8, published = ?9,
                          updated_at = ?10
         WHERE id = ?11",
        params![
            post.title,
            post.slug,
            post.content,
            post.excerpt,
            post.category,
            serde_json::to_string(&post.tags)?,
            post.series,
            post.series_order,
            post.published,
            format_timestamp(now),
            id,
        ],
    )
    .map_err(slug_conflict)?;
    tx.commit()?;

    post.updated_at = Some(now);
    tracing::info!("Updated post {}", id);
    Ok(post)
}

/// Delete and return the post.
pub fn delete_post(conn: &mut Connection, id: i64) -> AppResult<Post> {
    let tx = conn.transaction()?;
    let post = get_post(&tx, id)?.ok_or(AppError::NotFound)?;
    tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    tx.commit()?;

    tracing::info!("Deleted post {} ({})", id, post.slug);
    Ok(post)
}

fn required(value: &str, field: &str) -> AppResult<String> {
    match value.trim() {
        "" => Err(AppError::BadRequest(format!("{} cannot be empty", field))),
        v => Ok(v.to_string()),
    }
}

/// Slugs are single URL path segments: lowercase ASCII letters, digits and `-`.
pub fn validate_slug(slug: &str) -> AppResult<()> {
    let valid = !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid slug {:?}: use only lowercase letters, digits and '-'",
            slug
        )))
    }
}

fn missing_fields(fields: &[&str]) -> AppError {
    AppError::BadRequest(format!("Missing required fields: {}", fields.join(", ")))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
