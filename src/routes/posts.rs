use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{NewPost, Post, PostPatch};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, WriteAccess};
use crate::organizer::{self, Projection};
use crate::posts;
use crate::state::AppState;

// --- Query / response types ---

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub published: Option<bool>,
    pub tag: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct OverviewQuery {
    pub published: Option<bool>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub message: String,
    pub post: Post,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/tags", get(list_tags))
        .route("/posts/overview", get(overview))
        .route("/posts/slug/{slug}", get(get_post_by_slug))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Post>>> {
    let all = {
        let conn = state.db.get()?;
        posts::list_posts(&conn, query.published)?
    };

    let selected = match query.tag.as_deref() {
        Some(tag) => organizer::filter_by_tag(&all, Some(tag)),
        None => all,
    };
    Ok(Json(selected))
}

async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::distinct_tags(&conn)?))
}

async fn overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> AppResult<Json<Projection>> {
    let all = {
        let conn = state.db.get()?;
        posts::list_posts(&conn, query.published)?
    };
    Ok(Json(Projection::build(all)))
}

async fn get_post(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    posts::get_post(&conn, id)?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn get_post_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    posts::get_post_by_slug(&conn, &slug)?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create_post(
    State(state): State<AppState>,
    _access: WriteAccess,
    ApiJson(new): ApiJson<NewPost>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = {
        let conn = state.db.get()?;
        posts::create_post(&conn, new)?
    };
    state.posts_changed();
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    _access: WriteAccess,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> AppResult<Json<Post>> {
    let post = {
        let mut conn = state.db.get()?;
        posts::update_post(&mut conn, id, patch)?
    };
    state.posts_changed();
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    _access: WriteAccess,
    Path(id): Path<i64>,
) -> AppResult<Json<DeletedResponse>> {
    let post = {
        let mut conn = state.db.get()?;
        posts::delete_post(&mut conn, id)?
    };
    state.posts_changed();
    Ok(Json(DeletedResponse {
        message: "Post deleted successfully".to_string(),
        post,
    }))
}
