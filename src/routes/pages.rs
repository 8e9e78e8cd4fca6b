use std::sync::Arc;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::markdown;
use crate::organizer::{self, Projection, SeriesNavigation};
use crate::posts;
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

// --- View structs ---

pub struct PostView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Sanitized HTML rendered from the markdown body.
    pub content_html: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<TagView>,
    pub series: String,
    pub date: String,
    pub published: bool,
}

pub struct TagView {
    pub name: String,
    pub href: String,
}

pub struct LinkView {
    pub title: String,
    pub slug: String,
}

pub struct TagLink {
    pub label: String,
    pub href: String,
    pub count: usize,
    pub active: bool,
}

pub struct SeriesView {
    pub name: String,
    pub key: String,
    pub posts: Vec<LinkView>,
}

pub struct MonthView {
    pub name: String,
    pub key: String,
    pub posts: Vec<LinkView>,
}

pub struct YearView {
    pub year: i32,
    pub key: String,
    pub count: usize,
    pub months: Vec<MonthView>,
}

pub struct SidebarView {
    pub tags: Vec<TagLink>,
    pub series: Vec<SeriesView>,
    pub archive: Vec<YearView>,
}

pub struct NavView {
    pub series: String,
    pub position: usize,
    pub total: usize,
    pub prev: Option<LinkView>,
    pub next: Option<LinkView>,
}

impl From<&Post> for PostView {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            content_html: markdown::render(&post.content),
            excerpt: post.excerpt.clone().unwrap_or_default(),
            category: post.category.clone().unwrap_or_default(),
            tags: post
                .tags
                .iter()
                .map(|t| TagView {
                    name: t.clone(),
                    href: tag_href(t),
                })
                .collect(),
            series: post.series_name().unwrap_or_default().to_string(),
            date: post.created_or_epoch().format("%B %-d, %Y").to_string(),
            published: post.published,
        }
    }
}

impl From<&Post> for LinkView {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
        }
    }
}

impl From<SeriesNavigation> for NavView {
    fn from(nav: SeriesNavigation) -> Self {
        Self {
            series: nav.series,
            position: nav.position,
            total: nav.total,
            prev: nav.prev.as_ref().map(LinkView::from),
            next: nav.next.as_ref().map(LinkView::from),
        }
    }
}

fn tag_href(tag: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(tag.as_bytes()).collect();
    format!("/?tag={}", encoded)
}

/// Section keys double as localStorage keys in the browser script.
fn section_key(prefix: &str, name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-{}", prefix, slug)
}

fn sidebar(projection: &Projection, selected_tag: Option<&str>) -> SidebarView {
    let tags = projection
        .tags
        .entries()
        .enumerate()
        .map(|(i, (label, count))| {
            let is_all = i == 0;
            TagLink {
                label: label.to_string(),
                href: if is_all { "/".to_string() } else { tag_href(label) },
                count,
                active: if is_all {
                    selected_tag.is_none()
                } else {
                    selected_tag == Some(label)
                },
            }
        })
        .collect();

    let series = projection
        .series
        .iter()
        .map(|group| SeriesView {
            name: group.name.clone(),
            key: section_key("series", &group.name),
            posts: group.posts.iter().map(LinkView::from).collect(),
        })
        .collect();

    let archive = projection
        .archive
        .iter()
        .map(|year| YearView {
            year: year.year,
            key: format!("year-{}", year.year),
            count: year.post_count(),
            months: year
                .months
                .iter()
                .map(|month| MonthView {
                    name: month.name.to_string(),
                    key: format!("month-{}-{:02}", year.year, month.month),
                    posts: month.posts.iter().map(LinkView::from).collect(),
                })
                .collect(),
        })
        .collect();

    SidebarView {
        tags,
        series,
        archive,
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub blog_title: String,
    pub logged_in: bool,
    pub sidebar: SidebarView,
    pub selected_tag: String,
    pub featured: Vec<PostView>,
    pub additional: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub blog_title: String,
    pub logged_in: bool,
    pub sidebar: SidebarView,
    pub post: PostView,
    pub nav: Option<NavView>,
}

#[derive(Template)]
#[template(path = "pages/admin.html")]
pub struct AdminTemplate {
    pub blog_title: String,
    pub logged_in: bool,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/editor.html")]
pub struct EditorTemplate {
    pub blog_title: String,
    pub logged_in: bool,
    pub heading: String,
    /// Empty for a new post.
    pub post_id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: String,
    pub series: String,
    pub series_order: String,
    pub published: bool,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub blog_title: String,
    pub logged_in: bool,
}

#[derive(Deserialize, Default)]
pub struct IndexQuery {
    pub tag: Option<String>,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/posts/{slug}", get(show_post))
        .route("/admin", get(admin))
        .route("/admin/new", get(new_post))
        .route("/admin/edit/{id}", get(edit_post))
        .route("/login", get(login_page))
}

// --- Handlers ---

fn public_projection(state: &AppState) -> AppResult<Arc<Projection>> {
    let published = if state.config.blog.show_drafts {
        None
    } else {
        Some(true)
    };
    state.projections.get_or_try_compute(|| {
        let conn = state.db.get()?;
        posts::list_posts(&conn, published)
    })
}

/// Admin pages need a session only when writes are protected.
fn admin_allowed(state: &AppState, user: &MaybeUser) -> bool {
    !state.config.auth.protect_writes || user.0.is_some()
}

async fn index(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<IndexQuery>,
) -> AppResult<Html<IndexTemplate>> {
    let projection = public_projection(&state)?;
    let selected = query
        .tag
        .as_deref()
        .and_then(crate::db::models::normalize_tag);
    let feed = projection.feed(selected.as_deref(), state.config.blog.featured_count);

    Ok(Html(IndexTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
        sidebar: sidebar(&projection, selected.as_deref()),
        selected_tag: selected.unwrap_or_default(),
        featured: feed.featured.iter().map(PostView::from).collect(),
        additional: feed.additional.iter().map(PostView::from).collect(),
    }))
}

async fn show_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(slug): Path<String>,
) -> AppResult<Html<PostTemplate>> {
    let projection = public_projection(&state)?;

    let post = match projection.find_by_slug(&slug) {
        Some(post) => post.clone(),
        // Drafts are visible to editors only.
        None if admin_allowed(&state, &user) => {
            let conn = state.db.get()?;
            posts::get_post_by_slug(&conn, &slug)?.ok_or(AppError::NotFound)?
        }
        None => return Err(AppError::NotFound),
    };

    let nav = organizer::series_navigation(&projection.posts, &post).map(NavView::from);

    Ok(Html(PostTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
        sidebar: sidebar(&projection, None),
        post: PostView::from(&post),
        nav,
    }))
}

async fn admin(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    if !admin_allowed(&state, &user) {
        return Ok(Redirect::to("/login").into_response());
    }

    let all = {
        let conn = state.db.get()?;
        posts::list_posts(&conn, None)?
    };

    Ok(Html(AdminTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
        posts: all.iter().map(PostView::from).collect(),
    })
    .into_response())
}

async fn new_post(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    if !admin_allowed(&state, &user) {
        return Ok(Redirect::to("/login").into_response());
    }

    Ok(Html(EditorTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
        heading: "New post".to_string(),
        post_id: String::new(),
        title: String::new(),
        slug: String::new(),
        content: String::new(),
        excerpt: String::new(),
        category: String::new(),
        tags: String::new(),
        series: String::new(),
        series_order: String::new(),
        published: false,
    })
    .into_response())
}

async fn edit_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    if !admin_allowed(&state, &user) {
        return Ok(Redirect::to("/login").into_response());
    }

    let post = {
        let conn = state.db.get()?;
        posts::get_post(&conn, id)?.ok_or(AppError::NotFound)?
    };

    Ok(Html(EditorTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
        heading: format!("Edit \u{201c}{}\u{201d}", post.title),
        post_id: post.id.to_string(),
        tags: post.tags.join(", "),
        series_order: post
            .series_order
            .map(|o| o.to_string())
            .unwrap_or_default(),
        excerpt: post.excerpt.unwrap_or_default(),
        category: post.category.unwrap_or_default(),
        series: post.series.unwrap_or_default(),
        title: post.title,
        slug: post.slug,
        content: post.content,
        published: post.published,
    })
    .into_response())
}

async fn login_page(State(state): State<AppState>, user: MaybeUser) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        blog_title: state.config.blog.title.clone(),
        logged_in: user.0.is_some(),
    })
}
