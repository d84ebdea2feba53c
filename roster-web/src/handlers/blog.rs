use axum::{
    extract::{Path, State},
    response::Html,
};
use chrono::Utc;
use roster_db::repositories::BlogPostRepository;

use crate::{
    auth::OptionalUser,
    error::AppError,
    handlers::shared::{base_context, render},
    state::AppState,
};

/// Front page: public posts, sticky first, newest first.
pub async fn index(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
) -> Result<Html<String>, AppError> {
    let posts = BlogPostRepository::new(state.db.clone())
        .list_public(Utc::now())
        .await?;

    let mut context = base_context(current.as_ref());
    context.insert("posts", &posts);
    render(&state, "index.html", &context)
}

pub async fn show_post(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = BlogPostRepository::new(state.db.clone())
        .find_public_by_slug(&slug, Utc::now())
        .await?
        .ok_or_else(|| AppError::not_found("No such post"))?;

    let mut context = base_context(current.as_ref());
    context.insert("post", &post);
    render(&state, "post.html", &context)
}
