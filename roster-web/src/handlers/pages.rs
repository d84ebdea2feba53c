use axum::{
    extract::{Path, State},
    response::Html,
};
use roster_db::repositories::PageRepository;

use crate::{
    auth::OptionalUser,
    error::AppError,
    handlers::shared::{base_context, render},
    state::AppState,
};

pub async fn show(
    State(state): State<AppState>,
    OptionalUser(current): OptionalUser,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let page = PageRepository::new(state.db.clone())
        .find_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("No such page"))?;

    let mut context = base_context(current.as_ref());
    context.insert("page", &page);
    render(&state, "page.html", &context)
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{create_test_state, create_test_user, test_server};
    use anyhow::Result;
    use roster_core::models::blog::Page;
    use roster_db::repositories::PageRepository;

    #[tokio::test]
    async fn test_page_shown() -> Result<()> {
        let state = create_test_state().await?;
        let author_id = create_test_user(&state, "admin@example.com", "pw12345678").await?;
        let page = Page::new("Privacy Policy", "We keep *nothing*.", author_id);
        PageRepository::new(state.db.clone()).create(&page).await?;

        let server = test_server(state)?;
        let response = server.get("/p/privacy-policy").await;
        response.assert_status_ok();
        response.assert_text_contains("<em>nothing</em>");

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_page_is_404() -> Result<()> {
        let state = create_test_state().await?;
        let server = test_server(state)?;
        server.get("/p/missing").await.assert_status_not_found();
        Ok(())
    }
}
