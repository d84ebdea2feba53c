use axum::{extract::State, http::header, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use roster_core::models::blog::BlogPost;
use roster_db::repositories::BlogPostRepository;

use crate::{error::AppError, state::AppState};

const FEED_LIMIT: i64 = 20;

/// Atom feed of the latest posts. Stickiness does not affect feed order.
pub async fn atom(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let posts = BlogPostRepository::new(state.db.clone())
        .list_latest(Utc::now(), FEED_LIMIT)
        .await?;

    let xml = build_feed(&state.config.canonical_base_url, &posts);

    Ok((
        [(header::CONTENT_TYPE, "application/atom+xml")],
        xml,
    ))
}

fn build_feed(base_url: &str, posts: &[BlogPost]) -> String {
    let updated = posts
        .first()
        .map(|p| p.publication_date)
        .unwrap_or_else(Utc::now);

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    xml.push_str("  <title>News</title>\n");
    xml.push_str(&format!("  <id>{}/</id>\n", escape(base_url)));
    xml.push_str(&format!(
        "  <link href=\"{}/feed/atom\" rel=\"self\"/>\n",
        escape(base_url)
    ));
    xml.push_str(&format!(
        "  <updated>{}</updated>\n",
        updated.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    for post in posts {
        let url = format!("{}/blog/{}", base_url, post.slug);
        xml.push_str("  <entry>\n");
        xml.push_str(&format!("    <title>{}</title>\n", escape(&post.title)));
        xml.push_str(&format!("    <id>{}</id>\n", escape(&url)));
        xml.push_str(&format!("    <link href=\"{}\"/>\n", escape(&url)));
        xml.push_str(&format!(
            "    <updated>{}</updated>\n",
            post.publication_date.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        xml.push_str(&format!(
            "    <content type=\"html\">{}</content>\n",
            escape(&crate::markdown::markdown_to_html(&post.text))
        ));
        xml.push_str("  </entry>\n");
    }

    xml.push_str("</feed>\n");
    xml
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
