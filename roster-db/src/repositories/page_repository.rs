use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::blog::Page;
use sqlx::SqlitePool;

type PageRow = (
    i64,
    String,
    String,
    String,
    i64,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

const PAGE_COLUMNS: &str = "id, title, slug, text, author_id, published, created_at, updated_at";

fn from_row(row: PageRow) -> Page {
    let (id, title, slug, text, author_id, published, created_at, updated_at) = row;
    Page {
        id: Some(id),
        title,
        slug,
        text,
        author_id,
        published,
        created_at,
        updated_at,
    }
}

pub struct PageRepository {
    pool: SqlitePool,
}

impl PageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, page: &Page) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO pages (title, slug, text, author_id, published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.text)
        .bind(page.author_id)
        .bind(page.published)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create page")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(&self, page: &Page) -> Result<()> {
        let id = page.id.context("Cannot update a page without an id")?;

        sqlx::query(
            "UPDATE pages SET title = ?, slug = ?, text = ?, published = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.text)
        .bind(page.published)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update page")?;

        Ok(())
    }

    pub async fn find_published_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE slug = ? AND published = 1",
            PAGE_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page")?;

        Ok(row.map(from_row))
    }

    pub async fn list_published(&self) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE published = 1 ORDER BY title",
            PAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pages")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::open_memory;
    use crate::repositories::UserRepository;
    use pretty_assertions::assert_eq;
    use roster_core::models::jid::Jid;
    use roster_core::models::user::User;

    async fn create_author(pool: &SqlitePool) -> Result<i64> {
        let user = User::new(
            Jid::parse("admin@example.com").unwrap(),
            None,
            "password123",
        )?;
        UserRepository::new(pool.clone()).create(&user).await
    }

    #[tokio::test]
    async fn test_create_and_find() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = PageRepository::new(pool);

        let page = Page::new("Privacy Policy", "We keep nothing.", author_id);
        repo.create(&page).await?;

        let found = repo.find_published_by_slug("privacy-policy").await?.unwrap();
        assert_eq!(found.title, "Privacy Policy");

        Ok(())
    }

    #[tokio::test]
    async fn test_unpublished_hidden() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = PageRepository::new(pool);

        let mut page = Page::new("Internal Notes", "wip", author_id);
        page.published = false;
        repo.create(&page).await?;

        assert!(repo.find_published_by_slug("internal-notes").await?.is_none());
        assert!(repo.list_published().await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_update() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = PageRepository::new(pool);

        let mut page = Page::new("FAQ", "v1", author_id);
        let id = repo.create(&page).await?;
        page.id = Some(id);

        page.text = "v2".to_string();
        repo.update(&page).await?;

        let found = repo.find_published_by_slug("faq").await?.unwrap();
        assert_eq!(found.text, "v2");

        Ok(())
    }
}
