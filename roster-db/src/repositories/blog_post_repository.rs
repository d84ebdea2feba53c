use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roster_core::models::blog::BlogPost;
use sqlx::SqlitePool;

type BlogPostRow = (
    i64,
    String,
    String,
    String,
    i64,
    bool,
    DateTime<Utc>,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

const POST_COLUMNS: &str =
    "id, title, slug, text, author_id, published, publication_date, sticky, created_at, updated_at";

fn from_row(row: BlogPostRow) -> BlogPost {
    let (id, title, slug, text, author_id, published, publication_date, sticky, created_at, updated_at) =
        row;
    BlogPost {
        id: Some(id),
        title,
        slug,
        text,
        author_id,
        published,
        publication_date,
        sticky,
        created_at,
        updated_at,
    }
}

pub struct BlogPostRepository {
    pool: SqlitePool,
}

impl BlogPostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, post: &BlogPost) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO blog_posts
                (title, slug, text, author_id, published, publication_date,
                 sticky, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.text)
        .bind(post.author_id)
        .bind(post.published)
        .bind(post.publication_date)
        .bind(post.sticky)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create blog post")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn update(&self, post: &BlogPost) -> Result<()> {
        let id = post.id.context("Cannot update a blog post without an id")?;

        sqlx::query(
            r#"
            UPDATE blog_posts SET
                title = ?, slug = ?, text = ?, published = ?,
                publication_date = ?, sticky = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.text)
        .bind(post.published)
        .bind(post.publication_date)
        .bind(post.sticky)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update blog post")?;

        Ok(())
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let row = sqlx::query_as::<_, BlogPostRow>(&format!(
            "SELECT {} FROM blog_posts WHERE slug = ?",
            POST_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find blog post")?;

        Ok(row.map(from_row))
    }

    /// A post as anonymous visitors may see it: published, and not scheduled
    /// for the future.
    pub async fn find_public_by_slug(
        &self,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BlogPost>> {
        let row = sqlx::query_as::<_, BlogPostRow>(&format!(
            "SELECT {} FROM blog_posts
             WHERE slug = ? AND published = 1 AND publication_date < ?",
            POST_COLUMNS
        ))
        .bind(slug)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find public blog post")?;

        Ok(row.map(from_row))
    }

    /// Front-page ordering: sticky posts first, then newest first.
    pub async fn list_public(&self, now: DateTime<Utc>) -> Result<Vec<BlogPost>> {
        let rows = sqlx::query_as::<_, BlogPostRow>(&format!(
            "SELECT {} FROM blog_posts
             WHERE published = 1 AND publication_date < ?
             ORDER BY sticky DESC, publication_date DESC",
            POST_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list blog posts")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    /// Feed ordering ignores stickiness: strictly newest first.
    pub async fn list_latest(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<BlogPost>> {
        let rows = sqlx::query_as::<_, BlogPostRow>(&format!(
            "SELECT {} FROM blog_posts
             WHERE published = 1 AND publication_date < ?
             ORDER BY publication_date DESC
             LIMIT ?",
            POST_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list latest blog posts")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM blog_posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete blog post")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::open_memory;
    use crate::repositories::UserRepository;
    use chrono::Duration;
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
        let repo = BlogPostRepository::new(pool);

        let post = BlogPost::new("Server Maintenance", "Downtime on Sunday.", author_id);
        let id = repo.create(&post).await?;

        let found = repo.find_by_slug("server-maintenance").await?.unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.title, "Server Maintenance");

        Ok(())
    }

    #[tokio::test]
    async fn test_public_visibility() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = BlogPostRepository::new(pool);
        let now = Utc::now();

        let mut draft = BlogPost::new("Draft", "text", author_id);
        draft.published = false;
        repo.create(&draft).await?;

        let mut scheduled = BlogPost::new("Scheduled", "text", author_id);
        scheduled.publication_date = now + Duration::days(1);
        repo.create(&scheduled).await?;

        let mut live = BlogPost::new("Live", "text", author_id);
        live.publication_date = now - Duration::minutes(1);
        repo.create(&live).await?;

        assert!(repo.find_public_by_slug("draft", now).await?.is_none());
        assert!(repo.find_public_by_slug("scheduled", now).await?.is_none());
        assert!(repo.find_public_by_slug("live", now).await?.is_some());

        // The unpublished ones are still reachable for editing.
        assert!(repo.find_by_slug("draft").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_sticky_first_ordering() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = BlogPostRepository::new(pool);
        let now = Utc::now();

        let mut older_sticky = BlogPost::new("Welcome", "text", author_id);
        older_sticky.publication_date = now - Duration::days(30);
        older_sticky.sticky = true;
        repo.create(&older_sticky).await?;

        let mut newer = BlogPost::new("News", "text", author_id);
        newer.publication_date = now - Duration::days(1);
        repo.create(&newer).await?;

        let posts = repo.list_public(now).await?;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].slug, "welcome");
        assert_eq!(posts[1].slug, "news");

        // Feeds ignore stickiness.
        let latest = repo.list_latest(now, 10).await?;
        assert_eq!(latest[0].slug, "news");

        Ok(())
    }

    #[tokio::test]
    async fn test_update() -> Result<()> {
        let pool = open_memory().await?;
        let author_id = create_author(&pool).await?;
        let repo = BlogPostRepository::new(pool);

        let mut post = BlogPost::new("Old Title", "text", author_id);
        let id = repo.create(&post).await?;
        post.id = Some(id);

        post.set_title("New Title");
        post.sticky = true;
        repo.update(&post).await?;

        assert!(repo.find_by_slug("old-title").await?.is_none());
        let found = repo.find_by_slug("new-title").await?.unwrap();
        assert!(found.sticky);

        Ok(())
    }
}
