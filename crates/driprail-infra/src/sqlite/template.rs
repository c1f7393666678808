//! SQLite message-template repository implementation.
//!
//! Implements `TemplateRepository` from `driprail-core` using sqlx with
//! split read/write pools. Upserts key on (account_id, name) so re-saving
//! a template replaces its body in place.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use driprail_core::repository::template::TemplateRepository;
use driprail_types::account::AccountId;
use driprail_types::error::RepositoryError;
use driprail_types::template::MessageTemplate;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `TemplateRepository`.
pub struct SqliteTemplateRepository {
    pool: DatabasePool,
}

impl SqliteTemplateRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn template_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<MessageTemplate, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let account_id: String = row
        .try_get("account_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let body: String = row
        .try_get("body")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let description: Option<String> = row
        .try_get("description")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let updated_at: String = row
        .try_get("updated_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(MessageTemplate {
        id: Uuid::parse_str(&id)
            .map_err(|e| RepositoryError::Query(format!("invalid template id: {e}")))?,
        account_id: account_id
            .parse::<AccountId>()
            .map_err(|e| RepositoryError::Query(format!("invalid account id: {e}")))?,
        name,
        body,
        description,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

impl TemplateRepository for SqliteTemplateRepository {
    async fn upsert(&self, template: &MessageTemplate) -> Result<MessageTemplate, RepositoryError> {
        sqlx::query(
            "INSERT INTO templates (id, account_id, name, body, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id, name) DO UPDATE SET
                 body = excluded.body,
                 description = excluded.description,
                 updated_at = excluded.updated_at",
        )
        .bind(template.id.to_string())
        .bind(template.account_id.to_string())
        .bind(&template.name)
        .bind(&template.body)
        .bind(&template.description)
        .bind(format_datetime(&template.created_at))
        .bind(format_datetime(&template.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Re-read so an update returns the original id and created_at.
        self.get_by_name(&template.account_id, &template.name)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_by_name(
        &self,
        account_id: &AccountId,
        name: &str,
    ) -> Result<Option<MessageTemplate>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM templates WHERE account_id = ? AND name = ?")
            .bind(account_id.to_string())
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(template_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<MessageTemplate>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM templates WHERE account_id = ? ORDER BY name ASC")
            .bind(account_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(template_from_row).collect()
    }

    async fn delete(&self, account_id: &AccountId, name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM templates WHERE account_id = ? AND name = ?")
            .bind(account_id.to_string())
            .bind(name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::account::SqliteAccountRepository;
    use crate::sqlite::pool::DatabasePool;
    use driprail_core::repository::account::AccountRepository;
    use driprail_types::account::Account;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn seeded_account(pool: &DatabasePool) -> Account {
        let repo = SqliteAccountRepository::new(pool.clone());
        let account = Account {
            id: AccountId::new(),
            name: "Template Owner".to_string(),
            created_at: Utc::now(),
        };
        repo.create(&account).await.unwrap()
    }

    fn make_template(account_id: &AccountId, name: &str, body: &str) -> MessageTemplate {
        let now = Utc::now();
        MessageTemplate {
            id: Uuid::now_v7(),
            account_id: account_id.clone(),
            name: name.to_string(),
            body: body.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = test_pool().await;
        let account = seeded_account(&pool).await;
        let repo = SqliteTemplateRepository::new(pool);

        let template = make_template(&account.id, "welcome-sms", "Hi {{first_name}}!");
        let stored = repo.upsert(&template).await.unwrap();
        assert_eq!(stored.id, template.id);

        let found = repo
            .get_by_name(&account.id, "welcome-sms")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, "Hi {{first_name}}!");
    }

    #[tokio::test]
    async fn test_upsert_replaces_body_keeps_identity() {
        let pool = test_pool().await;
        let account = seeded_account(&pool).await;
        let repo = SqliteTemplateRepository::new(pool);

        let original = make_template(&account.id, "welcome-sms", "v1");
        repo.upsert(&original).await.unwrap();

        let mut replacement = make_template(&account.id, "welcome-sms", "v2");
        replacement.description = Some("second draft".to_string());
        replacement.updated_at = Utc::now() + chrono::Duration::seconds(1);
        let stored = repo.upsert(&replacement).await.unwrap();

        // Same row: the first insert's id and created_at survive.
        assert_eq!(stored.id, original.id);
        assert_eq!(stored.body, "v2");
        assert_eq!(stored.description.as_deref(), Some("second draft"));
        assert!(stored.updated_at > original.updated_at);
    }

    #[tokio::test]
    async fn test_same_name_different_accounts() {
        let pool = test_pool().await;
        let account_a = seeded_account(&pool).await;
        let account_b = seeded_account(&pool).await;
        let repo = SqliteTemplateRepository::new(pool);

        repo.upsert(&make_template(&account_a.id, "welcome-sms", "from A"))
            .await
            .unwrap();
        repo.upsert(&make_template(&account_b.id, "welcome-sms", "from B"))
            .await
            .unwrap();

        let a = repo
            .get_by_name(&account_a.id, "welcome-sms")
            .await
            .unwrap()
            .unwrap();
        let b = repo
            .get_by_name(&account_b.id, "welcome-sms")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.body, "from A");
        assert_eq!(b.body, "from B");
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let pool = test_pool().await;
        let account = seeded_account(&pool).await;
        let repo = SqliteTemplateRepository::new(pool);

        for name in ["winback", "abandoned-cart", "welcome-sms"] {
            repo.upsert(&make_template(&account.id, name, "body"))
                .await
                .unwrap();
        }

        let listed = repo.list_by_account(&account.id).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["abandoned-cart", "welcome-sms", "winback"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = test_pool().await;
        let account = seeded_account(&pool).await;
        let repo = SqliteTemplateRepository::new(pool);

        repo.upsert(&make_template(&account.id, "welcome-sms", "body"))
            .await
            .unwrap();
        repo.delete(&account.id, "welcome-sms").await.unwrap();

        assert!(
            repo.get_by_name(&account.id, "welcome-sms")
                .await
                .unwrap()
                .is_none()
        );

        let err = repo.delete(&account.id, "welcome-sms").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
