//! Repository for the `campaigns` and `campaign_errors` tables.
//!
//! Only the dispatcher moves a campaign past `Queued`; query endpoints read
//! and delete.

use chrono::Utc;

use super::models::{Campaign, CampaignError, CampaignStatus, DbId, NewCampaign};
use super::DbPool;

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, template_name, template_body, status, recipient_count, \
    success_count, error_count, scheduled_at, created_at, user_id";

/// Provides CRUD operations for campaigns and their error records.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Insert a new campaign in the `Queued` state.
    pub async fn create(pool: &DbPool, input: &NewCampaign) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns \
             (template_name, template_body, status, recipient_count, scheduled_at, created_at, user_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(&input.template_name)
            .bind(&input.template_body)
            .bind(CampaignStatus::Queued.as_str())
            .bind(input.recipient_count)
            .bind(input.scheduled_at)
            .bind(Utc::now())
            .bind(input.user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = ?");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a campaign only if it belongs to `user_id`.
    pub async fn find_owned(
        pool: &DbPool,
        id: DbId,
        user_id: DbId,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = ? AND user_id = ?");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's campaigns, newest first.
    pub async fn list_for_user(pool: &DbPool, user_id: DbId) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaigns WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Move a campaign from `Queued` to `Processing`.
    ///
    /// Returns `false` when the campaign is missing or already left `Queued`,
    /// which is what keeps a second delivery of the same job from sending twice.
    pub async fn mark_processing(pool: &DbPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE campaigns SET status = ? WHERE id = ? AND status = ?")
            .bind(CampaignStatus::Processing.as_str())
            .bind(id)
            .bind(CampaignStatus::Queued.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Set the status without touching the counters.
    pub async fn set_status(
        pool: &DbPool,
        id: DbId,
        status: CampaignStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Append one failed-send record.
    pub async fn record_error(
        pool: &DbPool,
        campaign_id: DbId,
        phone: &str,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO campaign_errors (campaign_id, recipient_phone, error_message) \
             VALUES (?, ?, ?)",
        )
        .bind(campaign_id)
        .bind(phone)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Write the final counters and terminal status in a single statement.
    pub async fn complete(
        pool: &DbPool,
        id: DbId,
        success_count: i64,
        error_count: i64,
        status: CampaignStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaigns SET success_count = ?, error_count = ?, status = ? WHERE id = ?",
        )
        .bind(success_count)
        .bind(error_count)
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Error records of a campaign in insertion order.
    pub async fn list_errors(
        pool: &DbPool,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignError>, sqlx::Error> {
        sqlx::query_as::<_, CampaignError>(
            "SELECT id, campaign_id, recipient_phone, error_message \
             FROM campaign_errors WHERE campaign_id = ? ORDER BY id",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
    }

    /// Delete a campaign owned by `user_id` together with its error records.
    ///
    /// Returns `false` if no such campaign exists for that user.
    pub async fn delete_owned(pool: &DbPool, id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owned: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM campaigns WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM campaign_errors WHERE campaign_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
