//! # Promotion Repository
//!
//! Campaign storage and product assignment.
//!
//! ## Assignment Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.campaign_code is the single reference a product carries.     │
//! │                                                                         │
//! │  apply_to_products(C2, [p1, p2])                                       │
//! │     p1: C1 ──► C2      (replaced, never stacked)                       │
//! │     p2: —  ──► C2                                                      │
//! │                                                                         │
//! │  remove_from_product(C2, p1)          p1: C2 ──► —                     │
//! │  remove_all_from_campaign(C2, [..])   only rows still pointing at C2   │
//! │                                                                         │
//! │  Every bulk change runs in one transaction: an unknown product id      │
//! │  rolls back the whole batch.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expired campaigns stay assigned; pricing reads them as 0%.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::decode_percent;
use pharmacy_core::cart::{CartLine, LinePromotions};
use pharmacy_core::promotion::{normalize_product_ids, PromotionCampaign};

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    code: String,
    name: String,
    percent: i64,
    unit_label: Option<String>,
    starts_on: NaiveDate,
    ends_on: NaiveDate,
}

impl TryFrom<CampaignRow> for PromotionCampaign {
    type Error = DbError;

    fn try_from(row: CampaignRow) -> DbResult<Self> {
        Ok(PromotionCampaign {
            code: row.code,
            name: row.name,
            percent: decode_percent("promotion_campaigns.percent", row.percent)?,
            unit_label: row.unit_label,
            starts_on: row.starts_on,
            ends_on: row.ends_on,
        })
    }
}

/// Repository for promotion campaigns.
#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Stores a new campaign (window end must be after start, 1–100%).
    pub async fn create(&self, campaign: &PromotionCampaign) -> DbResult<()> {
        campaign.validate().map_err(|e| DbError::Domain(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO promotion_campaigns (code, name, percent, unit_label, starts_on, ends_on, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(campaign.code.trim())
        .bind(campaign.name.trim())
        .bind(i64::from(campaign.percent.value()))
        .bind(&campaign.unit_label)
        .bind(campaign.starts_on)
        .bind(campaign.ends_on)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(campaign = %campaign.code, percent = %campaign.percent, "Campaign created");
        Ok(())
    }

    pub async fn get(&self, code: &str) -> DbResult<Option<PromotionCampaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT code, name, percent, unit_label, starts_on, ends_on
            FROM promotion_campaigns
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PromotionCampaign::try_from).transpose()
    }

    /// All campaigns, newest window first.
    pub async fn list(&self) -> DbResult<Vec<PromotionCampaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT code, name, percent, unit_label, starts_on, ends_on
            FROM promotion_campaigns
            ORDER BY starts_on DESC, code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PromotionCampaign::try_from).collect()
    }

    /// The campaign a product currently points at, expired or not.
    pub async fn campaign_for_product(&self, product_id: &str) -> DbResult<Option<PromotionCampaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT c.code, c.name, c.percent, c.unit_label, c.starts_on, c.ends_on
            FROM products p
            JOIN promotion_campaigns c ON c.code = p.campaign_code
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PromotionCampaign::try_from).transpose()
    }

    /// Effective campaign percentage for each line on `today`.
    ///
    /// Lines whose product has no running campaign for their unit are absent.
    pub async fn line_promotions<'a, I>(&self, lines: I, today: NaiveDate) -> DbResult<LinePromotions>
    where
        I: IntoIterator<Item = &'a CartLine>,
    {
        let mut promotions = LinePromotions::new();
        for line in lines {
            if let Some(campaign) = self.campaign_for_product(&line.product_id).await? {
                if let Some(pct) = campaign.percent_for(&line.unit_label, today) {
                    promotions.insert(line.key(), pct);
                }
            }
        }
        Ok(promotions)
    }

    /// Points every product in `product_ids` at `campaign_code`, replacing
    /// whatever campaign each pointed at before.
    ///
    /// ## Returns
    /// Number of products assigned.
    pub async fn apply_to_products(&self, campaign_code: &str, product_ids: &[String]) -> DbResult<u64> {
        let ids = normalize_product_ids(product_ids).map_err(|e| DbError::Domain(e.into()))?;
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> =
            sqlx::query_scalar("SELECT code FROM promotion_campaigns WHERE code = ?1")
                .bind(campaign_code)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(DbError::not_found("PromotionCampaign", campaign_code));
        }

        let now = Utc::now();
        for id in &ids {
            let result = sqlx::query(
                "UPDATE products SET campaign_code = ?1, updated_at = ?2 WHERE id = ?3",
            )
            .bind(campaign_code)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(product_id = %id, "Unknown product in assignment, rolling back");
                return Err(DbError::not_found("Product", id.as_str()));
            }
        }

        tx.commit().await?;
        info!(campaign = %campaign_code, products = ids.len(), "Campaign assigned");
        Ok(ids.len() as u64)
    }

    /// Clears the product's campaign if it is still `campaign_code`.
    ///
    /// ## Returns
    /// Whether a reference was cleared.
    pub async fn remove_from_product(&self, campaign_code: &str, product_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET campaign_code = NULL, updated_at = ?1
            WHERE id = ?2 AND campaign_code = ?3
            "#,
        )
        .bind(Utc::now())
        .bind(product_id)
        .bind(campaign_code)
        .execute(&self.pool)
        .await?;

        let cleared = result.rows_affected() > 0;
        debug!(campaign = %campaign_code, product_id = %product_id, cleared, "Campaign removed from product");
        Ok(cleared)
    }

    /// Clears `campaign_code` from each listed product still pointing at it.
    ///
    /// Products reassigned to another campaign in the meantime keep it.
    pub async fn remove_all_from_campaign(
        &self,
        campaign_code: &str,
        product_ids: &[String],
    ) -> DbResult<u64> {
        let ids = normalize_product_ids(product_ids).map_err(|e| DbError::Domain(e.into()))?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut cleared = 0;

        for id in &ids {
            let result = sqlx::query(
                r#"
                UPDATE products SET campaign_code = NULL, updated_at = ?1
                WHERE id = ?2 AND campaign_code = ?3
                "#,
            )
            .bind(now)
            .bind(id)
            .bind(campaign_code)
            .execute(&mut *tx)
            .await?;
            cleared += result.rows_affected();
        }

        tx.commit().await?;
        info!(campaign = %campaign_code, cleared, "Campaign removed from products");
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;
    use pharmacy_core::cart::Cart;
    use pharmacy_core::Percent;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn campaign(code: &str, pct: u8) -> PromotionCampaign {
        PromotionCampaign {
            code: code.to_string(),
            name: format!("Khuyến mãi {code}"),
            percent: Percent::new(pct).unwrap(),
            unit_label: None,
            starts_on: day(6, 1),
            ends_on: day(6, 30),
        }
    }

    #[tokio::test]
    async fn test_last_assignment_wins() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.promotions().create(&campaign("KM10", 10)).await.unwrap();
        db.promotions().create(&campaign("KM20", 20)).await.unwrap();

        let ids = vec![product.id.clone()];
        db.promotions().apply_to_products("KM10", &ids).await.unwrap();
        db.promotions().apply_to_products("KM20", &ids).await.unwrap();

        let current = db.promotions().campaign_for_product(&product.id).await.unwrap().unwrap();
        assert_eq!(current.code, "KM20");
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.campaign_code.as_deref(), Some("KM20"));
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_batch() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.promotions().create(&campaign("KM10", 10)).await.unwrap();

        let ids = vec![product.id.clone(), "ghost".to_string()];
        let err = db.promotions().apply_to_products("KM10", &ids).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        assert!(db.promotions().campaign_for_product(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_not_found() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        let err = db
            .promotions()
            .apply_to_products("NOPE", &[product.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_only_clears_matching_campaign() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.promotions().create(&campaign("KM10", 10)).await.unwrap();
        db.promotions().create(&campaign("KM20", 20)).await.unwrap();
        db.promotions()
            .apply_to_products("KM20", &[product.id.clone()])
            .await
            .unwrap();

        assert!(!db.promotions().remove_from_product("KM10", &product.id).await.unwrap());
        assert_eq!(
            db.promotions()
                .remove_all_from_campaign("KM20", &[product.id.clone()])
                .await
                .unwrap(),
            1
        );
        assert!(db.promotions().campaign_for_product(&product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_campaign_gives_no_line_discount() {
        let (db, product) = fixtures::with_stocked_product("PARA-500", 100_000, 5).await;
        db.promotions().create(&campaign("KM20", 20)).await.unwrap();
        db.promotions()
            .apply_to_products("KM20", &[product.id.clone()])
            .await
            .unwrap();

        let mut cart = Cart::for_user("u1", Vec::new());
        cart.add_or_increment(&product, "Hộp", 2).unwrap();

        let running = db.promotions().line_promotions(cart.lines(), day(6, 15)).await.unwrap();
        assert_eq!(running.values().next().map(|p| p.value()), Some(20));

        let expired = db.promotions().line_promotions(cart.lines(), day(7, 1)).await.unwrap();
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_window_refused() {
        let db = fixtures::database().await;
        let mut bad = campaign("KM10", 10);
        bad.ends_on = bad.starts_on;
        assert!(db.promotions().create(&bad).await.is_err());
        assert!(db.promotions().list().await.unwrap().is_empty());
    }
}
