//! # Voucher Repository
//!
//! Voucher storage and the atomic redemption counter.
//!
//! ## Redemption
//! ```text
//! UPDATE vouchers
//! SET remaining = remaining - 1
//! WHERE code = ? AND remaining > 0 AND expires_on >= today
//!
//!   1 row  ──► redeemed
//!   0 rows ──► VoucherUnavailable (expired, used up, or unknown)
//! ```
//!
//! Two checkouts racing for the last use cannot both pass: the second
//! UPDATE sees `remaining = 0`.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{decode_percent, money};
use pharmacy_core::voucher::{Voucher, VoucherKind};
use pharmacy_core::CoreError;

#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    code: String,
    kind: String,
    magnitude: i64,
    remaining: i64,
    expires_on: NaiveDate,
}

impl TryFrom<VoucherRow> for Voucher {
    type Error = DbError;

    fn try_from(row: VoucherRow) -> DbResult<Self> {
        let kind = match row.kind.as_str() {
            "Percentage" => VoucherKind::Percentage(decode_percent("vouchers.magnitude", row.magnitude)?),
            "Fixed" => VoucherKind::Fixed(money(row.magnitude)),
            other => {
                return Err(DbError::CorruptValue {
                    column: "vouchers.kind".to_string(),
                    value: other.to_string(),
                })
            }
        };
        Ok(Voucher {
            code: row.code,
            kind,
            remaining: row.remaining,
            expires_on: row.expires_on,
        })
    }
}

fn kind_columns(kind: &VoucherKind) -> (&'static str, i64) {
    match kind {
        VoucherKind::Percentage(pct) => ("Percentage", i64::from(pct.value())),
        VoucherKind::Fixed(amount) => ("Fixed", amount.minor()),
    }
}

/// Decrements `remaining` by one inside the caller's transaction.
pub(crate) async fn redeem_in(
    conn: &mut SqliteConnection,
    code: &str,
    today: NaiveDate,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE vouchers
        SET remaining = remaining - 1
        WHERE code = ?1 AND remaining > 0 AND expires_on >= ?2
        "#,
    )
    .bind(code)
    .bind(today)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(voucher = %code, "Voucher redemption refused");
        return Err(CoreError::VoucherUnavailable {
            code: code.to_string(),
            reason: "expired, used up, or unknown".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Repository for vouchers.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    /// Stores a new voucher after checking its invariants.
    pub async fn create(&self, voucher: &Voucher) -> DbResult<()> {
        voucher.validate().map_err(|e| DbError::Domain(e.into()))?;
        let (kind, magnitude) = kind_columns(&voucher.kind);

        sqlx::query(
            r#"
            INSERT INTO vouchers (code, kind, magnitude, remaining, expires_on)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(voucher.code.trim())
        .bind(kind)
        .bind(magnitude)
        .bind(voucher.remaining)
        .bind(voucher.expires_on)
        .execute(&self.pool)
        .await?;

        info!(voucher = %voucher.code, kind, magnitude, remaining = voucher.remaining, "Voucher created");
        Ok(())
    }

    pub async fn get(&self, code: &str) -> DbResult<Option<Voucher>> {
        let row = sqlx::query_as::<_, VoucherRow>(
            "SELECT code, kind, magnitude, remaining, expires_on FROM vouchers WHERE code = ?1",
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Voucher::try_from).transpose()
    }

    /// Redeems one use outside of an order (e.g. in-store).
    pub async fn redeem(&self, code: &str, today: NaiveDate) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        redeem_in(&mut conn, code.trim(), today).await
    }
}
