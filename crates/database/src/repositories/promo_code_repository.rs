use crate::pool::DbPool;
use async_trait::async_trait;
use services::billing::{DiscountType, PromoCode, PromoCodeRepository};

pub struct PostgresPromoCodeRepository {
    pool: DbPool,
}

impl PostgresPromoCodeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromoCodeRepository for PostgresPromoCodeRepository {
    async fn get_promo_code(&self, code: &str) -> anyhow::Result<Option<PromoCode>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT code, discount_type, discount_value, active, expires_at
                 FROM promo_codes
                 WHERE UPPER(code) = UPPER($1)",
                &[&code],
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let discount_type_str: String = row.get(1);
        let discount_type = match discount_type_str.as_str() {
            "percentage" => DiscountType::Percentage,
            "fixed" => DiscountType::Fixed,
            other => anyhow::bail!("Unknown discount_type '{}' for promo code", other),
        };

        Ok(Some(PromoCode {
            code: row.get(0),
            discount_type,
            discount_value: row.get(2),
            active: row.get(3),
            expires_at: row.get(4),
        }))
    }
}
