//! Aggregate queries backing the analytics endpoints

use sqlx::Row;

use super::Repository;
use crate::error::AppResult;

/// Equipment attribute used for grouped counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Category,
    Status,
    Manufacturer,
    Location,
    PurchaseYear,
}

impl Dimension {
    fn label_expr(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Status => "status",
            Dimension::Manufacturer => "COALESCE(NULLIF(manufacturer, ''), 'Unknown')",
            Dimension::Location => "COALESCE(NULLIF(location, ''), 'Unknown')",
            Dimension::PurchaseYear => {
                "COALESCE(EXTRACT(YEAR FROM purchase_date)::int::text, 'Unknown')"
            }
        }
    }
}

impl Repository {
    pub async fn analytics_total_equipment(&self) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipment")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Equipment counts grouped by `dimension`, largest first
    pub async fn analytics_count_by(&self, dimension: Dimension) -> AppResult<Vec<(String, i64)>> {
        let sql = format!(
            "SELECT {expr} AS label, COUNT(*) AS value FROM equipment GROUP BY 1 ORDER BY value DESC, label",
            expr = dimension.label_expr()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| (row.get::<String, _>("label"), row.get::<i64, _>("value")))
            .collect();
        Ok(rows)
    }
}
