//! Analytics service

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    api::analytics::{
        FinancialSummary, InventorySummary, MaintenanceSummary, NotificationSummary, StatEntry,
    },
    error::AppResult,
    jobs::alerts::WARRANTY_WINDOW_DAYS,
    models::{enums::EquipmentStatus, equipment::Equipment, equipment::EquipmentQuery},
    repository::{analytics::Dimension, Repository},
};

/// Share of `part` in `total` as a percentage with two decimals; 0 for an empty total
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / total as f64).round() / 100.0
}

fn entries(counts: Vec<(String, i64)>, total: i64) -> Vec<StatEntry> {
    counts
        .into_iter()
        .map(|(label, value)| StatEntry {
            percentage: percentage(value, total),
            label,
            value,
        })
        .collect()
}

/// Purchase and depreciated values of equipment still in service
pub fn financial_summary(equipment: &[Equipment], today: NaiveDate) -> FinancialSummary {
    let mut total = Decimal::ZERO;
    let mut current = Decimal::ZERO;
    let mut priced: i64 = 0;

    for e in equipment.iter().filter(|e| e.status != EquipmentStatus::Disposed) {
        if let (Some(price), Some(value)) = (e.purchase_price, e.depreciation_value(today)) {
            total += price;
            current += value;
            priced += 1;
        }
    }

    let average = if priced > 0 {
        (total / Decimal::from(priced)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    FinancialSummary {
        total_purchase_value: total,
        current_value: current,
        total_depreciation: total - current,
        average_purchase_price: average,
        priced_count: priced,
    }
}

/// Maintenance and warranty counts; request counts are passed in
pub fn maintenance_summary(
    equipment: &[Equipment],
    today: NaiveDate,
    requests_by_status: Vec<(String, i64)>,
) -> MaintenanceSummary {
    let active: Vec<&Equipment> = equipment
        .iter()
        .filter(|e| e.status != EquipmentStatus::Disposed)
        .collect();
    let horizon = today + Duration::days(WARRANTY_WINDOW_DAYS);
    let total_requests: i64 = requests_by_status.iter().map(|(_, n)| n).sum();

    MaintenanceSummary {
        needs_maintenance: active.iter().filter(|e| e.needs_maintenance(today)).count() as i64,
        overdue_over_30_days: active
            .iter()
            .filter(|e| e.needs_maintenance(today))
            .filter(|e| e.maintenance_overdue_days(today).unwrap_or(0) > 30)
            .count() as i64,
        in_repair: active
            .iter()
            .filter(|e| e.status == EquipmentStatus::Repair)
            .count() as i64,
        under_warranty: active.iter().filter(|e| e.is_under_warranty(today)).count() as i64,
        warranty_expiring_30_days: active
            .iter()
            .filter(|e| matches!(e.warranty_until, Some(w) if w >= today && w <= horizon))
            .count() as i64,
        requests_by_status: entries(requests_by_status, total_requests),
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    repository: Repository,
}

impl AnalyticsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn summary(&self) -> AppResult<InventorySummary> {
        let total = self.repository.analytics_total_equipment().await?;
        let repo = &self.repository;

        let by_status = repo.analytics_count_by(Dimension::Status).await?;
        let working = by_status
            .iter()
            .find(|(label, _)| label == EquipmentStatus::Working.as_str())
            .map(|(_, n)| *n)
            .unwrap_or(0);

        Ok(InventorySummary {
            total,
            working,
            working_percentage: percentage(working, total),
            by_category: entries(repo.analytics_count_by(Dimension::Category).await?, total),
            by_status: entries(by_status, total),
            by_manufacturer: entries(repo.analytics_count_by(Dimension::Manufacturer).await?, total),
            by_location: entries(repo.analytics_count_by(Dimension::Location).await?, total),
            by_purchase_year: entries(repo.analytics_count_by(Dimension::PurchaseYear).await?, total),
        })
    }

    pub async fn financial(&self) -> AppResult<FinancialSummary> {
        let equipment = self.repository.equipment_list(&EquipmentQuery::default()).await?;
        Ok(financial_summary(&equipment, Utc::now().date_naive()))
    }

    pub async fn maintenance(&self) -> AppResult<MaintenanceSummary> {
        let equipment = self.repository.equipment_list(&EquipmentQuery::default()).await?;
        let requests = self
            .repository
            .maintenance_count_requests_by_status()
            .await?
            .into_iter()
            .map(|(status, n)| (status.to_string(), n))
            .collect();
        Ok(maintenance_summary(&equipment, Utc::now().date_naive(), requests))
    }

    pub async fn notifications(&self, user_id: i32) -> AppResult<NotificationSummary> {
        let unread = self.repository.notifications_unread_count(user_id).await?;
        let by_priority = self
            .repository
            .notifications_unread_by_priority(user_id)
            .await?
            .into_iter()
            .map(|(p, n)| (p.to_string(), n))
            .collect();
        let by_type = self
            .repository
            .notifications_unread_by_type(user_id)
            .await?
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect();

        Ok(NotificationSummary {
            unread,
            unread_by_priority: entries(by_priority, unread),
            unread_by_type: entries(by_type, unread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::equipment::tests::equipment;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_percentage_guards_empty_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 2), 100.0);
    }

    #[test]
    fn test_empty_inventory_is_zeroed() {
        let today = date(2025, 1, 1);
        let financial = financial_summary(&[], today);
        assert_eq!(financial.total_purchase_value, Decimal::ZERO);
        assert_eq!(financial.average_purchase_price, Decimal::ZERO);
        assert_eq!(financial.priced_count, 0);

        let maintenance = maintenance_summary(&[], today, Vec::new());
        assert_eq!(maintenance.needs_maintenance, 0);
        assert!(maintenance.requests_by_status.is_empty());
    }

    #[test]
    fn test_financial_excludes_disposed_and_unpriced() {
        let today = date(2025, 1, 1);
        let mut a = equipment(1);
        a.purchase_price = Some(Decimal::from(1000));
        let mut b = equipment(2);
        b.purchase_price = Some(Decimal::from(500));
        b.purchase_date = Some(date(2010, 1, 1));
        let mut c = equipment(3);
        c.purchase_price = Some(Decimal::from(9000));
        c.status = EquipmentStatus::Disposed;
        let d = equipment(4);

        let summary = financial_summary(&[a, b, c, d], today);
        assert_eq!(summary.priced_count, 2);
        assert_eq!(summary.total_purchase_value, Decimal::from(1500));
        assert_eq!(summary.current_value, Decimal::from(1000));
        assert_eq!(summary.total_depreciation, Decimal::from(500));
        assert_eq!(summary.average_purchase_price, Decimal::from(750));
    }

    #[test]
    fn test_maintenance_counts() {
        let today = date(2025, 6, 1);
        let mut overdue = equipment(1);
        overdue.next_maintenance_date = Some(date(2025, 3, 1));
        let mut recent = equipment(2);
        recent.next_maintenance_date = Some(date(2025, 5, 25));
        recent.warranty_until = Some(date(2025, 6, 20));
        let mut repair = equipment(3);
        repair.status = EquipmentStatus::Repair;
        repair.warranty_until = Some(date(2026, 1, 1));

        let summary = maintenance_summary(
            &[overdue, recent, repair],
            today,
            vec![("pending".to_string(), 3), ("completed".to_string(), 1)],
        );
        assert_eq!(summary.needs_maintenance, 2);
        assert_eq!(summary.overdue_over_30_days, 1);
        assert_eq!(summary.in_repair, 1);
        assert_eq!(summary.under_warranty, 2);
        assert_eq!(summary.warranty_expiring_30_days, 1);
        assert_eq!(summary.requests_by_status[0].percentage, 75.0);
    }
}
