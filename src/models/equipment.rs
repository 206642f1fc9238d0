//! Equipment model

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{EquipmentCategory, EquipmentStatus};

/// Assumed useful life used for straight-line depreciation
pub const USEFUL_LIFE_YEARS: i64 = 5;

/// Interval applied when no explicit next maintenance date is set
pub const MAINTENANCE_INTERVAL_DAYS: i64 = 365;

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub category: EquipmentCategory,
    /// Hardware serial number (unique, immutable once assigned)
    pub serial_number: String,
    /// Serial number with a random suffix, set at creation
    pub unique_serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    pub mac_address: Option<String>,
    pub ip_address: Option<String>,
    pub network_in: i64,
    pub network_out: i64,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub status: EquipmentStatus,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_until: Option<NaiveDate>,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub current_user_id: Option<i32>,
    pub responsible_person_id: Option<i32>,
    pub purchase_price: Option<Decimal>,
    #[schema(value_type = Option<Object>)]
    pub cpu_info: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub memory_info: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub disk_info: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub gpu_info: Option<Json<Value>>,
    #[schema(value_type = Option<Object>)]
    pub network_adapters: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whole years elapsed between two dates
pub fn full_years_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut years = (to.year() - from.year()) as i64;
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0)
}

impl Equipment {
    /// Age in whole years since purchase
    pub fn age_years(&self, today: NaiveDate) -> Option<i64> {
        self.purchase_date.map(|d| full_years_between(d, today))
    }

    /// Current value after straight-line depreciation over [`USEFUL_LIFE_YEARS`]
    pub fn depreciation_value(&self, today: NaiveDate) -> Option<Decimal> {
        let price = self.purchase_price?;
        let Some(purchased) = self.purchase_date else {
            return Some(price);
        };
        let elapsed = (today - purchased).num_days();
        if elapsed <= 0 {
            return Some(price);
        }
        let life = USEFUL_LIFE_YEARS * 365;
        if elapsed >= life {
            return Some(Decimal::ZERO);
        }
        let remaining = price * Decimal::from(life - elapsed) / Decimal::from(life);
        Some(remaining.round_dp(2))
    }

    /// Date maintenance is due: the explicit next date, else one interval
    /// after the last maintenance, else one interval after purchase.
    pub fn maintenance_due_date(&self) -> Option<NaiveDate> {
        let interval = Duration::days(MAINTENANCE_INTERVAL_DAYS);
        self.next_maintenance_date
            .or_else(|| self.last_maintenance_date.map(|d| d + interval))
            .or_else(|| self.purchase_date.map(|d| d + interval))
    }

    /// Days past the maintenance due date, if overdue
    pub fn maintenance_overdue_days(&self, today: NaiveDate) -> Option<i64> {
        let due = self.maintenance_due_date()?;
        (due < today).then(|| (today - due).num_days())
    }

    pub fn needs_maintenance(&self, today: NaiveDate) -> bool {
        self.status == EquipmentStatus::Working && self.maintenance_overdue_days(today).is_some()
    }

    pub fn is_under_warranty(&self, today: NaiveDate) -> bool {
        self.warranty_until.map(|w| w >= today).unwrap_or(false)
    }

    pub fn into_view(self, today: NaiveDate) -> EquipmentView {
        EquipmentView {
            age_years: self.age_years(today),
            depreciation_value: self.depreciation_value(today),
            needs_maintenance: self.needs_maintenance(today),
            is_under_warranty: self.is_under_warranty(today),
            equipment: self,
        }
    }
}

/// Equipment with derived fields, as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentView {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub age_years: Option<i64>,
    pub depreciation_value: Option<Decimal>,
    pub needs_maintenance: bool,
    pub is_under_warranty: bool,
}

/// Equipment list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct EquipmentQuery {
    pub category: Option<EquipmentCategory>,
    pub status: Option<EquipmentStatus>,
    /// Matches name, serial number or location
    pub search: Option<String>,
}

/// Update of administrator-curated fields
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub category: Option<EquipmentCategory>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_until: Option<NaiveDate>,
    pub last_maintenance_date: Option<NaiveDate>,
    pub next_maintenance_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub current_user_id: Option<i32>,
    pub responsible_person_id: Option<i32>,
    pub purchase_price: Option<Decimal>,
}

/// Status transition request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatus {
    pub status: EquipmentStatus,
}

/// Installed software row linked to an equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InstalledSoftware {
    pub id: i32,
    pub equipment_id: i32,
    pub name: String,
    pub version: String,
    pub publisher: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Peripheral row linked to an equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Peripheral {
    pub id: i32,
    pub equipment_id: i32,
    pub kind: String,
    pub name: String,
    pub serial_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal working equipment for rule and analytics tests
    pub(crate) fn equipment(id: i32) -> Equipment {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        Equipment {
            id,
            name: format!("PC-{}", id),
            category: EquipmentCategory::Pc,
            serial_number: format!("SN-{}", id),
            unique_serial_number: None,
            manufacturer: None,
            model: None,
            location: None,
            mac_address: None,
            ip_address: None,
            network_in: 0,
            network_out: 0,
            is_online: true,
            last_seen: None,
            status: EquipmentStatus::Working,
            purchase_date: None,
            warranty_until: None,
            last_maintenance_date: None,
            next_maintenance_date: None,
            expiry_date: None,
            current_user_id: None,
            responsible_person_id: None,
            purchase_price: None,
            cpu_info: None,
            memory_info: None,
            disk_info: None,
            gpu_info: None,
            network_adapters: None,
            created_at: epoch,
            updated_at: epoch,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_counts_whole_years() {
        let mut e = equipment(1);
        e.purchase_date = Some(date(2020, 6, 15));
        assert_eq!(e.age_years(date(2025, 6, 15)), Some(5));
        assert_eq!(e.age_years(date(2025, 6, 14)), Some(4));
        assert_eq!(equipment(2).age_years(date(2025, 1, 1)), None);
    }

    #[test]
    fn test_depreciation_is_straight_line() {
        let mut e = equipment(1);
        let price = Decimal::new(100_000, 2);
        e.purchase_price = Some(price);
        assert_eq!(e.depreciation_value(date(2025, 1, 1)), Some(price));

        e.purchase_date = Some(date(2020, 1, 1));
        let today = e.purchase_date.unwrap() + Duration::days(USEFUL_LIFE_YEARS * 365 / 2);
        let half = e.depreciation_value(today).unwrap();
        assert!(half > Decimal::from(499) && half < Decimal::from(501), "got {}", half);

        assert_eq!(e.depreciation_value(date(2030, 1, 1)), Some(Decimal::ZERO));
        assert_eq!(e.depreciation_value(date(2019, 1, 1)), Some(price));
    }

    #[test]
    fn test_maintenance_due_falls_back_to_last_then_purchase() {
        let today = date(2025, 3, 1);
        let mut e = equipment(1);
        assert_eq!(e.maintenance_overdue_days(today), None);

        e.purchase_date = Some(date(2023, 1, 1));
        assert!(e.needs_maintenance(today));

        e.last_maintenance_date = Some(date(2024, 6, 1));
        assert!(!e.needs_maintenance(today));

        e.next_maintenance_date = Some(date(2025, 2, 19));
        assert_eq!(e.maintenance_overdue_days(today), Some(10));

        e.status = EquipmentStatus::Repair;
        assert!(!e.needs_maintenance(today));
    }

    #[test]
    fn test_warranty_includes_last_day() {
        let mut e = equipment(1);
        let today = date(2025, 3, 1);
        assert!(!e.is_under_warranty(today));
        e.warranty_until = Some(today);
        assert!(e.is_under_warranty(today));
        e.warranty_until = Some(date(2025, 2, 28));
        assert!(!e.is_under_warranty(today));
    }

    #[test]
    fn test_view_flattens_equipment() {
        let view = equipment(7).into_view(date(2025, 1, 1));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["serial_number"], "SN-7");
        assert_eq!(json["needs_maintenance"], false);
    }
}
