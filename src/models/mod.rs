//! Data models for the inventory server

pub mod enums;
pub mod equipment;
pub mod maintenance;
pub mod notification;
pub mod report;
pub mod user;
pub mod vault;

// Re-export commonly used types
pub use enums::{
    AccessAction, EquipmentCategory, EquipmentStatus, Frequency, NotificationType, Priority,
    RequestStatus, RuleKey,
};
pub use equipment::{Equipment, EquipmentView};
pub use maintenance::{MaintenanceRequest, MaintenanceSchedule};
pub use notification::{Notification, NotificationDraft};
pub use report::{IngestResult, ReportDocument};
pub use user::{User, UserClaims};
