//! Alerting rules evaluated against an equipment snapshot.
//!
//! Evaluation and cooldown filtering are pure: they take the current date,
//! the equipment in service and the recent rule notifications, and return
//! the drafts that should be persisted.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    config::NotificationsConfig,
    models::{
        enums::{EquipmentStatus, NotificationType, Priority, RuleKey},
        equipment::{Equipment, USEFUL_LIFE_YEARS},
        notification::{fit_title, NotificationDraft, RecentNotification},
    },
};

/// Warranty alerts start this many days before the end date
pub const WARRANTY_WINDOW_DAYS: i64 = 30;

/// Remaining warranty days at or below which the alert is HIGH
pub const WARRANTY_HIGH_DAYS: i64 = 7;

/// Days before `expiry_date` on which a countdown notice is sent
pub const EXPIRY_THRESHOLDS: [i64; 4] = [30, 7, 1, 0];

/// Look-back used to de-duplicate expiry notices by title
pub const EXPIRY_DEDUP_DAYS: i64 = 31;

/// Rules run by the periodic checks
pub const ALERT_RULES: [RuleKey; 4] = [
    RuleKey::Warranty,
    RuleKey::Maintenance,
    RuleKey::Aging,
    RuleKey::Expiry,
];

/// Cooldown windows per rule
#[derive(Debug, Clone, Copy)]
pub struct Cooldowns {
    pub warranty: Duration,
    pub maintenance: Duration,
    pub aging: Duration,
}

impl Cooldowns {
    /// Window for `rule`; None for rules de-duplicated by title instead
    pub fn for_rule(&self, rule: RuleKey) -> Option<Duration> {
        match rule {
            RuleKey::Warranty => Some(self.warranty),
            RuleKey::Maintenance => Some(self.maintenance),
            RuleKey::Aging => Some(self.aging),
            RuleKey::Expiry | RuleKey::System => None,
        }
    }

    /// How far back recent notifications must be loaded
    pub fn lookback(&self) -> Duration {
        [self.warranty, self.maintenance, self.aging, Duration::days(EXPIRY_DEDUP_DAYS)]
            .into_iter()
            .max()
            .unwrap_or_else(|| Duration::days(EXPIRY_DEDUP_DAYS))
    }
}

impl From<&NotificationsConfig> for Cooldowns {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            warranty: Duration::days(config.warranty_cooldown_days),
            maintenance: Duration::days(config.maintenance_cooldown_days),
            aging: Duration::days(config.aging_cooldown_days),
        }
    }
}

impl Default for Cooldowns {
    fn default() -> Self {
        Cooldowns::from(&NotificationsConfig::default())
    }
}

/// Deduplicated recipient list, first occurrence wins
fn recipients<I>(people: I, staff: &[i32]) -> Vec<i32>
where
    I: IntoIterator<Item = Option<i32>>,
{
    let mut ids: Vec<i32> = Vec::new();
    for id in people.into_iter().flatten().chain(staff.iter().copied()) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn drafts_for(
    equipment: &Equipment,
    users: Vec<i32>,
    rule: RuleKey,
    notification_type: NotificationType,
    priority: Priority,
    title: String,
    message: String,
) -> Vec<NotificationDraft> {
    let title = fit_title(title);
    users
        .into_iter()
        .map(|user_id| NotificationDraft {
            user_id,
            equipment_id: Some(equipment.id),
            title: title.clone(),
            message: message.clone(),
            notification_type,
            priority,
            rule_key: Some(rule),
        })
        .collect()
}

fn warranty(e: &Equipment, today: NaiveDate, staff: &[i32]) -> Vec<NotificationDraft> {
    if e.status != EquipmentStatus::Working {
        return Vec::new();
    }
    let Some(until) = e.warranty_until else {
        return Vec::new();
    };
    let days_left = (until - today).num_days();
    if !(0..=WARRANTY_WINDOW_DAYS).contains(&days_left) {
        return Vec::new();
    }
    let priority = if days_left <= WARRANTY_HIGH_DAYS {
        Priority::High
    } else {
        Priority::Medium
    };
    drafts_for(
        e,
        recipients([e.responsible_person_id], staff),
        RuleKey::Warranty,
        NotificationType::Warning,
        priority,
        format!("Warranty expiring: {}", e.name),
        format!(
            "Warranty for {} (S/N {}) ends on {} ({} days left).",
            e.name, e.serial_number, until, days_left
        ),
    )
}

fn maintenance(e: &Equipment, today: NaiveDate, staff: &[i32]) -> Vec<NotificationDraft> {
    if !e.needs_maintenance(today) {
        return Vec::new();
    }
    let Some(overdue) = e.maintenance_overdue_days(today) else {
        return Vec::new();
    };
    let (priority, notification_type) = match overdue {
        d if d > 90 => (Priority::Urgent, NotificationType::Error),
        d if d > 30 => (Priority::High, NotificationType::Warning),
        _ => (Priority::Medium, NotificationType::Warning),
    };
    drafts_for(
        e,
        recipients([e.responsible_person_id], staff),
        RuleKey::Maintenance,
        notification_type,
        priority,
        format!("Maintenance overdue: {}", e.name),
        format!(
            "{} (S/N {}) is {} days past its maintenance date.",
            e.name, e.serial_number, overdue
        ),
    )
}

fn aging(e: &Equipment, today: NaiveDate) -> Vec<NotificationDraft> {
    if e.status != EquipmentStatus::Working {
        return Vec::new();
    }
    match e.age_years(today) {
        Some(age) if age >= USEFUL_LIFE_YEARS => drafts_for(
            e,
            recipients([e.responsible_person_id, e.current_user_id], &[]),
            RuleKey::Aging,
            NotificationType::Info,
            Priority::Low,
            format!("Replacement review: {}", e.name),
            format!(
                "{} (S/N {}) is {} years old. Consider reviewing it for replacement.",
                e.name, e.serial_number, age
            ),
        ),
        _ => Vec::new(),
    }
}

fn expiry(e: &Equipment, today: NaiveDate) -> Vec<NotificationDraft> {
    let Some(expires) = e.expiry_date else {
        return Vec::new();
    };
    let days = (expires - today).num_days();
    if !EXPIRY_THRESHOLDS.contains(&days) {
        return Vec::new();
    }
    let (title, notification_type, priority) = match days {
        0 => (format!("{} expires today", e.name), NotificationType::Error, Priority::Urgent),
        1 => (format!("{} expires tomorrow", e.name), NotificationType::Warning, Priority::High),
        7 => (format!("{} expires in 7 days", e.name), NotificationType::Warning, Priority::Medium),
        _ => (format!("{} expires in {} days", e.name, days), NotificationType::Info, Priority::Low),
    };
    drafts_for(
        e,
        recipients([e.responsible_person_id, e.current_user_id], &[]),
        RuleKey::Expiry,
        notification_type,
        priority,
        title,
        format!("{} (S/N {}) reaches its expiry date on {}.", e.name, e.serial_number, expires),
    )
}

/// Drafts produced by one rule over the equipment snapshot
pub fn evaluate_rule(
    rule: RuleKey,
    today: NaiveDate,
    equipment: &[Equipment],
    staff: &[i32],
) -> Vec<NotificationDraft> {
    equipment
        .iter()
        .flat_map(|e| match rule {
            RuleKey::Warranty => warranty(e, today, staff),
            RuleKey::Maintenance => maintenance(e, today, staff),
            RuleKey::Aging => aging(e, today),
            RuleKey::Expiry => expiry(e, today),
            RuleKey::System => Vec::new(),
        })
        .collect()
}

/// Drafts produced by every alerting rule
pub fn evaluate_rules(today: NaiveDate, equipment: &[Equipment], staff: &[i32]) -> Vec<NotificationDraft> {
    ALERT_RULES
        .iter()
        .flat_map(|rule| evaluate_rule(*rule, today, equipment, staff))
        .collect()
}

fn suppresses(
    recent: &RecentNotification,
    draft: &NotificationDraft,
    now: DateTime<Utc>,
    cooldowns: &Cooldowns,
) -> bool {
    if recent.user_id != draft.user_id
        || recent.equipment_id != draft.equipment_id
        || recent.rule_key != draft.rule_key
    {
        return false;
    }
    match draft.rule_key.and_then(|rule| cooldowns.for_rule(rule)) {
        Some(window) => recent.created_at > now - window,
        None => recent.title == draft.title,
    }
}

/// Drop drafts already covered by a recent notification, and duplicates
/// within the batch itself
pub fn apply_cooldown(
    drafts: Vec<NotificationDraft>,
    recent: &[RecentNotification],
    now: DateTime<Utc>,
    cooldowns: &Cooldowns,
) -> Vec<NotificationDraft> {
    let mut kept: Vec<NotificationDraft> = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let seen = kept.iter().any(|k| {
            k.user_id == draft.user_id
                && k.equipment_id == draft.equipment_id
                && k.rule_key == draft.rule_key
        });
        if seen || recent.iter().any(|r| suppresses(r, &draft, now, cooldowns)) {
            continue;
        }
        kept.push(draft);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::equipment::tests::equipment;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 6, 15)
    }

    fn now() -> DateTime<Utc> {
        today().and_hms_opt(9, 0, 0).unwrap().and_utc()
    }

    /// Turn persisted drafts into the recent-notification view
    fn persisted(drafts: &[NotificationDraft], at: DateTime<Utc>) -> Vec<RecentNotification> {
        drafts
            .iter()
            .map(|d| RecentNotification {
                user_id: d.user_id,
                equipment_id: d.equipment_id,
                rule_key: d.rule_key,
                title: d.title.clone(),
                created_at: at,
            })
            .collect()
    }

    #[test]
    fn test_warranty_seven_days_is_high_once_per_recipient() {
        let mut e = equipment(1);
        e.warranty_until = Some(today() + Duration::days(7));
        e.responsible_person_id = Some(10);
        let staff = [10, 20, 30];

        let drafts = evaluate_rule(RuleKey::Warranty, today(), &[e], &staff);
        let users: Vec<i32> = drafts.iter().map(|d| d.user_id).collect();
        assert_eq!(users, vec![10, 20, 30]);
        assert!(drafts.iter().all(|d| d.priority == Priority::High));

        let first = apply_cooldown(drafts.clone(), &[], now(), &Cooldowns::default());
        assert_eq!(first.len(), 3);

        let recent = persisted(&first, now());
        let later = now() + Duration::days(2);
        let second = apply_cooldown(drafts, &recent, later, &Cooldowns::default());
        assert!(second.is_empty());
    }

    #[test]
    fn test_longest_equipment_name_yields_storable_titles() {
        let mut e = equipment(1);
        e.name = "n".repeat(255);
        e.responsible_person_id = Some(10);
        e.warranty_until = Some(today() + Duration::days(3));
        e.expiry_date = Some(today());
        e.purchase_date = Some(today() - Duration::days(6 * 365));

        let drafts = evaluate_rules(today(), &[e], &[20]);
        assert!(!drafts.is_empty());
        assert!(drafts
            .iter()
            .all(|d| d.title.chars().count() <= crate::models::notification::TITLE_MAX_CHARS));
    }

    #[test]
    fn test_warranty_window_bounds() {
        let staff = [1];
        let check = |offset: i64| {
            let mut e = equipment(1);
            e.warranty_until = Some(today() + Duration::days(offset));
            evaluate_rule(RuleKey::Warranty, today(), &[e], &staff)
                .first()
                .map(|d| d.priority)
        };
        assert_eq!(check(0), Some(Priority::High));
        assert_eq!(check(8), Some(Priority::Medium));
        assert_eq!(check(30), Some(Priority::Medium));
        assert_eq!(check(31), None);
        assert_eq!(check(-1), None);
    }

    #[test]
    fn test_rules_skip_equipment_not_working() {
        let mut e = equipment(1);
        e.status = EquipmentStatus::Repair;
        e.warranty_until = Some(today() + Duration::days(3));
        e.purchase_date = Some(date(2010, 1, 1));
        e.responsible_person_id = Some(5);
        assert!(evaluate_rule(RuleKey::Warranty, today(), &[e.clone()], &[1]).is_empty());
        assert!(evaluate_rule(RuleKey::Maintenance, today(), &[e.clone()], &[1]).is_empty());
        assert!(evaluate_rule(RuleKey::Aging, today(), &[e], &[1]).is_empty());
    }

    #[test]
    fn test_cooldown_expires() {
        let mut e = equipment(1);
        e.warranty_until = Some(today() + Duration::days(10));
        let drafts = evaluate_rule(RuleKey::Warranty, today(), &[e], &[1]);
        let recent = persisted(&drafts, now() - Duration::days(8));
        let kept = apply_cooldown(drafts, &recent, now(), &Cooldowns::default());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_maintenance_priority_by_overdue_days() {
        let priority = |overdue: i64| {
            let mut e = equipment(1);
            e.next_maintenance_date = Some(today() - Duration::days(overdue));
            evaluate_rule(RuleKey::Maintenance, today(), &[e], &[1])
                .first()
                .map(|d| d.priority)
        };
        assert_eq!(priority(0), None);
        assert_eq!(priority(1), Some(Priority::Medium));
        assert_eq!(priority(30), Some(Priority::Medium));
        assert_eq!(priority(31), Some(Priority::High));
        assert_eq!(priority(90), Some(Priority::High));
        assert_eq!(priority(91), Some(Priority::Urgent));
    }

    #[test]
    fn test_maintenance_without_dates_uses_purchase() {
        let mut e = equipment(1);
        e.purchase_date = Some(today() - Duration::days(400));
        assert_eq!(evaluate_rule(RuleKey::Maintenance, today(), &[e.clone()], &[1]).len(), 1);

        e.last_maintenance_date = Some(today() - Duration::days(100));
        assert!(evaluate_rule(RuleKey::Maintenance, today(), &[e], &[1]).is_empty());
    }

    #[test]
    fn test_aging_boundary_is_inclusive() {
        let mut e = equipment(1);
        e.responsible_person_id = Some(3);
        e.current_user_id = Some(4);

        e.purchase_date = Some(date(2020, 6, 15));
        let drafts = evaluate_rule(RuleKey::Aging, today(), &[e.clone()], &[99]);
        assert_eq!(drafts.iter().map(|d| d.user_id).collect::<Vec<_>>(), vec![3, 4]);
        assert!(drafts.iter().all(|d| d.priority == Priority::Low));

        e.purchase_date = Some(date(2020, 6, 16));
        assert!(evaluate_rule(RuleKey::Aging, today(), &[e], &[99]).is_empty());
    }

    #[test]
    fn test_expiry_fires_only_on_thresholds() {
        let mut e = equipment(1);
        e.current_user_id = Some(8);
        for offset in 0..=31 {
            e.expiry_date = Some(today() + Duration::days(offset));
            let drafts = evaluate_rule(RuleKey::Expiry, today(), &[e.clone()], &[]);
            assert_eq!(drafts.len() == 1, EXPIRY_THRESHOLDS.contains(&offset), "offset {}", offset);
        }
    }

    #[test]
    fn test_expiry_deduplicates_by_title() {
        let mut e = equipment(1);
        e.current_user_id = Some(8);
        e.expiry_date = Some(today() + Duration::days(7));
        let drafts = evaluate_rule(RuleKey::Expiry, today(), &[e.clone()], &[]);
        let recent = persisted(&drafts, now() - Duration::days(20));
        assert!(apply_cooldown(drafts, &recent, now(), &Cooldowns::default()).is_empty());

        e.expiry_date = Some(today() + Duration::days(1));
        let drafts = evaluate_rule(RuleKey::Expiry, today(), &[e], &[]);
        assert_eq!(apply_cooldown(drafts, &recent, now(), &Cooldowns::default()).len(), 1);
    }

    #[test]
    fn test_no_recipients_means_no_drafts() {
        let mut e = equipment(1);
        e.purchase_date = Some(date(2001, 1, 1));
        assert!(evaluate_rule(RuleKey::Aging, today(), &[e], &[1, 2]).is_empty());
    }

    #[test]
    fn test_evaluate_rules_combines_all() {
        let mut e = equipment(1);
        e.responsible_person_id = Some(1);
        e.purchase_date = Some(date(2019, 1, 1));
        e.warranty_until = Some(today());
        e.expiry_date = Some(today());
        let rules: Vec<RuleKey> = evaluate_rules(today(), &[e], &[])
            .iter()
            .filter_map(|d| d.rule_key)
            .collect();
        assert_eq!(rules, ALERT_RULES.to_vec());
    }

    #[test]
    fn test_lookback_covers_longest_window() {
        let cooldowns = Cooldowns::default();
        assert_eq!(cooldowns.lookback(), Duration::days(EXPIRY_DEDUP_DAYS));
        let long = Cooldowns {
            aging: Duration::days(60),
            ..cooldowns
        };
        assert_eq!(long.lookback(), Duration::days(60));
    }
}
