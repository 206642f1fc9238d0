//! Shared domain enums stored as text columns

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Declares a slug-backed enum with string conversions and SQLx text mapping.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $slug:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $slug),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($slug => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Equipment category
    EquipmentCategory {
        Pc => "pc",
        Workstation => "workstation",
        Server => "server",
        Printer => "printer",
        Laptop => "laptop",
        Other => "other",
    }
}

text_enum! {
    /// Equipment operational status
    EquipmentStatus {
        Working => "working",
        Repair => "repair",
        Maintenance => "maintenance",
        Disposed => "disposed",
    }
}

impl EquipmentStatus {
    /// Whether the status may move to `next`.
    ///
    /// Disposed equipment is terminal; every other state may move to any
    /// other state. Staying in place is always allowed.
    pub fn can_transition_to(&self, next: EquipmentStatus) -> bool {
        use EquipmentStatus::*;
        if *self == next {
            return true;
        }
        match (self, next) {
            (Disposed, _) => false,
            (Working, Repair | Maintenance | Disposed) => true,
            (Repair, Working | Maintenance | Disposed) => true,
            (Maintenance, Working | Repair | Disposed) => true,
            _ => false,
        }
    }

    /// Status kept when an agent reports `reported` for equipment stored as `self`.
    ///
    /// Agents only see a running host, so they may move equipment out of
    /// `Working`; a status set by an administrator is left alone.
    pub fn merge_reported(self, reported: EquipmentStatus) -> EquipmentStatus {
        if self == EquipmentStatus::Working && self.can_transition_to(reported) {
            reported
        } else {
            self
        }
    }
}

text_enum! {
    /// Notification kind
    NotificationType {
        Info => "info",
        Warning => "warning",
        Error => "error",
        Success => "success",
    }
}

text_enum! {
    /// Notification / request priority
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

text_enum! {
    /// Category of the alerting rule that produced a notification
    RuleKey {
        Warranty => "warranty",
        Maintenance => "maintenance",
        Aging => "aging",
        Expiry => "expiry",
        System => "system",
    }
}

text_enum! {
    /// Maintenance work-order status
    RequestStatus {
        Pending => "pending",
        Approved => "approved",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Maintenance schedule frequency
    Frequency {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Quarterly => "quarterly",
        Semiannual => "semiannual",
        Annual => "annual",
        Custom => "custom",
    }
}

text_enum! {
    /// Vault password access action
    AccessAction {
        View => "view",
        Edit => "edit",
        Generate => "generate",
    }
}
