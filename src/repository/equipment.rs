//! Equipment domain methods on Repository

use chrono::{NaiveDate, Utc};
use sqlx::{types::Json, PgConnection};

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::EquipmentStatus,
        equipment::{Equipment, EquipmentQuery, InstalledSoftware, Peripheral, UpdateEquipment},
        notification::{Notification, NotificationDraft},
        report::{reconcile, IngestResult, PeripheralEntry, ReportDocument, SoftwareEntry},
    },
};

fn to_json<T: serde::Serialize>(value: &T) -> Option<Json<serde_json::Value>> {
    serde_json::to_value(value).ok().map(Json)
}

/// JSON for a list facet, NULL when the list is empty
fn list_json<T: serde::Serialize>(values: &[T]) -> Option<Json<serde_json::Value>> {
    if values.is_empty() {
        None
    } else {
        to_json(&values)
    }
}

impl Repository {
    /// List equipment with optional filters
    pub async fn equipment_list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let mut conditions = Vec::new();
        let mut idx = 1;
        if query.category.is_some() {
            conditions.push(format!("category = ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if query.search.is_some() {
            conditions.push(format!(
                "(name ILIKE ${i} OR serial_number ILIKE ${i} OR location ILIKE ${i})",
                i = idx
            ));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!("SELECT * FROM equipment {} ORDER BY name", where_clause);

        let mut builder = sqlx::query_as::<_, Equipment>(&sql);
        if let Some(category) = query.category {
            builder = builder.bind(category);
        }
        if let Some(status) = query.status {
            builder = builder.bind(status);
        }
        if let Some(ref search) = query.search {
            builder = builder.bind(format!("%{}%", search));
        }
        Ok(builder.fetch_all(&self.pool).await?)
    }

    /// Equipment still in service (everything but disposed)
    pub async fn equipment_list_active(&self) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            "SELECT * FROM equipment WHERE status != $1 ORDER BY id",
        )
        .bind(EquipmentStatus::Disposed)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn equipment_get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Update administrator-curated fields
    pub async fn equipment_update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        let now = Utc::now();
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.category, "category");
        add_field!(data.manufacturer, "manufacturer");
        add_field!(data.model, "model");
        add_field!(data.location, "location");
        add_field!(data.purchase_date, "purchase_date");
        add_field!(data.warranty_until, "warranty_until");
        add_field!(data.last_maintenance_date, "last_maintenance_date");
        add_field!(data.next_maintenance_date, "next_maintenance_date");
        add_field!(data.expiry_date, "expiry_date");
        add_field!(data.current_user_id, "current_user_id");
        add_field!(data.responsible_person_id, "responsible_person_id");
        add_field!(data.purchase_price, "purchase_price");

        let query = format!(
            "UPDATE equipment SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_as::<_, Equipment>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.category);
        bind_field!(data.manufacturer);
        bind_field!(data.model);
        bind_field!(data.location);
        bind_field!(data.purchase_date);
        bind_field!(data.warranty_until);
        bind_field!(data.last_maintenance_date);
        bind_field!(data.next_maintenance_date);
        bind_field!(data.expiry_date);
        bind_field!(data.current_user_id);
        bind_field!(data.responsible_person_id);
        bind_field!(data.purchase_price);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Move equipment from `from` to `to` (legality is checked by the service).
    ///
    /// Fails with a conflict when the stored status is no longer `from`.
    pub async fn equipment_set_status(
        &self,
        id: i32,
        from: EquipmentStatus,
        to: EquipmentStatus,
    ) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipment SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(format!("Equipment {} is no longer {}, reload and retry", id, from))
        })
    }

    /// Delete equipment (children cascade, notifications are orphaned)
    pub async fn equipment_delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    pub async fn equipment_software(&self, id: i32) -> AppResult<Vec<InstalledSoftware>> {
        let rows = sqlx::query_as::<_, InstalledSoftware>(
            "SELECT * FROM installed_software WHERE equipment_id = $1 ORDER BY name, version",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn equipment_peripherals(&self, id: i32) -> AppResult<Vec<Peripheral>> {
        let rows = sqlx::query_as::<_, Peripheral>(
            "SELECT * FROM peripherals WHERE equipment_id = $1 ORDER BY kind, name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Stamp a completed maintenance on the equipment
    pub(crate) async fn equipment_record_maintenance(
        conn: &mut PgConnection,
        id: i32,
        performed_on: NaiveDate,
        next_due: NaiveDate,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE equipment
            SET last_maintenance_date = $1, next_maintenance_date = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(performed_on)
        .bind(next_due)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Upsert one telemetry report keyed by serial number.
    ///
    /// Equipment row, child reconciliation and the creation notices for
    /// `notify_on_create` are written in a single transaction.
    pub async fn equipment_ingest(
        &self,
        report: &ReportDocument,
        notify_on_create: impl FnOnce(&Equipment) -> Vec<NotificationDraft>,
    ) -> AppResult<(IngestResult, Vec<Notification>)> {
        let mut tx = self.pool.begin().await?;
        let today = Utc::now().date_naive();

        let inserted = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (
                name, category, serial_number, unique_serial_number, manufacturer, model,
                location, mac_address, ip_address, network_in, network_out, is_online,
                last_seen, status, purchase_date, cpu_info, memory_info, disk_info,
                gpu_info, network_adapters
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), $13, $14,
                    $15, $16, $17, $18, $19)
            ON CONFLICT (serial_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&report.name)
        .bind(report.category)
        .bind(&report.serial_number)
        .bind(&report.unique_serial_number)
        .bind(&report.manufacturer)
        .bind(&report.model)
        .bind(&report.location)
        .bind(&report.mac_address)
        .bind(&report.ip_address)
        .bind(report.network_in)
        .bind(report.network_out)
        .bind(report.is_online)
        .bind(report.status)
        .bind(report.purchase_date)
        .bind(report.cpu_info.as_ref().and_then(to_json))
        .bind(report.memory_info.as_ref().and_then(to_json))
        .bind(list_json(&report.disk_info))
        .bind(list_json(&report.gpu_info))
        .bind(list_json(&report.network_adapters))
        .fetch_optional(&mut *tx)
        .await?;

        let (equipment, created) = match inserted {
            Some(equipment) => (equipment, true),
            None => {
                let existing = sqlx::query_as::<_, Equipment>(
                    "SELECT * FROM equipment WHERE serial_number = $1 FOR UPDATE",
                )
                .bind(&report.serial_number)
                .fetch_one(&mut *tx)
                .await?;

                let status = existing.status.merge_reported(report.status);
                if status != report.status {
                    tracing::debug!(
                        equipment_id = existing.id,
                        stored = %existing.status,
                        reported = %report.status,
                        "Keeping stored status over agent report"
                    );
                }

                // Server-owned fields (owners, price, lifecycle dates,
                // unique serial) are never touched here.
                let updated = sqlx::query_as::<_, Equipment>(
                    r#"
                    UPDATE equipment SET
                        name = $1,
                        mac_address = $2,
                        ip_address = $3,
                        network_in = $4,
                        network_out = $5,
                        is_online = $6,
                        status = $7,
                        manufacturer = COALESCE($8, manufacturer),
                        model = COALESCE($9, model),
                        location = COALESCE(location, $10),
                        purchase_date = COALESCE(purchase_date, $11),
                        cpu_info = COALESCE($12, cpu_info),
                        memory_info = COALESCE($13, memory_info),
                        disk_info = COALESCE($14, disk_info),
                        gpu_info = COALESCE($15, gpu_info),
                        network_adapters = COALESCE($16, network_adapters),
                        last_seen = NOW(),
                        updated_at = NOW()
                    WHERE id = $17
                    RETURNING *
                    "#,
                )
                .bind(&report.name)
                .bind(&report.mac_address)
                .bind(&report.ip_address)
                .bind(report.network_in)
                .bind(report.network_out)
                .bind(report.is_online)
                .bind(status)
                .bind(&report.manufacturer)
                .bind(&report.model)
                .bind(&report.location)
                .bind(report.purchase_date)
                .bind(report.cpu_info.as_ref().and_then(to_json))
                .bind(report.memory_info.as_ref().and_then(to_json))
                .bind(list_json(&report.disk_info))
                .bind(list_json(&report.gpu_info))
                .bind(list_json(&report.network_adapters))
                .bind(existing.id)
                .fetch_one(&mut *tx)
                .await?;
                (updated, false)
            }
        };

        let (software_synced, software_removed) =
            Self::sync_software(&mut tx, equipment.id, &report.installed_software, report.remove_stale)
                .await?;
        let (peripherals_synced, peripherals_removed) =
            Self::sync_peripherals(&mut tx, equipment.id, &report.peripherals, report.remove_stale)
                .await?;

        let mut notifications = Vec::new();
        if created {
            for draft in notify_on_create(&equipment) {
                if let Some(n) = Self::notifications_insert(&mut tx, &draft, today).await? {
                    notifications.push(n);
                }
            }
        }

        tx.commit().await?;

        Ok((
            IngestResult {
                created,
                equipment_id: equipment.id,
                software_synced,
                peripherals_synced,
                software_removed,
                peripherals_removed,
            },
            notifications,
        ))
    }

    async fn sync_software(
        conn: &mut PgConnection,
        equipment_id: i32,
        reported: &[SoftwareEntry],
        remove_stale: bool,
    ) -> AppResult<(u64, u64)> {
        let existing: Vec<(String, String)> = sqlx::query_as(
            "SELECT name, version FROM installed_software WHERE equipment_id = $1",
        )
        .bind(equipment_id)
        .fetch_all(&mut *conn)
        .await?;

        let diff = reconcile(&existing, reported, SoftwareEntry::key);

        let mut added = 0;
        for entry in diff.to_add {
            added += sqlx::query(
                r#"
                INSERT INTO installed_software (equipment_id, name, version, publisher)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (equipment_id, name, version) DO NOTHING
                "#,
            )
            .bind(equipment_id)
            .bind(&entry.name)
            .bind(&entry.version)
            .bind(&entry.publisher)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }

        if !reported.is_empty() {
            let names: Vec<&str> = reported.iter().map(|e| e.name.as_str()).collect();
            let versions: Vec<&str> = reported.iter().map(|e| e.version.as_str()).collect();
            sqlx::query(
                r#"
                UPDATE installed_software s SET last_seen = NOW()
                FROM UNNEST($2::text[], $3::text[]) AS r(name, version)
                WHERE s.equipment_id = $1 AND s.name = r.name AND s.version = r.version
                "#,
            )
            .bind(equipment_id)
            .bind(&names)
            .bind(&versions)
            .execute(&mut *conn)
            .await?;
        }

        let mut removed = 0;
        if remove_stale {
            for (name, version) in diff.stale {
                removed += sqlx::query(
                    "DELETE FROM installed_software WHERE equipment_id = $1 AND name = $2 AND version = $3",
                )
                .bind(equipment_id)
                .bind(&name)
                .bind(&version)
                .execute(&mut *conn)
                .await?
                .rows_affected();
            }
        }

        Ok((added, removed))
    }

    async fn sync_peripherals(
        conn: &mut PgConnection,
        equipment_id: i32,
        reported: &[PeripheralEntry],
        remove_stale: bool,
    ) -> AppResult<(u64, u64)> {
        let existing: Vec<(String, String)> =
            sqlx::query_as("SELECT kind, name FROM peripherals WHERE equipment_id = $1")
                .bind(equipment_id)
                .fetch_all(&mut *conn)
                .await?;

        let diff = reconcile(&existing, reported, PeripheralEntry::key);

        let mut added = 0;
        for entry in diff.to_add {
            added += sqlx::query(
                r#"
                INSERT INTO peripherals (equipment_id, kind, name, serial_number)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (equipment_id, kind, name) DO NOTHING
                "#,
            )
            .bind(equipment_id)
            .bind(&entry.kind)
            .bind(&entry.name)
            .bind(&entry.serial_number)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        }

        let mut removed = 0;
        if remove_stale {
            for (kind, name) in diff.stale {
                removed += sqlx::query(
                    "DELETE FROM peripherals WHERE equipment_id = $1 AND kind = $2 AND name = $3",
                )
                .bind(equipment_id)
                .bind(&kind)
                .bind(&name)
                .execute(&mut *conn)
                .await?
                .rows_affected();
            }
        }

        Ok((added, removed))
    }
}
