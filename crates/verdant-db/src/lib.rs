// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use verdant_app::{
    AppSetting, JournalPlant, JournalPlantId, JournalTask, JournalTaskId, KeyValueStore,
    SettingKey, SettingValue, TaskFilter,
};

pub const APP_NAME: &str = "verdant";
pub const DB_PATH_ENV: &str = "VERDANT_DB_PATH";

/// Stamped into `PRAGMA user_version` when the schema is created.
const SCHEMA_VERSION: i64 = 1;

/// Columns the queries in this file read or write, per table.
const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("settings", &["key", "value", "updated_at"]),
    (
        "journal_tasks",
        &["id", "label", "done", "created_at", "updated_at"],
    ),
    ("journal_plants", &["id", "name", "image_url", "created_at"]),
];

/// Table name to column names for every user table.
type SchemaLayout = BTreeMap<String, BTreeSet<String>>;

/// On-device state: persisted flags and the garden journal.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    /// Creates the schema in an empty database. A non-empty one must carry
    /// every required table and column and a schema version this build knows.
    pub fn bootstrap(&self) -> Result<()> {
        let layout = schema_layout(&self.conn)?;
        if layout.is_empty() {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            tracing::debug!(version = SCHEMA_VERSION, "created local schema");
        } else {
            check_layout(&layout)?;
            let version = schema_version(&self.conn)?;
            if version > SCHEMA_VERSION {
                bail!(
                    "database schema version {version} is newer than this build supports ({SCHEMA_VERSION}); upgrade verdant or point [storage].db_path elsewhere"
                );
            }
        }

        self.conn
            .execute_batch(include_str!("sql/indexes.sql"))
            .context("create journal indexes")?;
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
            .context("stamp schema version")
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(schema_layout(&self.conn)?.into_keys().collect())
    }

    pub fn get_setting(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        let raw = self.get_setting_raw(key.as_str())?;
        raw.map(|value| {
            SettingValue::parse_for_key(key, &value).ok_or_else(|| {
                anyhow!(
                    "setting `{}` has invalid value `{}`; run `verdant onboarding reset` or clear the database",
                    key.as_str(),
                    value
                )
            })
        })
        .transpose()
    }

    pub fn put_setting(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        let raw = value.to_storage(key).ok_or_else(|| {
            anyhow!(
                "setting `{}` expected {:?} value",
                key.as_str(),
                key.expected_value_kind()
            )
        })?;
        self.put_setting_raw(key.as_str(), &raw)
    }

    pub fn clear_setting(&self, key: SettingKey) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?", params![key.as_str()])
            .with_context(|| format!("clear setting {}", key.as_str()))?;
        Ok(())
    }

    /// Every known setting, stored or defaulted.
    pub fn list_settings(&self) -> Result<Vec<AppSetting>> {
        let mut settings = Vec::with_capacity(SettingKey::ALL.len());
        for key in SettingKey::ALL {
            let value = self
                .get_setting(key)?
                .unwrap_or_else(|| default_setting_value(key));
            settings.push(AppSetting { key, value });
        }
        Ok(settings)
    }

    pub fn has_seen_onboarding(&self) -> Result<bool> {
        self.get_flag(SettingKey::HasSeenOnboarding)
    }

    pub fn mark_onboarding_seen(&self) -> Result<()> {
        self.put_setting(SettingKey::HasSeenOnboarding, SettingValue::Bool(true))
    }

    pub fn reset_onboarding(&self) -> Result<()> {
        self.clear_setting(SettingKey::HasSeenOnboarding)
    }

    pub fn terms_accepted(&self) -> Result<bool> {
        self.get_flag(SettingKey::TermsAccepted)
    }

    pub fn put_terms_accepted(&self, accepted: bool) -> Result<()> {
        self.put_setting(SettingKey::TermsAccepted, SettingValue::Bool(accepted))
    }

    fn get_flag(&self, key: SettingKey) -> Result<bool> {
        match self.get_setting(key)? {
            Some(SettingValue::Bool(value)) => Ok(value),
            Some(SettingValue::Text(_)) => bail!("setting `{}` must be on/off", key.as_str()),
            None => Ok(false),
        }
    }

    pub fn add_task(&self, label: &str) -> Result<JournalTaskId> {
        let label = label.trim();
        if label.is_empty() {
            bail!("task label must not be empty");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "INSERT INTO journal_tasks (label, done, created_at, updated_at) VALUES (?, 0, ?, ?)",
                params![label, now, now],
            )
            .context("insert journal task")?;
        Ok(JournalTaskId::new(self.conn.last_insert_rowid()))
    }

    /// Flips a task between open and done, returning the new state.
    pub fn toggle_task(&self, task_id: JournalTaskId) -> Result<bool> {
        let now = now_rfc3339()?;
        let done: Option<bool> = self
            .conn
            .query_row(
                "
                UPDATE journal_tasks
                SET done = 1 - done, updated_at = ?
                WHERE id = ?
                RETURNING done
                ",
                params![now, task_id.get()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("toggle journal task {}", task_id.get()))?;
        done.ok_or_else(|| anyhow!("journal task {} not found", task_id.get()))
    }

    pub fn delete_task(&self, task_id: JournalTaskId) -> Result<()> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM journal_tasks WHERE id = ?",
                params![task_id.get()],
            )
            .with_context(|| format!("delete journal task {}", task_id.get()))?;
        if deleted == 0 {
            bail!("journal task {} not found", task_id.get());
        }
        Ok(())
    }

    pub fn get_task(&self, task_id: JournalTaskId) -> Result<JournalTask> {
        self.conn
            .query_row(
                "SELECT id, label, done, created_at FROM journal_tasks WHERE id = ?",
                params![task_id.get()],
                task_from_row,
            )
            .optional()
            .with_context(|| format!("load journal task {}", task_id.get()))?
            .ok_or_else(|| anyhow!("journal task {} not found", task_id.get()))
    }

    /// Tasks matching the filter, newest first.
    pub fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<JournalTask>> {
        let sql = match filter {
            TaskFilter::All => {
                "SELECT id, label, done, created_at FROM journal_tasks ORDER BY id DESC"
            }
            TaskFilter::Open => {
                "SELECT id, label, done, created_at FROM journal_tasks WHERE done = 0 ORDER BY id DESC"
            }
            TaskFilter::Done => {
                "SELECT id, label, done, created_at FROM journal_tasks WHERE done = 1 ORDER BY id DESC"
            }
        };
        let mut stmt = self
            .conn
            .prepare(sql)
            .context("prepare journal tasks query")?;
        let rows = stmt
            .query_map([], task_from_row)
            .context("query journal tasks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect {} journal tasks", filter.as_str()))
    }

    pub fn open_task_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM journal_tasks WHERE done = 0",
                [],
                |row| row.get(0),
            )
            .context("count open journal tasks")?;
        usize::try_from(count).context("open task count out of range")
    }

    pub fn add_plant(&self, name: &str, image_url: &str) -> Result<JournalPlantId> {
        let name = name.trim();
        let image_url = image_url.trim();
        if name.is_empty() || image_url.is_empty() {
            bail!("a journal plant needs both a name and an image");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "INSERT INTO journal_plants (name, image_url, created_at) VALUES (?, ?, ?)",
                params![name, image_url, now],
            )
            .context("insert journal plant")?;
        Ok(JournalPlantId::new(self.conn.last_insert_rowid()))
    }

    pub fn list_plants(&self) -> Result<Vec<JournalPlant>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, image_url, created_at
                FROM journal_plants
                ORDER BY id DESC
                ",
            )
            .context("prepare journal plants query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(JournalPlant {
                    id: JournalPlantId::new(row.get(0)?),
                    name: row.get(1)?,
                    image_url: row.get(2)?,
                    created_at: timestamp_at(row, 3)?,
                })
            })
            .context("query journal plants")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect journal plants")
    }

    pub fn delete_plant(&self, plant_id: JournalPlantId) -> Result<()> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM journal_plants WHERE id = ?",
                params![plant_id.get()],
            )
            .with_context(|| format!("delete journal plant {}", plant_id.get()))?;
        if deleted == 0 {
            bail!("journal plant {} not found", plant_id.get());
        }
        Ok(())
    }

    fn get_setting_raw(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("read setting {key}"))
    }

    fn put_setting_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, now],
            )
            .with_context(|| format!("upsert setting {key}"))?;
        Ok(())
    }
}

impl KeyValueStore for Store {
    fn get_value(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        self.get_setting(key)
    }

    fn put_value(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        self.put_setting(key, value)
    }
}

/// `VERDANT_DB_PATH` when set and non-empty, otherwise `verdant/verdant.db`
/// under the platform data directory. Callers create the parent directory.
pub fn default_db_path() -> Result<PathBuf> {
    match env::var_os(DB_PATH_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => dirs::data_local_dir()
            .map(|root| root.join(APP_NAME).join("verdant.db"))
            .ok_or_else(|| {
                anyhow!("no platform data directory; set {DB_PATH_ENV} or [storage].db_path")
            }),
    }
}

/// Rejects paths SQLite would read as a URI or that carry URI query
/// parameters. `:memory:` is allowed for throwaway stores.
pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path is empty; set [storage].db_path or {DB_PATH_ENV}");
    }
    if path == ":memory:" {
        return Ok(());
    }

    let has_scheme = path.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    });
    if has_scheme || path.starts_with("file:") {
        bail!("database path {path:?} looks like a URI; give a filesystem path instead");
    }
    if path.contains('?') {
        bail!("database path {path:?} has query parameters; give a plain filesystem path");
    }
    Ok(())
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalTask> {
    Ok(JournalTask {
        id: JournalTaskId::new(row.get(0)?),
        label: row.get(1)?,
        done: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
    })
}

fn schema_layout(conn: &Connection) -> Result<SchemaLayout> {
    let mut stmt = conn
        .prepare(
            "
            SELECT m.name, c.name
            FROM sqlite_master AS m
            JOIN pragma_table_info(m.name) AS c
            WHERE m.type = 'table'
              AND m.name NOT LIKE 'sqlite_%'
            ",
        )
        .context("prepare schema layout query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("query schema layout")?;

    let mut layout = SchemaLayout::new();
    for row in rows {
        let (table, column) = row.context("read schema layout row")?;
        layout.entry(table).or_default().insert(column);
    }
    Ok(layout)
}

fn check_layout(layout: &SchemaLayout) -> Result<()> {
    for (table, required) in REQUIRED_SCHEMA {
        let Some(columns) = layout.get(*table) else {
            bail!(
                "database is missing required table `{table}`; point [storage].db_path at a verdant database"
            );
        };
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; remove the database to recreate it",
                missing.join(", ")
            );
        }
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("read schema version")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(5))
        .context("set sqlite busy timeout")?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )
    .context("configure sqlite pragmas")
}

fn default_setting_value(key: SettingKey) -> SettingValue {
    match key {
        SettingKey::DeviceId => SettingValue::Text(String::new()),
        SettingKey::TermsAccepted | SettingKey::HasSeenOnboarding => SettingValue::Bool(false),
    }
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    // Rows written by hand through the sqlite shell use CURRENT_TIMESTAMP.
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn timestamp_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, error.into())
    })
}
