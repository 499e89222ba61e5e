// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use verdant_app::{IdentityProvider, KeyValueStore, Season, SettingKey, SettingValue};
use verdant_remote::{Backend, Direction, Filter, Query, Rows, USER_TERMS_TABLE};

const HERBS: [&str; 12] = [
    "Calendula",
    "Nettle",
    "Yarrow",
    "Thyme",
    "Sage",
    "Rosemary",
    "Fennel",
    "Elderflower",
    "Hawthorn",
    "Lemon balm",
    "Dandelion",
    "Plantain",
];

const PREPARATIONS: [&str; 6] = ["Tea", "Tincture", "Salve", "Syrup", "Poultice", "Infused oil"];

const USES: [&str; 9] = [
    "Sleep",
    "Digestion",
    "Colds",
    "Skin",
    "Anxiety",
    "Headache",
    "Inflammation",
    "Circulation",
    "Immunity",
];

const DOSAGES: [&str; 4] = [
    "1 cup up to three times daily",
    "20 drops in water twice daily",
    "Apply to the affected area as needed",
    "1 teaspoon before bed",
];

const WARNINGS: [&str; 4] = [
    "Avoid during pregnancy.",
    "May interact with blood thinners.",
    "Discontinue if irritation occurs.",
    "Not for children under 2.",
];

/// Hand-written remedies used by the search scenarios. Only "Ginger" has
/// "gin" in its name or description.
pub fn remedy_rows() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "name": "Valerian",
            "description": "Calming root for restless nights",
            "image": "herbs/valerian.jpg",
            "uses": "Sleep, Anxiety,  Headache",
            "preparation": "Steep the dried root for 10 minutes",
            "dosage": "1 cup before bed",
            "warnings": "May cause drowsiness.",
            "created_at": fixture_datetime(),
        }),
        json!({
            "id": 2,
            "name": "Ginger",
            "description": "Warming rhizome for the stomach",
            "image": "https://cdn.example.test/ginger.png",
            "uses": ["Nausea", " Digestion ", "", null],
            "preparation": "Slice fresh root into hot water",
            "dosage": "2-3 cups daily",
            "warnings": null,
            "created_at": fixture_datetime(),
        }),
        json!({
            "id": 3,
            "name": "Peppermint",
            "description": "Cooling leaf for tension and bloating",
            "image": null,
            "uses": null,
            "preparation": "Infuse fresh leaves",
            "dosage": null,
            "warnings": "Avoid with reflux.",
            "created_at": null,
        }),
        json!({
            "id": "c4",
            "name": "Chamomile",
            "description": "Gentle flower for calm and sleep",
            "image": "herbs/chamomile.jpg",
            "uses": ["Sleep", "Skin"],
            "preparation": "Steep flowers for 5 minutes",
            "dosage": "1 cup as needed",
            "warnings": "Avoid with ragweed allergy.",
            "created_at": fixture_datetime(),
        }),
        json!({
            "id": 5,
            "name": "Echinacea",
            "description": "Purple coneflower for seasonal colds",
            "image": "herbs/echinacea.jpg",
            "uses": "Colds,Immunity",
            "preparation": "Tincture of root and flower",
            "dosage": "20 drops three times daily",
            "warnings": null,
            "created_at": fixture_datetime(),
        }),
    ]
}

/// A small catalogue covering every season, in no particular order.
pub fn seasonal_plant_rows() -> Vec<Value> {
    vec![
        plant("sp-1", "Peas", Season::Spring, "Climbing pods for early crops"),
        plant("sp-2", "Beetroot", Season::Spring, "Sweet roots and edible leaves"),
        plant("su-1", "Tomato", Season::Summer, "Stake and pinch laterals"),
        plant("su-2", "Basil", Season::Summer, "Warm-weather herb for pesto"),
        plant("su-3", "Courgette", Season::Summer, "Fast and prolific"),
        plant("au-1", "Broad beans", Season::Autumn, "Hardy crop sown before winter"),
        plant("au-2", "Garlic", Season::Autumn, "Plant cloves pointy end up"),
        plant("wi-1", "Kale", Season::Winter, "Frost sweetens the leaves"),
        json!({
            "id": "wi-2",
            "name": "Silverbeet",
            "season": "Winter",
            "image_url": null,
            "summary": null,
            "guide": null,
        }),
    ]
}

fn plant(id: &str, name: &str, season: Season, summary: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "season": season.as_str(),
        "image_url": format!("https://cdn.example.test/{}.jpg", name.to_ascii_lowercase()),
        "summary": summary,
        "guide": {
            "sow": format!("Sow {} in {}", name.to_ascii_lowercase(), season.as_str().to_ascii_lowercase()),
            "position": "Full sun",
            "water": "Keep evenly moist",
            "harvest": null,
        },
    })
}

pub fn terms_row(scope: &str, version: i64, active: bool) -> Value {
    json!({
        "scope": scope,
        "version": version,
        "content": format!("{scope} terms, version {version}"),
        "is_active": active,
    })
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for bulk remedy rows. Names are unique and sort in
/// generation order.
#[derive(Debug, Clone)]
pub struct RemedyFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl RemedyFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub fn remedy(&mut self, index: usize) -> Value {
        let herb = self.pick(&HERBS);
        let preparation = self.pick(&PREPARATIONS);
        let uses = self.uses();
        // Alternate between the text and array shapes the table holds.
        let uses = if self.rng.bool() {
            Value::String(uses.join(", "))
        } else {
            Value::Array(uses.into_iter().map(Value::String).collect())
        };
        json!({
            "id": index as i64 + 1,
            "name": format!("Remedy {:03} {herb}", index + 1),
            "description": format!("{preparation} of {}", herb.to_ascii_lowercase()),
            "image": format!("remedies/{:03}.jpg", index + 1),
            "uses": uses,
            "preparation": preparation,
            "dosage": self.pick(&DOSAGES),
            "warnings": self.pick(&WARNINGS),
            "created_at": fixture_datetime(),
        })
    }

    pub fn remedies(&mut self, count: usize) -> Vec<Value> {
        (0..count).map(|index| self.remedy(index)).collect()
    }

    fn uses(&mut self) -> Vec<String> {
        let count = 1 + self.rng.int_n(3);
        let mut picked: Vec<String> = Vec::with_capacity(count);
        while picked.len() < count {
            let candidate = self.pick(&USES);
            if !picked.iter().any(|existing| existing == candidate) {
                picked.push(candidate.to_owned());
            }
        }
        picked
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// In-memory stand-in for the hosted tables. Evaluates the same filters,
/// ordering, ranges and counts the REST backend would.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RefCell<BTreeMap<String, Vec<Value>>>,
    failures: RefCell<BTreeMap<String, String>>,
    queries: RefCell<Vec<Query>>,
    next_id: Cell<i64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.seed(table, rows);
        self
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .borrow_mut()
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    /// Merges `patch` into every row of `table` accepted by `predicate`.
    pub fn update_where(&self, table: &str, predicate: impl Fn(&Value) -> bool, patch: Value) {
        let mut tables = self.tables.borrow_mut();
        let Some(rows) = tables.get_mut(table) else {
            return;
        };
        let Value::Object(patch) = patch else {
            return;
        };
        for row in rows.iter_mut().filter(|row| predicate(row)) {
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .borrow()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every following call on `table` fail with `message`.
    pub fn fail_table(&self, table: &str, message: &str) {
        self.failures
            .borrow_mut()
            .insert(table.to_owned(), message.to_owned());
    }

    pub fn clear_failure(&self, table: &str) {
        self.failures.borrow_mut().remove(table);
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.borrow().clone()
    }

    pub fn select_count(&self, table: &str) -> usize {
        self.queries
            .borrow()
            .iter()
            .filter(|query| query.table() == table)
            .count()
    }

    fn check_failure(&self, table: &str) -> Result<()> {
        if let Some(message) = self.failures.borrow().get(table) {
            bail!("{message}");
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn select(&self, query: &Query) -> Result<Rows> {
        self.queries.borrow_mut().push(query.clone());
        self.check_failure(query.table())?;

        let mut rows: Vec<Value> = self
            .rows(query.table())
            .into_iter()
            .filter(|row| query.filters().iter().all(|filter| row_matches(row, filter)))
            .collect();

        for (column, direction) in query.ordering().iter().rev() {
            rows.sort_by(|left, right| {
                let ordering = compare_values(left.get(column), right.get(column));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        let total = query.wants_count().then_some(rows.len());
        let offset = query.offset().unwrap_or(0);
        let limit = query.limit_rows().unwrap_or(usize::MAX);
        let rows = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, query.columns()))
            .collect();
        Ok(Rows { rows, total })
    }

    fn insert(&self, table: &str, row: &Value) -> Result<()> {
        self.check_failure(table)?;
        let Value::Object(fields) = row else {
            bail!("insert into {table}: row must be an object");
        };
        let mut fields = fields.clone();

        if table == USER_TERMS_TABLE {
            let key = |row: &Map<String, Value>| {
                (
                    row.get("subject_id").cloned(),
                    row.get("scope").cloned(),
                    row.get("version").cloned(),
                )
            };
            let wanted = key(&fields);
            let duplicate = self.rows(table).iter().any(|existing| {
                existing
                    .as_object()
                    .is_some_and(|existing| key(existing) == wanted)
            });
            if duplicate {
                return Err(anyhow!(
                    "duplicate key value violates unique constraint \"user_terms_subject_scope_version_key\""
                ));
            }
        }

        if !fields.contains_key("id") {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            fields.insert("id".to_owned(), Value::from(id));
        }
        self.seed(table, vec![Value::Object(fields)]);
        Ok(())
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq { column, value } => row.get(column).is_some_and(|field| value.matches(field)),
        Filter::ContainsAny { columns, term } => {
            let needle = term.to_lowercase();
            columns.iter().any(|column| {
                row.get(column)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
        }
    }
}

/// Postgres ascending order: nulls last, text case-insensitively.
fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.filter(|value| !value.is_null());
    let right = right.filter(|value| !value.is_null());
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::String(left)), Some(Value::String(right))) => left
            .to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right)),
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(left), Some(right)) => left.to_string().cmp(&right.to_string()),
    }
}

fn project(row: Value, columns: &[String]) -> Value {
    if columns.is_empty() {
        return row;
    }
    let Value::Object(mut fields) = row else {
        return row;
    };
    let projected: Map<String, Value> = columns
        .iter()
        .filter_map(|column| fields.remove(column).map(|value| (column.clone(), value)))
        .collect();
    Value::Object(projected)
}

/// Settings map standing in for on-device storage.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: RefCell<HashMap<String, SettingValue>>,
    writes: Cell<usize>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.values.borrow().get(key.as_str()).cloned()
    }
}

impl KeyValueStore for MemoryKv {
    fn get_value(&self, key: SettingKey) -> Result<Option<SettingValue>> {
        Ok(self.get(key))
    }

    fn put_value(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        self.values.borrow_mut().insert(key.as_str().to_owned(), value);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Identity provider with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
    failure: Option<String>,
}

impl StaticIdentity {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_owned()),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            user_id: None,
            failure: Some(message.to_owned()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn authenticated_user_id(&self) -> Result<Option<String>> {
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(self.user_id.clone())
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("verdant.db");
    Ok((dir, db_path))
}

/// Postgres `timestamp` columns come back without an offset.
pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56.123456"
}

pub fn herbs() -> &'static [&'static str] {
    &HERBS
}
