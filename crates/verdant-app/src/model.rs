// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

pub const DEFAULT_TERMS_SCOPE: &str = "remedies";

/// A herbal remedy row. `uses` is normalized while deserializing, so every
/// `Remedy` in memory already holds trimmed, non-empty entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Remedy {
    pub id: RemedyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "deserialize_uses")]
    pub uses: Vec<String>,
    #[serde(default)]
    pub preparation: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub warnings: Option<String>,
}

/// The shapes `uses` arrives in: a Postgres `text[]` or one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawUses {
    List(Vec<Option<String>>),
    Text(String),
}

pub fn normalize_uses(raw: Option<RawUses>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(RawUses::Text(text)) => split_uses(&text),
        Some(RawUses::List(items)) => items
            .into_iter()
            .flatten()
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect(),
    }
}

pub fn split_uses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn deserialize_uses<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawUses>::deserialize(deserializer)?;
    Ok(normalize_uses(raw))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_guide<'de, D>(deserializer: D) -> Result<Guide, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Guide>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Self; 4] = [Self::Spring, Self::Summer, Self::Autumn, Self::Winter];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Autumn => "Autumn",
            Self::Winter => "Winter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spring" => Some(Self::Spring),
            "summer" => Some(Self::Summer),
            "autumn" | "fall" => Some(Self::Autumn),
            "winter" => Some(Self::Winter),
            _ => None,
        }
    }
}

/// Growing guide stored as jsonb. Missing or null fields read as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guide {
    #[serde(deserialize_with = "null_as_empty")]
    pub sow: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub position: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub spacing: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub soil: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub water: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub feed: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub pests: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub harvest: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub notes: String,
}

impl Guide {
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("sow", &self.sow),
            ("position", &self.position),
            ("spacing", &self.spacing),
            ("soil", &self.soil),
            ("water", &self.water),
            ("feed", &self.feed),
            ("pests", &self.pests),
            ("harvest", &self.harvest),
            ("notes", &self.notes),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeasonalPlant {
    pub id: String,
    pub name: String,
    pub season: Season,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default_guide")]
    pub guide: Guide,
}

/// One published version of the terms for a scope. Rows come from the
/// latest-active query, so `active` defaults to true when the column is not
/// selected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermsVersion {
    pub scope: String,
    pub version: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default = "default_active", rename = "is_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceRecord {
    pub subject_id: String,
    pub scope: String,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Authenticated(String),
    Device(String),
}

impl Subject {
    pub fn id(&self) -> &str {
        match self {
            Self::Authenticated(id) | Self::Device(id) => id,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "user",
            Self::Device(_) => "device",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    DeviceId,
    TermsAccepted,
    HasSeenOnboarding,
}

impl SettingKey {
    pub const ALL: [Self; 3] = [Self::DeviceId, Self::TermsAccepted, Self::HasSeenOnboarding];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceId => "device_id_v1",
            Self::TermsAccepted => "acceptedTerms",
            Self::HasSeenOnboarding => "hasSeenGuide",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "device_id_v1" => Some(Self::DeviceId),
            "acceptedTerms" => Some(Self::TermsAccepted),
            "hasSeenGuide" => Some(Self::HasSeenOnboarding),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::DeviceId => "device id",
            Self::TermsAccepted => "terms accepted",
            Self::HasSeenOnboarding => "onboarding seen",
        }
    }

    pub const fn expected_value_kind(self) -> SettingValueKind {
        match self {
            Self::DeviceId => SettingValueKind::Text,
            Self::TermsAccepted | Self::HasSeenOnboarding => SettingValueKind::Bool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValueKind {
    Bool,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Text(String),
}

impl SettingValue {
    pub fn parse_for_key(key: SettingKey, raw: &str) -> Option<Self> {
        match key.expected_value_kind() {
            SettingValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(Self::Bool(true)),
                "0" | "false" | "off" | "no" => Some(Self::Bool(false)),
                _ => None,
            },
            SettingValueKind::Text => Some(Self::Text(raw.to_owned())),
        }
    }

    pub fn to_storage(&self, key: SettingKey) -> Option<String> {
        match (key.expected_value_kind(), self) {
            (SettingValueKind::Bool, Self::Bool(value)) => {
                Some(if *value { "true" } else { "false" }.to_owned())
            }
            (SettingValueKind::Text, Self::Text(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Bool(true) => "on".to_owned(),
            Self::Bool(false) => "off".to_owned(),
            Self::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSetting {
    pub key: SettingKey,
    pub value: SettingValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalTask {
    pub id: JournalTaskId,
    pub label: String,
    pub done: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Open,
    Done,
}

impl TaskFilter {
    pub const ALL: [Self; 3] = [Self::All, Self::Open, Self::Done];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Open => "open",
            Self::Done => "done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "open" => Some(Self::Open),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub const fn matches(self, task: &JournalTask) -> bool {
        match self {
            Self::All => true,
            Self::Open => !task.done,
            Self::Done => task.done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalPlant {
    pub id: JournalPlantId,
    pub name: String,
    pub image_url: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: &str) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.to_owned(),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            sender: ChatSender::Assistant,
            text: text.to_owned(),
        }
    }
}
