// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use verdant_app::{AcceptanceRecord, TermsVersion};

use crate::{Backend, Direction, Query};

pub const TERMS_TABLE: &str = "terms";
pub const USER_TERMS_TABLE: &str = "user_terms";

/// Highest active version for the scope, if any is published.
pub fn latest_terms(backend: &dyn Backend, scope: &str) -> Result<Option<TermsVersion>> {
    let query = Query::new(TERMS_TABLE)
        .select(&["scope", "version", "content"])
        .eq("scope", scope)
        .eq("is_active", true)
        .order("version", Direction::Descending)
        .limit(1);
    let mut rows: Vec<TermsVersion> = backend
        .select(&query)
        .inspect_err(|error| tracing::debug!(scope, "load latest terms failed: {error:#}"))?
        .decode(TERMS_TABLE)?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}

pub fn has_accepted(backend: &dyn Backend, record: &AcceptanceRecord) -> Result<bool> {
    let query = Query::new(USER_TERMS_TABLE)
        .select(&["id"])
        .eq("subject_id", record.subject_id.as_str())
        .eq("scope", record.scope.as_str())
        .eq("version", record.version)
        .limit(1);
    let rows = backend.select(&query).inspect_err(|error| {
        tracing::debug!(
            scope = %record.scope,
            version = record.version,
            "acceptance lookup failed: {error:#}"
        );
    })?;
    Ok(!rows.rows.is_empty())
}

pub fn record_acceptance(backend: &dyn Backend, record: &AcceptanceRecord) -> Result<()> {
    let row = serde_json::to_value(record).context("encode acceptance record")?;
    backend.insert(USER_TERMS_TABLE, &row).inspect_err(|error| {
        tracing::debug!(
            scope = %record.scope,
            version = record.version,
            "recording acceptance failed: {error:#}"
        );
    })
}
