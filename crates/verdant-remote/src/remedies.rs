// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use verdant_app::{PageRequest, Remedy, RemedyPage};

use crate::{Backend, Direction, Query};

pub const REMEDIES_TABLE: &str = "remedies";

pub const REMEDY_COLUMNS: [&str; 8] = [
    "id",
    "name",
    "description",
    "image",
    "uses",
    "preparation",
    "dosage",
    "warnings",
];

const SEARCH_COLUMNS: [&str; 2] = ["name", "description"];

/// Name-ordered remedies query, filtered on name or description when the
/// trimmed term is non-empty.
pub fn remedies_query(term: Option<&str>) -> Query {
    let query = Query::new(REMEDIES_TABLE)
        .select(&REMEDY_COLUMNS)
        .order("name", Direction::Ascending);
    match term.map(str::trim).filter(|term| !term.is_empty()) {
        Some(term) => query.contains_any(&SEARCH_COLUMNS, term),
        None => query,
    }
}

/// Backend failures are returned as the backend reported them.
pub fn list_remedies(backend: &dyn Backend, term: Option<&str>) -> Result<Vec<Remedy>> {
    let query = remedies_query(term);
    let rows = backend
        .select(&query)
        .inspect_err(|error| tracing::debug!(term = ?term, "list remedies failed: {error:#}"))?;
    tracing::debug!(rows = rows.rows.len(), term = ?term, "listed remedies");
    rows.decode(REMEDIES_TABLE)
}

/// One page of the remedies view, with the exact total when the backend
/// reports it.
pub fn fetch_remedy_page(backend: &dyn Backend, request: &PageRequest) -> Result<RemedyPage> {
    let query = remedies_query(request.term())
        .range(request.from, request.to)
        .count_exact();
    let rows = backend.select(&query).inspect_err(|error| {
        tracing::debug!(
            from = request.from,
            to = request.to,
            "load remedies page failed: {error:#}"
        );
    })?;
    let total = rows.total;
    tracing::debug!(
        ticket = request.ticket,
        from = request.from,
        to = request.to,
        fetched = rows.rows.len(),
        total = ?total,
        "fetched remedies page"
    );
    Ok(RemedyPage {
        rows: rows.decode(REMEDIES_TABLE)?,
        total,
    })
}

/// Image references are either absolute URLs or paths inside a public
/// storage bucket.
pub fn public_image_url(storage_base: &str, bucket: &str, image: &str) -> Option<String> {
    let image = image.trim();
    if image.is_empty() {
        return None;
    }
    if image.starts_with("http://") || image.starts_with("https://") {
        return Some(image.to_owned());
    }
    Some(format!(
        "{}/storage/v1/object/public/{}/{}",
        storage_base.trim_end_matches('/'),
        bucket.trim_matches('/'),
        image.trim_start_matches('/')
    ))
}
