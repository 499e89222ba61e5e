// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use verdant_app::{Season, SeasonalPlant, featured_index};

use crate::{Backend, Direction, Query};

pub const SEASONAL_TABLE: &str = "seasonal_plants";
pub const SEASONAL_COLUMNS: [&str; 6] = ["id", "name", "season", "image_url", "summary", "guide"];
pub const FEATURED_POOL: usize = 50;

pub fn seasonal_query(season: Option<Season>, term: Option<&str>) -> Query {
    let mut query = Query::new(SEASONAL_TABLE).select(&SEASONAL_COLUMNS);
    if let Some(season) = season {
        query = query.eq("season", season.as_str());
    }
    if let Some(term) = term.map(str::trim).filter(|term| !term.is_empty()) {
        query = query.contains_any(&["name", "summary"], term);
    }
    query.order("name", Direction::Ascending)
}

pub fn list_seasonal_plants(
    backend: &dyn Backend,
    season: Option<Season>,
    term: Option<&str>,
) -> Result<Vec<SeasonalPlant>> {
    let rows = backend
        .select(&seasonal_query(season, term))
        .inspect_err(|error| {
            tracing::debug!(season = ?season, "list seasonal plants failed: {error:#}");
        })?;
    tracing::debug!(rows = rows.rows.len(), season = ?season, "listed seasonal plants");
    rows.decode(SEASONAL_TABLE)
}

/// Picks one of the first [`FEATURED_POOL`] plants of the season.
pub fn featured_plant(
    backend: &dyn Backend,
    season: Season,
    seed: u64,
) -> Result<Option<SeasonalPlant>> {
    let query = seasonal_query(Some(season), None).limit(FEATURED_POOL);
    let mut plants: Vec<SeasonalPlant> = backend
        .select(&query)
        .inspect_err(|error| {
            tracing::debug!(season = ?season, "load featured plants failed: {error:#}");
        })?
        .decode(SEASONAL_TABLE)?;
    Ok(featured_index(plants.len(), seed).map(|index| plants.swap_remove(index)))
}
