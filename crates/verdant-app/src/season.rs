// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::{Date, Month};

use crate::Season;

/// Southern-hemisphere seasons: Dec-Feb summer, Mar-May autumn, Jun-Aug
/// winter, Sep-Nov spring.
pub const fn season_for_month(month: Month) -> Season {
    match month {
        Month::December | Month::January | Month::February => Season::Summer,
        Month::March | Month::April | Month::May => Season::Autumn,
        Month::June | Month::July | Month::August => Season::Winter,
        Month::September | Month::October | Month::November => Season::Spring,
    }
}

pub const fn season_for_date(date: Date) -> Season {
    season_for_month(date.month())
}

/// Index of the featured entry in a batch of `len` candidates.
pub fn featured_index(len: usize, seed: u64) -> Option<usize> {
    if len == 0 {
        return None;
    }
    usize::try_from(seed % len as u64).ok()
}
