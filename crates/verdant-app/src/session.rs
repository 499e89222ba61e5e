// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-lifetime flags shared by every screen of one run. Constructed once
/// by the front end and handed to whatever needs it.
#[derive(Debug, Default)]
pub struct SessionContext {
    auth_prompt_shown: AtomicBool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the first caller in this session.
    pub fn mark_auth_prompt_shown(&self) -> bool {
        !self.auth_prompt_shown.swap(true, Ordering::SeqCst)
    }

    pub fn auth_prompt_shown(&self) -> bool {
        self.auth_prompt_shown.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.auth_prompt_shown.store(false, Ordering::SeqCst);
    }
}
