// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::io::{BufRead, Write};
use std::time::Instant;
use time::Date;
use verdant_app::{
    ChatSender, FeedPhase, IdentityProvider, JournalPlantId, JournalTaskId, Remedy, Season,
    SeasonalPlant, SessionContext, Subject, TaskFilter, season_for_date,
};
use verdant_chat::{Assistant, Conversation};
use verdant_db::Store;
use verdant_remote::{
    Backend, RemediesFeed, TermsGate, featured_plant, list_seasonal_plants, public_image_url,
};

/// Where remedy image paths resolve to when they are not absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLinks {
    pub storage_base: String,
    pub bucket: String,
}

/// Commands backed by the hosted tables. The local store only holds the
/// device identity and the accepted-terms flag.
pub struct RemoteRuntime<'a> {
    backend: &'a dyn Backend,
    identity: &'a dyn IdentityProvider,
    store: &'a Store,
    session: &'a SessionContext,
    scope: String,
    images: Option<ImageLinks>,
}

impl<'a> RemoteRuntime<'a> {
    pub fn new(
        backend: &'a dyn Backend,
        identity: &'a dyn IdentityProvider,
        store: &'a Store,
        session: &'a SessionContext,
        scope: &str,
    ) -> Self {
        Self {
            backend,
            identity,
            store,
            session,
            scope: scope.to_owned(),
            images: None,
        }
    }

    pub fn with_images(mut self, images: ImageLinks) -> Self {
        self.images = Some(images);
        self
    }

    /// Loads up to `pages` pages for `search` and prints what was loaded. A
    /// failed page keeps the rows already shown and is reported after them.
    pub fn remedies(&self, search: &str, pages: usize, out: &mut dyn Write) -> Result<()> {
        let mut feed = RemediesFeed::new(self.backend, search, Instant::now());
        feed.flush();
        for _ in 1..pages.max(1) {
            if feed.view().phase() == FeedPhase::Errored || feed.fetch_more().is_none() {
                break;
            }
        }

        let view = feed.view();
        if view.items().is_empty() && view.error().is_none() {
            writeln!(out, "no remedies match {:?}", view.search().trim())?;
        }
        for remedy in view.items() {
            self.write_remedy(remedy, out)?;
        }
        if let Some(error) = view.error() {
            bail!("load remedies: {error}");
        }
        if view.has_more() {
            writeln!(
                out,
                "-- {} shown, more available (use --pages {})",
                view.items().len(),
                view.page() + 2
            )?;
        }
        Ok(())
    }

    fn write_remedy(&self, remedy: &Remedy, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "{}", remedy.name)?;
        if let Some(description) = remedy.description.as_deref().filter(|d| !d.is_empty()) {
            writeln!(out, "  {description}")?;
        }
        if !remedy.uses.is_empty() {
            writeln!(out, "  uses: {}", remedy.uses.join(", "))?;
        }
        for (label, value) in [
            ("preparation", &remedy.preparation),
            ("dosage", &remedy.dosage),
            ("warnings", &remedy.warnings),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                writeln!(out, "  {label}: {value}")?;
            }
        }
        if let (Some(images), Some(image)) = (&self.images, remedy.image.as_deref())
            && let Some(url) = public_image_url(&images.storage_base, &images.bucket, image)
        {
            writeln!(out, "  image: {url}")?;
        }
        Ok(())
    }

    pub fn seasonal(
        &self,
        season: Option<Season>,
        term: Option<&str>,
        today: Date,
        out: &mut dyn Write,
    ) -> Result<()> {
        let season = season.unwrap_or_else(|| season_for_date(today));
        let plants = list_seasonal_plants(self.backend, Some(season), term)?;
        writeln!(out, "{} ({} plants)", season.as_str(), plants.len())?;
        for plant in &plants {
            write_plant_summary(plant, out)?;
        }
        Ok(())
    }

    pub fn featured(
        &self,
        season: Option<Season>,
        seed: u64,
        today: Date,
        out: &mut dyn Write,
    ) -> Result<()> {
        let season = season.unwrap_or_else(|| season_for_date(today));
        let Some(plant) = featured_plant(self.backend, season, seed)? else {
            writeln!(out, "nothing to plant in {} yet", season.as_str())?;
            return Ok(());
        };

        writeln!(out, "Featured for {}: {}", season.as_str(), plant.name)?;
        if !plant.summary.is_empty() {
            writeln!(out, "  {}", plant.summary)?;
        }
        for (label, value) in plant.guide.entries() {
            if !value.is_empty() {
                writeln!(out, "  {label}: {value}")?;
            }
        }
        Ok(())
    }

    pub fn terms(&self, accept: bool, out: &mut dyn Write) -> Result<()> {
        let mut gate = TermsGate::new(self.backend, self.identity, self.store, &self.scope);
        gate.load()?;

        if let Some(Subject::Device(_)) = gate.state().subject()
            && self.session.mark_auth_prompt_shown()
        {
            writeln!(
                out,
                "not signed in; acceptance is recorded for this device (set [remote].access_token to use your account)"
            )?;
        }

        let Some(terms) = gate.state().terms().cloned() else {
            writeln!(out, "no active terms for scope {:?}", self.scope)?;
            return Ok(());
        };

        writeln!(out, "{} terms, version {}", terms.scope, terms.version)?;
        if !terms.content.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", terms.content)?;
            writeln!(out)?;
        }

        if !gate.state().needs_acceptance() {
            writeln!(out, "status: accepted")?;
            return Ok(());
        }
        if !accept {
            writeln!(out, "status: acceptance required (run `verdant terms --accept`)")?;
            return Ok(());
        }

        if gate.accept()? {
            writeln!(out, "status: accepted version {}", terms.version)?;
        }
        Ok(())
    }
}

fn write_plant_summary(plant: &SeasonalPlant, out: &mut dyn Write) -> Result<()> {
    if plant.summary.is_empty() {
        writeln!(out, "- {}", plant.name)?;
    } else {
        writeln!(out, "- {}: {}", plant.name, plant.summary)?;
    }
    Ok(())
}

/// Commands that only touch the local store.
pub struct DbRuntime<'a> {
    store: &'a Store,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn list_tasks(&self, filter: TaskFilter, out: &mut dyn Write) -> Result<()> {
        let tasks = self.store.list_tasks(filter)?;
        for task in &tasks {
            let mark = if task.done { "x" } else { " " };
            writeln!(out, "[{mark}] {:>4}  {}", task.id.get(), task.label)?;
        }
        writeln!(out, "{} open", self.store.open_task_count()?)?;
        Ok(())
    }

    pub fn add_task(&self, label: &str, out: &mut dyn Write) -> Result<()> {
        let id = self.store.add_task(label)?;
        writeln!(out, "added task {}", id.get())?;
        Ok(())
    }

    pub fn toggle_task(&self, id: i64, out: &mut dyn Write) -> Result<()> {
        let done = self.store.toggle_task(JournalTaskId::new(id))?;
        let state = if done { "done" } else { "open" };
        writeln!(out, "task {id} is now {state}")?;
        Ok(())
    }

    pub fn delete_task(&self, id: i64, out: &mut dyn Write) -> Result<()> {
        self.store.delete_task(JournalTaskId::new(id))?;
        writeln!(out, "deleted task {id}")?;
        Ok(())
    }

    pub fn list_plants(&self, out: &mut dyn Write) -> Result<()> {
        let plants = self.store.list_plants()?;
        if plants.is_empty() {
            writeln!(out, "no plants in your journal yet")?;
        }
        for plant in &plants {
            writeln!(out, "{:>4}  {}  {}", plant.id.get(), plant.name, plant.image_url)?;
        }
        Ok(())
    }

    pub fn add_plant(&self, name: &str, image_url: &str, out: &mut dyn Write) -> Result<()> {
        let id = self.store.add_plant(name, image_url)?;
        writeln!(out, "added plant {}", id.get())?;
        Ok(())
    }

    pub fn delete_plant(&self, id: i64, out: &mut dyn Write) -> Result<()> {
        self.store.delete_plant(JournalPlantId::new(id))?;
        writeln!(out, "deleted plant {id}")?;
        Ok(())
    }

    pub fn onboarding(&self, mark_seen: bool, reset: bool, out: &mut dyn Write) -> Result<()> {
        if reset {
            self.store.reset_onboarding()?;
        } else if mark_seen {
            self.store.mark_onboarding_seen()?;
        }
        let seen = if self.store.has_seen_onboarding()? {
            "seen"
        } else {
            "not seen"
        };
        let terms = if self.store.terms_accepted()? {
            "accepted"
        } else {
            "not accepted"
        };
        writeln!(out, "onboarding: {seen}")?;
        writeln!(out, "terms: {terms}")?;
        Ok(())
    }
}

/// Reads one question per line until end of input and prints each reply.
/// Nothing is stored locally.
pub fn chat(assistant: &dyn Assistant, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    let mut conversation = Conversation::open(assistant);
    for message in conversation.messages() {
        write_chat_line(message.sender, &message.text, out)?;
    }

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        if let Some(reply) = conversation.send(&line) {
            write_chat_line(reply.sender, &reply.text, out)?;
        }
    }
    Ok(())
}

fn write_chat_line(sender: ChatSender, text: &str, out: &mut dyn Write) -> Result<()> {
    let who = match sender {
        ChatSender::User => "you",
        ChatSender::Assistant => "assistant",
    };
    writeln!(out, "{who}> {text}")?;
    Ok(())
}
