// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use config::Config;
use runtime::{DbRuntime, ImageLinks, RemoteRuntime};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::{Date, OffsetDateTime};
use verdant_app::{Season, SessionContext, TaskFilter};
use verdant_db::Store;
use verdant_remote::RestClient;

fn main() {
    if let Err(error) = Cli::parse().run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

/// Herbal remedies, seasonal planting and a garden journal from the terminal.
#[derive(Debug, Parser)]
#[command(name = "verdant", version, about)]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Use a specific config path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print resolved config path
    #[arg(long)]
    print_config_path: bool,

    /// Print resolved database path
    #[arg(long)]
    print_db_path: bool,

    /// Print a v1 config template
    #[arg(long)]
    print_example_config: bool,

    /// Validate config and database, then exit
    #[arg(long)]
    check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the remedies catalogue
    Remedies {
        /// Case-insensitive match on name or description
        search: Option<String>,

        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// List plants to sow this season
    Seasonal {
        /// Season to list; defaults to the current one
        #[arg(long, value_parser = parse_season)]
        season: Option<Season>,

        /// Case-insensitive match on name or summary
        #[arg(long)]
        search: Option<String>,
    },

    /// Show one featured plant with its growing guide
    Featured {
        #[arg(long, value_parser = parse_season)]
        season: Option<Season>,

        /// Selection seed; defaults to the day of the year
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show the latest terms and whether they are accepted
    Terms {
        /// Record acceptance of the latest version
        #[arg(long)]
        accept: bool,
    },

    /// Ask the plant assistant, one question per line on stdin
    Chat,

    /// Manage garden tasks and plant photos
    Journal {
        #[command(subcommand)]
        command: JournalCommand,
    },

    /// Show or change the onboarding flag
    Onboarding {
        /// Mark onboarding as seen
        #[arg(long)]
        done: bool,

        /// Show onboarding again on next launch
        #[arg(long, conflicts_with = "done")]
        reset: bool,
    },
}

#[derive(Debug, Subcommand)]
enum JournalCommand {
    /// List tasks, newest first
    Tasks {
        #[arg(long, value_parser = parse_task_filter, default_value = "all")]
        filter: TaskFilter,
    },
    /// Add a task
    AddTask { label: String },
    /// Flip a task between open and done
    Toggle { id: i64 },
    /// Delete a task
    DeleteTask { id: i64 },
    /// List plants, newest first
    Plants,
    /// Add a plant with a photo
    AddPlant { name: String, image_url: String },
    /// Delete a plant
    DeletePlant { id: i64 },
}

impl Cli {
    fn run(self) -> Result<()> {
        Self::setup_logging(self.verbose);

        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        let mut stdout = io::stdout().lock();

        if self.print_config_path {
            writeln!(stdout, "{}", config_path.display())?;
            return Ok(());
        }
        if self.print_example_config {
            write!(stdout, "{}", Config::example_config(&config_path))?;
            return Ok(());
        }

        let config = Config::load(&config_path).with_context(|| {
            format!(
                "load config {}; run `verdant --print-example-config` to generate a v1 template",
                config_path.display()
            )
        })?;

        let db_path = config.db_path()?;
        if self.print_db_path {
            writeln!(stdout, "{}", db_path.display())?;
            return Ok(());
        }

        let store = open_store(&db_path)?;
        if self.check {
            return check(&config, &config_path);
        }

        let Some(command) = self.command else {
            return DbRuntime::new(&store).onboarding(false, false, &mut stdout);
        };
        dispatch(command, &config, &store, &mut stdout)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn open_store(db_path: &Path) -> Result<Store> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create data directory {}", parent.display()))?;
    }
    let store = Store::open(db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or {}",
            db_path.display(),
            verdant_db::DB_PATH_ENV
        )
    })?;
    store.bootstrap()?;
    tracing::debug!(path = %db_path.display(), "opened database");
    Ok(store)
}

fn check(config: &Config, config_path: &Path) -> Result<()> {
    if config.remote.url.is_some() {
        remote_client(config).with_context(|| {
            format!(
                "invalid [remote] config in {}; fix url/api_key/timeout values",
                config_path.display()
            )
        })?;
    }
    chat_client(config).with_context(|| {
        format!(
            "invalid [chat] config in {}; fix base_url/timeout values",
            config_path.display()
        )
    })?;
    Ok(())
}

fn remote_client(config: &Config) -> Result<RestClient> {
    Ok(RestClient::new(
        config.remote_url()?,
        config.remote_api_key()?,
        config.remote_timeout()?,
    )?
    .with_access_token(config.remote_access_token()))
}

fn chat_client(config: &Config) -> Result<verdant_chat::Client> {
    verdant_chat::Client::new(config.chat_base_url(), config.chat_timeout()?)
}

fn dispatch(command: Command, config: &Config, store: &Store, out: &mut dyn Write) -> Result<()> {
    let local = DbRuntime::new(store);
    match command {
        Command::Journal { command } => match command {
            JournalCommand::Tasks { filter } => local.list_tasks(filter, out),
            JournalCommand::AddTask { label } => local.add_task(&label, out),
            JournalCommand::Toggle { id } => local.toggle_task(id, out),
            JournalCommand::DeleteTask { id } => local.delete_task(id, out),
            JournalCommand::Plants => local.list_plants(out),
            JournalCommand::AddPlant { name, image_url } => local.add_plant(&name, &image_url, out),
            JournalCommand::DeletePlant { id } => local.delete_plant(id, out),
        },
        Command::Onboarding { done, reset } => local.onboarding(done, reset, out),
        Command::Chat => {
            let client = chat_client(config)?;
            runtime::chat(&client, &mut io::stdin().lock(), out)
        }
        Command::Remedies { search, pages } => with_remote(config, store, |remote, _| {
            remote.remedies(search.as_deref().unwrap_or(""), pages, out)
        }),
        Command::Seasonal { season, search } => with_remote(config, store, |remote, today| {
            remote.seasonal(season, search.as_deref(), today, out)
        }),
        Command::Featured { season, seed } => with_remote(config, store, |remote, today| {
            let seed = seed.unwrap_or_else(|| u64::from(today.ordinal()));
            remote.featured(season, seed, today, out)
        }),
        Command::Terms { accept } => {
            with_remote(config, store, |remote, _| remote.terms(accept, out))
        }
    }
}

/// Builds the remote runtime for one command and hands it today's date.
fn with_remote(
    config: &Config,
    store: &Store,
    run: impl FnOnce(&RemoteRuntime<'_>, Date) -> Result<()>,
) -> Result<()> {
    let client = remote_client(config)?;
    let session = SessionContext::new();
    let runtime = RemoteRuntime::new(&client, &client, store, &session, config.terms_scope())
        .with_images(ImageLinks {
            storage_base: client.base_url().to_owned(),
            bucket: config.image_bucket().to_owned(),
        });
    run(&runtime, OffsetDateTime::now_utc().date())
}

fn parse_season(raw: &str) -> Result<Season, String> {
    Season::parse(raw).ok_or_else(|| {
        format!("unknown season {raw:?}; expected spring, summer, autumn or winter")
    })
}

fn parse_task_filter(raw: &str) -> Result<TaskFilter, String> {
    TaskFilter::parse(raw)
        .ok_or_else(|| format!("unknown filter {raw:?}; expected all, open or done"))
}
