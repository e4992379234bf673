//! # Raidcall
//!
//! Recurring group events with role signups, reminders and scheduled
//! announcements.
//!
//! Usage:
//!   raidcall run                                   # Start the scheduler loop
//!   raidcall event create --name "MC" --type raid --channel 123 --start "2026-03-14 21:00"
//!   raidcall signup <EVENT> --user 42 --name Thrall --role Tank
//!   raidcall template export "Raid 20" --format toml

mod app;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use raidcall_core::{Event, RaidcallConfig};
use raidcall_scheduler::{TickOutcome, run_once, spawn_scheduler};
use raidcall_services::{CreateEventInput, EventService, SignupPolicy, SignupRequest};
use raidcall_store::TemplateFormat;
use tracing_subscriber::EnvFilter;

use crate::app::App;

#[derive(Parser)]
#[command(name = "raidcall", version, about = "⚔️ Raidcall: group event scheduling")]
struct Cli {
    /// Config file (defaults to ~/.raidcall/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run,
    /// Run a single scheduling pass and exit
    Tick {
        /// Pretend it is this time (YYYY-MM-DD HH:MM in the configured zone)
        #[arg(long)]
        at: Option<String>,
    },
    /// Create, inspect and administer events
    Event {
        #[command(subcommand)]
        cmd: EventCommands,
    },
    /// Sign a user up for a role
    Signup {
        event_id: String,
        #[arg(long)]
        user: String,
        /// Display name
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        class: Option<String>,
        /// Confirm immediately instead of waiting for an admin
        #[arg(long)]
        auto_confirm: bool,
    },
    /// Remove a user from every role on an event
    Withdraw {
        event_id: String,
        #[arg(long)]
        user: String,
    },
    /// Confirm a pending signup
    Confirm {
        event_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
        /// Confirming admin
        #[arg(long, default_value = "admin")]
        by: String,
    },
    /// Decline a signup
    Decline {
        event_id: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
    },
    /// Manage event templates
    Template {
        #[command(subcommand)]
        cmd: TemplateCommands,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// Create an event
    Create {
        #[arg(long)]
        name: String,
        /// Free-text category (raid, dungeon, pvp, ...)
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        channel: String,
        /// Start time (YYYY-MM-DD HH:MM in the configured zone)
        #[arg(long)]
        start: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        template: Option<String>,
        /// Repeat every N days (0 = one-shot)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        repeat_days: i64,
        /// Announce N hours before start instead of immediately
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        announce_hours: i64,
        /// Reminder lead in minutes (0 = configured default)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        reminder_minutes: i64,
        /// Remove the posted message N hours after start (0 = never)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        delete_after_hours: i64,
        /// Also create an external calendar entry
        #[arg(long)]
        external: bool,
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// List events
    List {
        /// Include completed and cancelled events
        #[arg(long)]
        all: bool,
    },
    /// Print an event as JSON
    Show { id: String },
    /// Cancel an event and retire its message
    Cancel { id: String },
    /// Delete an event permanently
    Delete { id: String },
    /// Send a reminder now
    Remind { id: String },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List templates
    List,
    /// Print a template
    Show {
        name: String,
        #[arg(long, default_value = "toml")]
        format: TemplateFormat,
    },
    /// Write a template to a file (or stdout)
    Export {
        name: String,
        #[arg(long, default_value = "json")]
        format: TemplateFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a template from a .json or .toml file
    Import {
        file: PathBuf,
        /// Override the format guessed from the extension
        #[arg(long)]
        format: Option<TemplateFormat>,
    },
    /// Copy a template under a new name
    Clone { source: String, new_name: String },
    /// Delete a template
    Delete { name: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<RaidcallConfig> {
    let mut config = match path {
        Some(path) => RaidcallConfig::load_from(path)?,
        None => RaidcallConfig::load()?,
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "raidcall=debug,raidcall_core=debug,raidcall_store=debug,raidcall_services=debug,raidcall_scheduler=debug"
    } else {
        "raidcall=info,raidcall_core=info,raidcall_store=info,raidcall_services=info,raidcall_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref())?;
    let app = App::build(config)?;

    match cli.command {
        Commands::Run => run(&app).await,
        Commands::Tick { at } => {
            let now = match at {
                Some(at) => app.parse_time(&at)?,
                None => app.clock.now(),
            };
            let report = run_once(&app.engine, &app.dispatcher, now).await;
            println!(
                "✅ Pass at {}: {} delivered, {} failed",
                app.local(now),
                report.delivered,
                report.failed
            );
            Ok(())
        }
        Commands::Event { cmd } => event_command(&app, cmd).await,
        Commands::Signup {
            event_id,
            user,
            name,
            role,
            class,
            auto_confirm,
        } => {
            let policy = if auto_confirm {
                SignupPolicy::AutoConfirm
            } else {
                SignupPolicy::RequireConfirmation
            };
            let request = SignupRequest {
                event_id,
                user_id: user,
                username: name,
                role,
                class,
            };
            let event = app.signups.signup(request, policy)?;
            app.rerender(&event).await;
            print_roster(&app, &event);
            Ok(())
        }
        Commands::Withdraw { event_id, user } => {
            let event = app.signups.cancel(&event_id, &user)?;
            app.rerender(&event).await;
            println!("👋 {user} withdrew from {}", event.name);
            Ok(())
        }
        Commands::Confirm {
            event_id,
            user,
            role,
            by,
        } => {
            let event = app.signups.confirm(&event_id, &user, &role, &by)?;
            app.rerender(&event).await;
            print_roster(&app, &event);
            Ok(())
        }
        Commands::Decline {
            event_id,
            user,
            role,
        } => {
            let event = app.signups.decline(&event_id, &user, &role)?;
            app.rerender(&event).await;
            print_roster(&app, &event);
            Ok(())
        }
        Commands::Template { cmd } => template_command(&app, cmd),
    }
}

async fn run(app: &App) -> Result<()> {
    tokio::select! {
        _ = spawn_scheduler(
            app.engine.clone(),
            app.dispatcher.clone(),
            app.clock.clone(),
            app.config.tick_interval_secs,
        ) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("👋 Shutting down scheduler");
        }
    }
    Ok(())
}

async fn event_command(app: &App, cmd: EventCommands) -> Result<()> {
    match cmd {
        EventCommands::Create {
            name,
            kind,
            channel,
            start,
            description,
            template,
            repeat_days,
            announce_hours,
            reminder_minutes,
            delete_after_hours,
            external,
            by,
        } => {
            let input = CreateEventInput {
                name,
                kind,
                description,
                start_time: app.parse_time(&start)?,
                channel,
                template_name: template,
                repeat_every_days: repeat_days,
                announce_hours,
                reminder_minutes,
                delete_after_hours,
                create_external_event: external,
                created_by: by,
            };
            let event = app.events.create(input)?;
            println!("✅ Event created! ID: {}", event.id);

            if EventService::needs_immediate_publication(&event, app.clock.now()) {
                app.dispatcher.publish(std::slice::from_ref(&event)).await;
            } else if let Some(at) = event.announcement_time {
                println!("   Announcement scheduled for {}", app.local(at));
            }
            Ok(())
        }
        EventCommands::List { all } => {
            let events = if all {
                app.store.list_all()
            } else {
                app.store.list_active()
            };
            if events.is_empty() {
                println!("No events.");
            }
            for e in events {
                let repeat = if e.is_recurring() {
                    format!(" (every {}d)", e.repeat_every_days)
                } else {
                    String::new()
                };
                println!(
                    "{}  {}  {:<10} {} [{}]{}  {} signups",
                    e.id,
                    app.local(e.start_time),
                    e.status.to_string(),
                    e.name,
                    e.kind,
                    repeat,
                    e.signup_count()
                );
            }
            Ok(())
        }
        EventCommands::Show { id } => {
            let event = app.store.get(&id)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
            Ok(())
        }
        EventCommands::Cancel { id } => {
            let event = app.events.cancel_event(&id)?;
            if event.is_posted() {
                app.dispatcher
                    .dispatch(&TickOutcome {
                        teardown: vec![event.clone()],
                        ..TickOutcome::default()
                    })
                    .await;
            }
            println!("🚫 Cancelled {}", event.name);
            Ok(())
        }
        EventCommands::Delete { id } => {
            let event = app.events.delete_event(&id)?;
            if event.is_posted()
                && let Err(e) = app.sink.teardown(&event).await
            {
                tracing::warn!("⚠️ Message of deleted event {id} not removed: {e}");
            }
            println!("🗑️ Deleted {}", event.name);
            Ok(())
        }
        EventCommands::Remind { id } => {
            let event = app.engine.remind_now(&id)?;
            app.sink.remind(&event).await?;
            println!("✅ Reminder sent for {}", event.name);
            Ok(())
        }
    }
}

fn template_command(app: &App, cmd: TemplateCommands) -> Result<()> {
    match cmd {
        TemplateCommands::List => {
            for t in app.catalog.list() {
                let slots: u32 = t.roles.iter().map(|r| r.limit).sum();
                println!(
                    "{} {}  ({} roles, {} slots)  {}",
                    t.icon,
                    t.name,
                    t.roles.len(),
                    slots,
                    t.description
                );
            }
            Ok(())
        }
        TemplateCommands::Show { name, format } => {
            let bytes = app.catalog.export(&name, format)?;
            println!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
        TemplateCommands::Export {
            name,
            format,
            output,
        } => {
            let bytes = app.catalog.export(&name, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✅ Exported '{name}' to {}", path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
            Ok(())
        }
        TemplateCommands::Import { file, format } => {
            let format = match format.or_else(|| TemplateFormat::from_path(&file)) {
                Some(format) => format,
                None => anyhow::bail!("Cannot tell the format of {}; pass --format", file.display()),
            };
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let template = app.catalog.import(&bytes, format)?;
            println!("✅ Imported template '{}'", template.name);
            Ok(())
        }
        TemplateCommands::Clone { source, new_name } => {
            let copy = app.catalog.clone_template(&source, &new_name, app.clock.now())?;
            println!("✅ Cloned '{source}' as '{}'", copy.name);
            Ok(())
        }
        TemplateCommands::Delete { name } => {
            app.catalog.delete(&name)?;
            println!("🗑️ Deleted template '{name}'");
            Ok(())
        }
    }
}

fn print_roster(app: &App, event: &Event) {
    println!("{} @ {}", event.name, app.local(event.start_time));
    for role in &event.roles {
        let taken = event.confirmed_count(&role.name);
        let cap = if role.limit == 0 {
            "∞".to_string()
        } else {
            role.limit.to_string()
        };
        println!("  {} {} ({taken}/{cap})", role.emoji, role.name);
        for s in event.signups.get(&role.name).into_iter().flatten() {
            let class = s.class.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default();
            println!("    - {}{class} ({})", s.username, s.status);
        }
    }
}
