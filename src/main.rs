// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wellness command-line client
//!
//! Signs in against Supabase Auth and records moods and activities, keeping
//! the session and any unsent records on local disk between runs.

use clap::{Parser, Subcommand};
use wellness_client::{
    config::Config,
    error::AppError,
    models::{ActivityKind, Intensity, NewActivity, NewMoodEntry, ProfileUpdate, Recorded},
    services::SignUpOutcome,
    time_utils::{format_local_short, format_utc_rfc3339},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// `wellness` command arguments.
#[derive(Debug, Parser)]
#[command(name = "wellness", about = "Track mood and activity from the terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "WELLNESS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "WELLNESS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long = "display-name")]
        display_name: Option<String>,
    },
    /// Sign out and forget the local session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Send a password recovery email.
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Show or edit the profile.
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Record or review moods.
    #[command(subcommand)]
    Mood(MoodCommand),
    /// Record or review activities.
    #[command(subcommand)]
    Activity(ActivityCommand),
    /// Send records that were queued while offline.
    Sync,
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    Show,
    Update {
        #[arg(long = "display-name")]
        display_name: Option<String>,
        #[arg(long = "avatar-url")]
        avatar_url: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum MoodCommand {
    Add {
        /// 1 (worst) to 10 (best)
        mood: u8,
        #[arg(long)]
        energy: Option<u8>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        note: Option<String>,
    },
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Summary {
        #[arg(long, default_value_t = 30)]
        limit: u32,
    },
}

#[derive(Debug, Subcommand)]
enum ActivityCommand {
    Add {
        kind: ActivityKind,
        /// Duration in minutes
        minutes: u16,
        #[arg(long, default_value = "moderate")]
        intensity: Intensity,
        #[arg(long)]
        note: Option<String>,
    },
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Minutes per activity kind.
    Summary {
        #[arg(long, default_value_t = 30)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!(url = %config.supabase_url, "Starting wellness client");

    if let Err(e) = start(config, cli.command).await {
        tracing::debug!(error = %e, "Command failed");
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn start(config: Config, command: Command) -> Result<(), AppError> {
    let state = AppState::init(config).await?;
    if restores_session(&command) {
        state.sessions.restore().await?;
    }
    run(&state, command).await
}

/// Whether the stored session is restored before `command` runs.
fn restores_session(command: &Command) -> bool {
    !matches!(
        command,
        Command::Login { .. } | Command::Register { .. } | Command::ResetPassword { .. }
    )
}

async fn run(state: &AppState, command: Command) -> Result<(), AppError> {
    match command {
        Command::Login { email, password } => {
            let session = state.sessions.login(&email, &password).await?;
            println!(
                "Signed in as {}",
                session.user.email.as_deref().unwrap_or(&session.user.id)
            );
        }
        Command::Register {
            email,
            password,
            display_name,
        } => match state
            .sessions
            .register(&email, &password, display_name.as_deref())
            .await?
        {
            SignUpOutcome::SignedIn(_) => {
                state.wellness.ensure_profile().await?;
                println!("Account created and signed in");
            }
            SignUpOutcome::ConfirmationRequired(_) => {
                println!("Check your inbox to confirm {}", email);
            }
        },
        Command::Logout => {
            state.sessions.logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match state.sessions.current_session().await {
            Some(session) => {
                println!("id:         {}", session.user.id);
                println!("email:      {}", session.user.email.as_deref().unwrap_or("-"));
                println!("expires at: {}", format_utc_rfc3339(session.expires_at));
            }
            None => println!("Not signed in"),
        },
        Command::ResetPassword { email } => {
            state.sessions.reset_password(&email).await?;
            println!("If {} has an account, a recovery email is on its way", email);
        }
        Command::Profile(ProfileCommand::Show) => {
            let profile = state.wellness.get_profile().await?;
            println!("{}", to_pretty(&profile)?);
        }
        Command::Profile(ProfileCommand::Update {
            display_name,
            avatar_url,
        }) => {
            let update = ProfileUpdate {
                display_name,
                avatar_url,
                metadata: None,
            };
            let profile = state.wellness.update_profile(&update).await?;
            println!("{}", to_pretty(&profile)?);
        }
        Command::Mood(MoodCommand::Add {
            mood,
            energy,
            tags,
            note,
        }) => {
            let entry = NewMoodEntry {
                energy,
                tags,
                note,
                ..NewMoodEntry::new(mood)
            };
            report(state.wellness.add_mood(entry).await?, "Mood");
        }
        Command::Mood(MoodCommand::List { limit }) => {
            for entry in state.wellness.list_moods(limit).await? {
                println!(
                    "{}  mood {:>2}  {}",
                    format_local_short(entry.recorded_at),
                    entry.mood,
                    entry.note.as_deref().unwrap_or("")
                );
            }
        }
        Command::Mood(MoodCommand::Summary { limit }) => {
            let summary = state.wellness.mood_summary(limit).await?;
            println!("{}", to_pretty(&summary)?);
        }
        Command::Activity(ActivityCommand::Add {
            kind,
            minutes,
            intensity,
            note,
        }) => {
            let activity = NewActivity {
                kind,
                duration_minutes: minutes,
                intensity,
                note,
                recorded_at: chrono::Utc::now(),
            };
            report(state.wellness.log_activity(activity).await?, "Activity");
        }
        Command::Activity(ActivityCommand::List { limit }) => {
            for log in state.wellness.list_activities(limit).await? {
                println!(
                    "{}  {:?} {} min ({:?})",
                    format_local_short(log.recorded_at),
                    log.kind,
                    log.duration_minutes,
                    log.intensity
                );
            }
        }
        Command::Activity(ActivityCommand::Summary { limit }) => {
            let minutes = state.wellness.activity_minutes(limit).await?;
            println!("{}", to_pretty(&minutes)?);
        }
        Command::Sync => {
            let report = state.wellness.sync_pending().await?;
            println!(
                "Sent {}, dropped {}, still queued {}",
                report.sent, report.rejected, report.remaining
            );
        }
    }
    Ok(())
}

fn report<T>(recorded: Recorded<T>, what: &str) {
    match recorded {
        Recorded::Saved(_) => println!("{} saved", what),
        Recorded::Queued => println!("{} saved on this device; run `wellness sync` when online", what),
    }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to render output: {}", e)))
}

/// Initialize structured JSON logging on stderr.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wellness_client=warn,warn"));

    tracing_subscriber::registry().with(filter).with(format).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).expect("arguments should parse").command
    }

    #[test]
    fn test_restores_session_only_when_needed() {
        let login = parse(&["wellness", "login", "--email", "a@b.c", "--password", "pw"]);
        assert!(!restores_session(&login));
        let reset = parse(&["wellness", "reset-password", "--email", "a@b.c"]);
        assert!(!restores_session(&reset));

        for args in [
            &["wellness", "sync"][..],
            &["wellness", "logout"][..],
            &["wellness", "whoami"][..],
            &["wellness", "activity", "summary", "--limit", "5"][..],
        ] {
            assert!(restores_session(&parse(args)), "{:?}", args);
        }
    }
}
