//! # rafael-agent
//!
//! The `rafael` binary. Loads settings, installs logging and runs one of:
//! - `capture`: print the semantic tree of an HTML file
//! - `run`: drive a goal against an HTML file with a scripted or HTTP backend
//! - `watch`: follow a run's event stream, optionally acting on a local page

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rafael_settings::RafaelSettings;

/// Page URL assumed for local HTML files.
const DEFAULT_PAGE_URL: &str = "http://localhost/";

/// Rafael browser agent.
#[derive(Parser, Debug)]
#[command(name = "rafael", about = "Rafael browser agent", version)]
struct Cli {
    /// Settings file (defaults to `~/.rafael/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the semantic tree of an HTML file as JSON.
    Capture {
        /// HTML file to read.
        html: PathBuf,
        /// URL the page is treated as loaded from.
        #[arg(long, default_value = DEFAULT_PAGE_URL)]
        url: String,
        /// Pretty-print the JSON.
        #[arg(long)]
        pretty: bool,
    },
    /// Run a goal to completion against an HTML file.
    Run {
        /// HTML file to act on.
        html: PathBuf,
        /// What to accomplish.
        #[arg(long)]
        goal: String,
        /// URL the page is treated as loaded from.
        #[arg(long, default_value = DEFAULT_PAGE_URL)]
        url: String,
        /// JSON array of scripted backend responses.
        #[arg(long, conflicts_with = "backend_url")]
        script: Option<PathBuf>,
        /// Reasoning endpoint to POST prompts to.
        #[arg(long, required_unless_present = "script")]
        backend_url: Option<String>,
        /// Bearer token for `--backend-url`.
        #[arg(long)]
        api_key: Option<String>,
        /// Step budget (overrides settings).
        #[arg(long)]
        max_steps: Option<u32>,
        /// Approve every `ask_user` question without asking.
        #[arg(long)]
        auto_approve: bool,
        /// Session id reported to the backend.
        #[arg(long, default_value = "cli")]
        session: String,
        /// User id reported to the backend.
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Follow a run's event stream.
    Watch {
        /// Run to follow.
        run_id: String,
        /// Public stream token issued with the run.
        #[arg(long)]
        token: String,
        /// Server origin (overrides settings).
        #[arg(long)]
        base_url: Option<String>,
        /// Execute streamed actions against this HTML file.
        #[arg(long)]
        html: Option<PathBuf>,
        /// URL the page is treated as loaded from.
        #[arg(long, default_value = DEFAULT_PAGE_URL)]
        url: String,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<RafaelSettings> {
    match path {
        Some(path) => rafael_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(rafael_settings::get_settings().clone()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = load_settings(cli.settings.as_ref())?;
    rafael_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let success = match cli.command {
        Command::Capture { html, url, pretty } => {
            commands::capture(&settings, &html, &url, pretty)?;
            true
        }
        Command::Run {
            html,
            goal,
            url,
            script,
            backend_url,
            api_key,
            max_steps,
            auto_approve,
            session,
            user,
        } => {
            let backend = match (script, backend_url) {
                (Some(path), _) => commands::BackendChoice::Script(path),
                (None, Some(endpoint)) => commands::BackendChoice::Http { endpoint, api_key },
                (None, None) => anyhow::bail!("either --script or --backend-url is required"),
            };
            commands::run(
                &settings,
                commands::RunArgs {
                    html,
                    url,
                    goal,
                    backend,
                    max_steps,
                    auto_approve,
                    session,
                    user,
                },
            )
            .await?
        }
        Command::Watch {
            run_id,
            token,
            base_url,
            html,
            url,
        } => commands::watch(&settings, run_id, token, base_url, html.as_deref(), &url).await?,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults() {
        let cli = Cli::parse_from(["rafael", "capture", "page.html"]);
        match cli.command {
            Command::Capture { html, url, pretty } => {
                assert_eq!(html, PathBuf::from("page.html"));
                assert_eq!(url, DEFAULT_PAGE_URL);
                assert!(!pretty);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_with_script() {
        let cli = Cli::parse_from([
            "rafael", "run", "login.html", "--goal", "log in", "--script", "steps.json",
            "--max-steps", "5",
        ]);
        match cli.command {
            Command::Run {
                goal,
                script,
                backend_url,
                max_steps,
                auto_approve,
                ..
            } => {
                assert_eq!(goal, "log in");
                assert_eq!(script, Some(PathBuf::from("steps.json")));
                assert!(backend_url.is_none());
                assert_eq!(max_steps, Some(5));
                assert!(!auto_approve);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_needs_a_backend() {
        assert!(Cli::try_parse_from(["rafael", "run", "p.html", "--goal", "g"]).is_err());
    }

    #[test]
    fn script_and_backend_url_conflict() {
        let parsed = Cli::try_parse_from([
            "rafael",
            "run",
            "p.html",
            "--goal",
            "g",
            "--script",
            "s.json",
            "--backend-url",
            "http://127.0.0.1:9000/act",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn watch_takes_run_and_token() {
        let cli = Cli::parse_from(["rafael", "watch", "run_123", "--token", "pub_abc"]);
        match cli.command {
            Command::Watch {
                run_id,
                token,
                base_url,
                html,
                ..
            } => {
                assert_eq!(run_id, "run_123");
                assert_eq!(token, "pub_abc");
                assert!(base_url.is_none());
                assert!(html.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn settings_flag_is_global() {
        let cli = Cli::parse_from(["rafael", "capture", "p.html", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn explicit_settings_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"agent": {"maxSteps": 7}}"#).unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.agent.max_steps, 7);
    }
}
