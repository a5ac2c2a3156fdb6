mod catalog;
mod config;
mod dispatcher;
mod fuzzy_matcher;
mod gate;
mod i18n;
mod secret_store;
mod storage;
mod store_manager;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use catalog::{CommandCatalog, FileCatalog};
use config::Config;
use dispatcher::{DispatchError, Dispatcher, HttpTransport, TransportConfig, ENDPOINT_KEY};
use gate::{AssumeYes, Confirmation, Confirmer, Selection};
use i18n::I18n;
use secret_store::{FileSecretStore, SecretStore};
use storage::{Command, HistoryEntry};
use store_manager::HistoryStore;

/// Overrides the stored webhook URL when set.
const ENDPOINT_ENV: &str = "BOTCTL_WEBHOOK_URL";

#[derive(Parser)]
#[command(name = "botctl", version)]
#[command(about = "Dispatch remote-control commands to your bot and review their history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every command in the catalog
    List,
    /// Search the catalog by name, id, description or category
    Search {
        query: String,
    },
    /// Dispatch a command, asking first if it is dangerous
    Run {
        /// Command id, e.g. `restart`
        id: String,
        /// Answer yes to the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show past dispatches, newest first
    History {
        /// Maximum number of records to display
        #[arg(long)]
        limit: Option<usize>,
        /// Delete all history records
        #[arg(long)]
        clear: bool,
    },
    /// Manage the webhook URL commands are sent to
    Endpoint {
        #[command(subcommand)]
        action: EndpointAction,
    },
}

#[derive(Subcommand)]
enum EndpointAction {
    /// Store the webhook URL
    Set { url: String },
    /// Remove the stored webhook URL
    Clear,
    /// Show which host commands are sent to
    Show,
}

/// Reads a yes/no answer from stdin; EOF or anything but yes cancels.
struct StdinConfirmer<'a> {
    i18n: &'a I18n,
}

impl Confirmer for StdinConfirmer<'_> {
    fn confirm(&self, command: &Command) -> Confirmation {
        println!("{}", self.i18n.t("confirm_title").red().bold());
        if prompt_yes(&self.i18n.t_format("confirm_prompt", &[&command.name])) {
            Confirmation::Confirm
        } else {
            Confirmation::Cancel
        }
    }
}

fn prompt_yes(prompt: &str) -> bool {
    print!("{}", prompt.yellow());
    io::stdout().flush().ok();
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(input.trim().to_lowercase().as_str(), "y" | "yes"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BOTCTL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let home = Config::home_dir();
    let config = Config::load(&home)?;
    let i18n = I18n::new(&config.get_effective_language());
    let secrets = FileSecretStore::open(Config::secure_dir(&home))
        .with_context(|| format!("opening secure store in {}", home.display()))?;

    match cli.command {
        Commands::List => {
            let catalog = FileCatalog::load(&Config::catalog_path(&home))?;
            print_commands(&catalog.get_all_commands(), &i18n);
        }
        Commands::Search { query } => {
            let catalog = FileCatalog::load(&Config::catalog_path(&home))?;
            print_commands(&catalog.search_commands(&query), &i18n);
        }
        Commands::Run { id, yes } => {
            let catalog = FileCatalog::load(&Config::catalog_path(&home))?;
            let Some(command) = catalog.get_command(&id) else {
                println!("{}", i18n.t_format("unknown_command", &[&id]).red());
                return Ok(ExitCode::FAILURE);
            };
            return run_command(&command, yes, &config, &secrets, &i18n);
        }
        Commands::History { limit, clear } => {
            let history = HistoryStore::new(&secrets);
            if clear {
                let count = history.read().len();
                if count > 0
                    && !prompt_yes(&i18n.t_format("clear_history_prompt", &[&count.to_string()]))
                {
                    println!("{}", i18n.t("clear_aborted").yellow());
                    return Ok(ExitCode::SUCCESS);
                }
                history.clear().context("clearing history")?;
                println!("{}", i18n.t("history_cleared").green());
            } else {
                let limit = limit.unwrap_or(config.display.max_history_shown);
                print_history(&history.read(), limit, &i18n);
            }
        }
        Commands::Endpoint { action } => match action {
            EndpointAction::Set { url } => {
                let url = url.trim();
                let host = match reqwest::Url::parse(url) {
                    Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => {
                        parsed.host_str().unwrap_or_default().to_string()
                    }
                    _ => {
                        println!("{}", i18n.t_format("invalid_endpoint", &[url]).red());
                        return Ok(ExitCode::FAILURE);
                    }
                };
                secrets.set(ENDPOINT_KEY, url).context("saving webhook URL")?;
                println!("{}", i18n.t_format("endpoint_saved", &[&host]).green());
            }
            EndpointAction::Clear => {
                secrets.delete(ENDPOINT_KEY).context("removing webhook URL")?;
                println!("{}", i18n.t("endpoint_cleared"));
            }
            EndpointAction::Show => {
                let from_env = env_endpoint().is_some();
                let transport_config = resolve_transport_config(&secrets)?;
                match transport_config.endpoint_host() {
                    Some(host) if from_env => println!("{}", i18n.t_format("endpoint_env", &[&host])),
                    Some(host) => println!("{}", i18n.t_format("endpoint_show", &[&host])),
                    None => println!("{}", i18n.t("endpoint_none").yellow()),
                }
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn env_endpoint() -> Option<String> {
    std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_transport_config(secrets: &dyn SecretStore) -> Result<TransportConfig> {
    let endpoint = match env_endpoint() {
        Some(endpoint) => Some(endpoint),
        None => secrets.get(ENDPOINT_KEY).context("reading webhook URL")?,
    };
    Ok(TransportConfig::new(endpoint))
}

fn run_command(
    command: &Command,
    assume_yes: bool,
    config: &Config,
    secrets: &dyn SecretStore,
    i18n: &I18n,
) -> Result<ExitCode> {
    let transport_config = resolve_transport_config(secrets)?;
    let transport = HttpTransport::new(config.timeout())?;
    let dispatcher = Dispatcher::new(&transport, HistoryStore::new(secrets), config.dispatch_settings());

    let stdin_confirmer = StdinConfirmer { i18n };
    let confirmer: &dyn Confirmer = if assume_yes { &AssumeYes } else { &stdin_confirmer };

    match gate::select_command(command, confirmer, &dispatcher, &transport_config) {
        Ok(Selection::Cancelled) => {
            println!("{}", i18n.t("command_cancelled").yellow());
            Ok(ExitCode::SUCCESS)
        }
        Ok(Selection::Dispatched(entry)) => Ok(if report_entry(command, &entry, i18n) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }),
        Err(DispatchError::MissingEndpoint) => {
            println!("{}", i18n.t("missing_settings").red().bold());
            println!("{}", i18n.t("missing_endpoint"));
            Ok(ExitCode::FAILURE)
        }
        Err(DispatchError::Busy) => {
            println!("{}", i18n.t("dispatch_busy").yellow());
            Ok(ExitCode::FAILURE)
        }
        Err(DispatchError::HistoryWrite { entry, source }) => {
            report_entry(command, &entry, i18n);
            println!("{}: {}", i18n.t("history_write_failed").red(), source);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints the outcome; returns whether the dispatch succeeded.
fn report_entry(command: &Command, entry: &HistoryEntry, i18n: &I18n) -> bool {
    if entry.is_success() {
        println!("{}", i18n.t("command_sent").green().bold());
        println!("{}", i18n.t_format("command_sent_detail", &[&command.name]));
        println!("{}: {}ms", i18n.t("execution_time").yellow(), entry.duration.to_string().green());
        true
    } else {
        println!("{}", i18n.t("command_failed").red().bold());
        let detail = entry.error.clone().unwrap_or_default();
        let detail = match detail.strip_prefix("HTTP ") {
            Some(status) if status.parse::<u16>().is_ok() => i18n.t_format("command_failed_http", &[status]),
            _ => detail,
        };
        println!("{}", detail.red());
        false
    }
}

fn print_commands(commands: &[Command], i18n: &I18n) {
    if commands.is_empty() {
        println!("{}", i18n.t("no_commands_found").yellow());
        return;
    }

    for command in commands {
        let badge = if command.dangerous {
            format!(" {}", i18n.t("dangerous_badge").on_red().black().bold())
        } else {
            String::new()
        };
        println!(
            "{} {} {}{}",
            command.icon,
            command.name.green().bold(),
            format!("({})", command.id).dimmed(),
            badge
        );
        if !command.description.is_empty() {
            println!("    {}", command.description);
        }
        let count = command.parameters.len().to_string();
        println!("    {}", i18n.t_format("parameter_count", &[&count, &command.category]).cyan());
    }
}

fn print_history(entries: &[HistoryEntry], limit: usize, i18n: &I18n) {
    if entries.is_empty() {
        println!("{}", i18n.t("no_history").yellow());
        return;
    }

    println!("{}", i18n.t("history_header").bold());
    for entry in entries.iter().take(limit) {
        let when = Local
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| entry.timestamp.to_string());
        let (mark, note) = if entry.is_success() {
            ("✓".green(), entry.output.clone().unwrap_or_default().normal())
        } else {
            ("✗".red(), entry.error.clone().unwrap_or_default().red())
        };
        println!(
            "{} {} {} {} {}ms {}",
            mark,
            when.dimmed(),
            entry.command_name.bold(),
            format!("({})", entry.command_id).dimmed(),
            entry.duration,
            note
        );
    }
}
