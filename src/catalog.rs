use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::fuzzy_matcher::FzfMatcher;
use crate::storage::{Command, Parameter};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid catalog file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("duplicate command id: {0}")]
    DuplicateId(String),
}

/// Read-only registry of known commands.
pub trait CommandCatalog {
    fn get_all_commands(&self) -> Vec<Command>;

    fn get_command(&self, id: &str) -> Option<Command> {
        self.get_all_commands().into_iter().find(|c| c.id == id)
    }

    /// Ranked search over name, id, description and category.
    fn search_commands(&self, query: &str) -> Vec<Command> {
        if query.trim().is_empty() {
            return self.get_all_commands();
        }
        FzfMatcher::new()
            .match_and_sort(query, self.get_all_commands(), |c| {
                vec![
                    c.name.clone(),
                    c.id.clone(),
                    c.description.clone(),
                    c.category.clone(),
                ]
            })
            .into_iter()
            .map(|(command, _)| command)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "command")]
    commands: Vec<Command>,
}

/// Catalog loaded from `commands.toml`, or the built-in set when absent.
pub struct FileCatalog {
    commands: Vec<Command>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            debug!(path = %path.display(), "no catalog file, using built-in commands");
            return Ok(Self::builtin());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_commands(file.commands)
    }

    pub fn from_commands(commands: Vec<Command>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for command in &commands {
            if !seen.insert(command.id.as_str()) {
                return Err(CatalogError::DuplicateId(command.id.clone()));
            }
        }
        Ok(Self { commands })
    }

    pub fn builtin() -> Self {
        fn cmd(id: &str, name: &str, icon: &str, category: &str, description: &str) -> Command {
            Command {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                icon: icon.to_string(),
                category: category.to_string(),
                parameters: Vec::new(),
                dangerous: false,
                requires_confirmation: false,
            }
        }

        let mut logs = cmd("logs", "Tail Logs", "📜", "monitoring", "Post the latest bot log lines");
        logs.parameters.push(Parameter {
            name: "lines".to_string(),
            description: "Number of lines".to_string(),
            required: false,
        });
        let mut deploy = cmd("deploy", "Deploy", "🚀", "deployment", "Pull and deploy the latest build");
        deploy.requires_confirmation = true;
        let mut restart = cmd("restart", "Restart Server", "🔄", "server", "Restart the bot host process");
        restart.dangerous = true;
        let mut shutdown = cmd("shutdown", "Shutdown", "⛔", "server", "Stop the bot until manually started");
        shutdown.dangerous = true;

        Self {
            commands: vec![
                cmd("status", "Status", "📊", "monitoring", "Report uptime and health"),
                cmd("ping", "Ping", "🏓", "monitoring", "Check that the bot is responding"),
                logs,
                deploy,
                restart,
                shutdown,
            ],
        }
    }
}

impl CommandCatalog for FileCatalog {
    fn get_all_commands(&self) -> Vec<Command> {
        self.commands.clone()
    }
}
