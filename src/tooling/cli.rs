//! CLI Tooling
//!
//! Command-line interface for agent lifecycle and collection operations. The
//! same command tree is used for one-shot invocations and for each line of the
//! interactive shell, which keeps agent state between commands.

use crate::agent::commands::{AgentCommandService, LoadedAgentEntry, StopResult};
use crate::agent::repository::{DirectoryDiscovery, ModuleDiscovery};
use crate::agent::session::{AgentTask, IdleTask};
use crate::agent::AgentManager;
use crate::config::{ConfigLoader, StewardConfig};
use crate::error::ApiError;
use crate::index::client::{open_vector_client, VectorClient};
use crate::index::collection::CollectionIndex;
use crate::index::commands::{CollectionInfoResult, CollectionListItem, IndexCommandService};
use crate::index::embeddings;
use crate::logging::LoggingConfig;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Steward CLI - interactive agent lifecycle management
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(about = "Load, switch and stop agents; manage embedding-aware collections")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold logging flags over the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Agent lifecycle, tools and memory
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Vector collections
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
    /// Interactive shell; agent state persists between commands
    Shell,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AgentCommands {
    /// Load an agent module (does not activate it)
    Load {
        /// Agent name
        name: String,
    },
    /// Make a loaded agent the active one
    Switch {
        /// Agent name
        name: String,
    },
    /// Halt the active agent's execution
    Stop,
    /// Stop and remove the active agent
    Unload,
    /// List agents available to load
    List,
    /// List loaded agents and their states
    ListActive {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Rename a tool on the active agent
    RenameTool {
        /// Current tool name
        old: String,
        /// New tool name
        new: String,
    },
    /// List the active agent's tools
    ListTools {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Clear the active agent's memory
    ClearMemory,
    /// Forget one term from the active agent's memory
    Forget {
        /// Entity term
        term: String,
    },
    /// Record a fact about a term in the active agent's memory
    Remember {
        /// Entity term
        term: String,
        /// Fact to record
        fact: String,
    },
    /// Send a message to the active agent
    Send {
        /// Message text
        message: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum IndexCommands {
    /// List collections and their embedding functions
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show a collection's metadata and record count
    Info {
        /// Collection name (default: index.default_collection)
        name: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Embed and store documents
    Add {
        /// Documents to add
        #[arg(required = true)]
        texts: Vec<String>,
        /// Collection name (default: index.default_collection)
        #[arg(long)]
        collection: Option<String>,
    },
    /// Search a collection
    Search {
        /// Query text
        query: String,
        /// Collection name (default: index.default_collection)
        #[arg(long)]
        collection: Option<String>,
        /// Number of results
        #[arg(short, long, default_value = "4")]
        k: usize,
    },
    /// Delete records by id and/or metadata filter
    Delete {
        /// Collection name
        name: String,
        /// Record id (repeatable)
        #[arg(long = "id")]
        ids: Vec<String>,
        /// Metadata filter key=value (repeatable)
        #[arg(long = "where")]
        where_pairs: Vec<String>,
    },
    /// Delete a collection and all its records
    Drop {
        /// Collection name
        name: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// One line typed into the interactive shell.
#[derive(Parser, Debug)]
#[command(name = "steward", no_binary_name = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Commands,
}

/// Split a shell line into words. Single and double quotes group words.
pub fn split_line(line: &str) -> Result<Vec<String>, ApiError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(ApiError::InvalidArgument("unterminated quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// CLI context holding the agent manager and a lazily opened vector store.
pub struct CliContext {
    manager: Arc<AgentManager>,
    config: StewardConfig,
    workspace_root: PathBuf,
    index_path: PathBuf,
    vector_client: Mutex<Option<Arc<dyn VectorClient>>>,
    task: Arc<dyn AgentTask>,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(cfg_path) = &config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::from_config(workspace_root, config)
    }

    /// Build a context from already loaded configuration, discovering agents under XDG.
    pub fn from_config(workspace_root: PathBuf, config: StewardConfig) -> Result<Self, ApiError> {
        let discovery = Arc::new(DirectoryDiscovery::new()?);
        Self::with_discovery(workspace_root, config, discovery)
    }

    /// Build a context over an explicit discovery source.
    pub fn with_discovery(
        workspace_root: PathBuf,
        config: StewardConfig,
        discovery: Arc<dyn ModuleDiscovery>,
    ) -> Result<Self, ApiError> {
        let index_path = config.storage.resolve_index_path()?;
        let manager = AgentManager::new(discovery)
            .with_stop_timeout(Duration::from_millis(config.agents.stop_timeout_ms));

        for name in &config.agents.autoload {
            match manager.load(name) {
                Ok(()) | Err(ApiError::AlreadyLoaded(_)) => {}
                Err(e) => warn!(agent = %name, error = %e, "Autoload failed"),
            }
        }
        if let Some(default) = &config.agents.default {
            match manager.load(default) {
                Ok(()) | Err(ApiError::AlreadyLoaded(_)) => manager.switch(default)?,
                Err(e) => warn!(agent = %default, error = %e, "Default agent unavailable"),
            }
        }

        Ok(Self {
            manager: Arc::new(manager),
            config,
            workspace_root,
            index_path,
            vector_client: Mutex::new(None),
            task: Arc::new(IdleTask::default()),
        })
    }

    /// Use `task` for sessions started by `agent send`.
    pub fn with_task(mut self, task: Arc<dyn AgentTask>) -> Self {
        self.task = task;
        self
    }

    pub fn manager(&self) -> &Arc<AgentManager> {
        &self.manager
    }

    pub fn config(&self) -> &StewardConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Open the vector store on first use.
    fn vector_client(&self) -> Result<Arc<dyn VectorClient>, ApiError> {
        let mut slot = self.vector_client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = open_vector_client(&self.index_path)?;
        info!(path = %self.index_path.display(), "Opened vector store");
        *slot = Some(client.clone());
        Ok(client)
    }

    fn collection_name(&self, name: Option<&String>) -> String {
        name.cloned()
            .unwrap_or_else(|| self.config.index.default_collection.clone())
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Agent { command } => self.handle_agent_command(command).await,
            Commands::Index { command } => self.handle_index_command(command).await,
            Commands::Shell => Err(ApiError::InvalidArgument(
                "already in the interactive shell".to_string(),
            )),
        }
    }

    /// Parse and execute one shell line. Returns `None` when the shell should exit.
    pub async fn execute_line(&self, line: &str) -> Result<Option<String>, ApiError> {
        let words = split_line(line)?;
        match words.first().map(String::as_str) {
            None => return Ok(Some(String::new())),
            Some("exit") | Some("quit") => return Ok(None),
            _ => {}
        }
        match ShellLine::try_parse_from(&words) {
            Ok(parsed) => self.execute(&parsed.command).await.map(Some),
            // Help and usage errors are shown to the user, not treated as failures.
            Err(e) => Ok(Some(e.to_string())),
        }
    }

    /// Run the interactive shell until `exit`, `quit` or end of input.
    pub async fn run_shell(&self) -> Result<(), ApiError> {
        use dialoguer::Input;

        println!("{}", "Steward shell. Type `help` for commands, `exit` to quit.".bold());
        loop {
            let line = match Input::<String>::new()
                .with_prompt("steward")
                .allow_empty(true)
                .interact_text()
            {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Shell input closed");
                    break;
                }
            };
            match self.execute_line(&line).await {
                Ok(Some(output)) => {
                    if !output.is_empty() {
                        println!("{}", output);
                    }
                }
                Ok(None) => break,
                Err(e) => eprintln!("{} {}", "Error:".red(), e),
            }
        }
        Ok(())
    }

    /// Stop running sessions before the process exits.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    /// Handle agent lifecycle commands
    async fn handle_agent_command(&self, command: &AgentCommands) -> Result<String, ApiError> {
        let manager = self.manager.as_ref();
        match command {
            AgentCommands::Load { name } => {
                let name = AgentCommandService::load(manager, name)?;
                Ok(format!("Loading agent ... {}", name))
            }
            AgentCommands::Switch { name } => {
                let name = AgentCommandService::switch(manager, name)?;
                Ok(format!("Switching agent ... {}", name))
            }
            AgentCommands::Stop => match AgentCommandService::stop(manager)? {
                StopResult::Stopping { agent } => Ok(format!("Stopping agent ... {}", agent)),
                StopResult::NotRunning => Ok("Agent is not running.".to_string()),
            },
            AgentCommands::Unload => {
                AgentCommandService::unload(manager).await?;
                Ok("Unloaded agent.".to_string())
            }
            AgentCommands::List => {
                let names = AgentCommandService::list(manager)?;
                Ok(AgentCommandService::format_loadable(&names))
            }
            AgentCommands::ListActive { format } => {
                let entries = AgentCommandService::list_active(manager);
                match format.as_str() {
                    "json" => to_json(&entries),
                    _ => Ok(format_loaded_agents_text(&entries)),
                }
            }
            AgentCommands::RenameTool { old, new } => {
                AgentCommandService::rename_tool(manager, old, new)?;
                Ok(String::new())
            }
            AgentCommands::ListTools { format } => {
                let tools = AgentCommandService::list_tools(manager)?;
                match format.as_str() {
                    "json" => to_json(&tools),
                    _ => Ok(tools.join("\n")),
                }
            }
            AgentCommands::ClearMemory => {
                AgentCommandService::clear_memory(manager)?;
                Ok("Cleared agent's memory.".to_string())
            }
            AgentCommands::Forget { term } => {
                let result = AgentCommandService::forget(manager, term)?;
                Ok(format!("Forgot {}.", result.term))
            }
            AgentCommands::Remember { term, fact } => {
                let term = AgentCommandService::remember(manager, term, fact)?;
                Ok(format!("Remembered {}.", term))
            }
            AgentCommands::Send { message } => {
                let agent = AgentCommandService::send(manager, message, self.task.clone()).await?;
                Ok(format!("Sent message to {}.", agent))
            }
        }
    }

    /// Handle collection commands
    async fn handle_index_command(&self, command: &IndexCommands) -> Result<String, ApiError> {
        match command {
            IndexCommands::List { format } => {
                let client = self.vector_client()?;
                let items = IndexCommandService::list(&*client)?;
                match format.as_str() {
                    "json" => to_json(&items),
                    _ => Ok(format_collection_list_text(&items)),
                }
            }
            IndexCommands::Info { name, format } => {
                let client = self.vector_client()?;
                let info = IndexCommandService::info(&*client, &self.collection_name(name.as_ref()))?;
                match format.as_str() {
                    "json" => to_json(&info),
                    _ => Ok(format_collection_info_text(&info)),
                }
            }
            IndexCommands::Add { texts, collection } => {
                let index = self.open_collection(collection.as_ref(), true)?;
                let ids = index.add_texts(texts, None, None).await?;
                Ok(format!("Added {} document(s) to {}.", ids.len(), index.name()))
            }
            IndexCommands::Search {
                query,
                collection,
                k,
            } => {
                let index = self.open_collection(collection.as_ref(), false)?;
                let hits = index.similarity_search(query, *k, None).await?;
                if hits.is_empty() {
                    return Ok("No results.".to_string());
                }
                let mut table = Table::new();
                table.load_preset(UTF8_BORDERS_ONLY);
                table.set_header(vec!["Score", "Document"]);
                for hit in hits {
                    table.add_row(vec![format!("{:.3}", hit.score), hit.record.document]);
                }
                Ok(table.to_string())
            }
            IndexCommands::Delete {
                name,
                ids,
                where_pairs,
            } => {
                let client = self.vector_client()?;
                let removed =
                    IndexCommandService::delete(client, name, ids.clone(), where_pairs).await?;
                Ok(format!("Deleted {} record(s) from {}.", removed, name))
            }
            IndexCommands::Drop { name, force } => {
                if !force {
                    use dialoguer::Confirm;
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Delete collection '{}' and all its records?", name))
                        .interact()
                        .map_err(|e| {
                            ApiError::ConfigError(format!("Failed to get user input: {}", e))
                        })?;
                    if !confirmed {
                        return Ok("Drop cancelled.".to_string());
                    }
                }
                let client = self.vector_client()?;
                let name = IndexCommandService::drop_collection(client, name).await?;
                Ok(format!("Dropped collection {}.", name))
            }
        }
    }

    /// Bind the configured embeddings to a collection. Only `create` makes a new one.
    fn open_collection(
        &self,
        name: Option<&String>,
        create: bool,
    ) -> Result<CollectionIndex, ApiError> {
        let client = self.vector_client()?;
        let embeddings = embeddings::from_config(&self.config.index.embeddings)?;
        let name = self.collection_name(name);
        if create {
            CollectionIndex::open(client, &name, Some(embeddings), None)
        } else {
            CollectionIndex::open_existing(client, &name, Some(embeddings))
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(crate::error::StorageError::from(e)))
}

/// Format loaded agents as a table
fn format_loaded_agents_text(entries: &[LoadedAgentEntry]) -> String {
    if entries.is_empty() {
        return "No agents loaded.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Agent", "State", "Active"]);
    for entry in entries {
        table.add_row(vec![
            entry.name.clone(),
            entry.state.to_string(),
            if entry.active { "*".to_string() } else { String::new() },
        ]);
    }
    table.to_string()
}

fn format_collection_list_text(items: &[CollectionListItem]) -> String {
    if items.is_empty() {
        return "No collections.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Collection", "Embedding function", "Model"]);
    for item in items {
        table.add_row(vec![
            item.name.clone(),
            item.embedding_fn.clone().unwrap_or_else(|| "-".to_string()),
            item.model_name.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

fn format_collection_info_text(info: &CollectionInfoResult) -> String {
    let mut out = format!("{}\n", info.name.bold());
    if let Some(description) = &info.description {
        out.push_str(&format!("  {}\n", description));
    }
    out.push_str(&format!("  Records: {}\n", info.count));
    for (key, value) in &info.metadata {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("  {}: {}\n", key, rendered));
    }
    out.trim_end().to_string()
}
