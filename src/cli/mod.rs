//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod history;
pub mod provider_edit;
pub mod provider_list;
pub mod render;
pub mod settings;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::chat::run_chat;
use crate::cli::history::run_history;
use crate::cli::provider_edit::{add_provider, remove_provider};
use crate::cli::provider_list::list_providers;
use crate::cli::render::run_render;
use crate::cli::settings::{set_setting, unset_setting};
use crate::api::LlmProvider;
use crate::core::config::Config;
use crate::render::CodeBlockStyle;

/// Environment variable holding the tracing filter directives.
pub const LOG_ENV: &str = "CHATPANE_LOG";

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "chatpane", version = VERSION)]
#[command(about = "Stream LLM chat replies as sanitized, highlighted HTML")]
#[command(
    long_about = "Chatpane renders markdown replies from LLM providers into HTML while they \
stream in, keeping a blinking cursor after the last character and highlighting fenced code \
blocks as soon as they close.\n\n\
Providers:\n\
  Built-in providers are listed by 'chatpane providers'. Replies go through the backend \
server (default http://localhost:8000/chat/) unless a provider sets api_base, in which case \
an OpenAI-compatible endpoint is called directly with the key named by api_key_name.\n\n\
Logging:\n\
  CHATPANE_LOG      tracing filter, e.g. 'chatpane=debug' (default: warn)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream a markdown file (or stdin) through the renderer and print the HTML
    Render {
        /// Markdown file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Characters per streamed chunk
        #[arg(long, default_value_t = 16)]
        chunk_size: usize,
        /// Do not show the streaming cursor
        #[arg(long)]
        no_cursor: bool,
        /// How code blocks are painted (inline or component)
        #[arg(long, value_parser = parse_code_style)]
        code_style: Option<CodeBlockStyle>,
    },
    /// Send a prompt and render the streamed reply
    Chat {
        /// Model to use (see 'chatpane providers')
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,
        /// Append the exchange to this chat-history file
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,
        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List built-in and configured providers
    Providers,
    /// Add or remove custom providers in the config file
    Provider {
        #[command(subcommand)]
        command: ProviderCommands,
    },
    /// Export, import or clear a chat-history file
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Set configuration values (prints the configuration without a key)
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommands {
    /// Add a custom provider, replacing one with the same model
    Add(ProviderArgs),
    /// Remove a custom provider
    Remove {
        /// Model of the provider to remove
        model: String,
    },
}

#[derive(ClapArgs)]
pub struct ProviderArgs {
    /// Model name sent with each request
    pub model: String,
    /// Provider name shown in listings
    #[arg(long, default_value = "custom")]
    pub provider: String,
    #[arg(long)]
    pub title: Option<String>,
    /// OpenAI-compatible base URL; omit to go through the backend server
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,
    /// Environment variable holding the API key
    #[arg(long, value_name = "NAME")]
    pub api_key_name: Option<String>,
    #[arg(long)]
    pub system_message: Option<String>,
    /// Run through the local engine instead of a network transport
    #[arg(long)]
    pub local: bool,
}

impl From<ProviderArgs> for LlmProvider {
    fn from(args: ProviderArgs) -> Self {
        let title = args
            .title
            .unwrap_or_else(|| format!("{} - {}", args.provider, args.model));
        LlmProvider {
            model: args.model,
            provider: args.provider,
            title,
            icon: String::new(),
            subtitle: String::new(),
            system_message: args.system_message.unwrap_or_default(),
            api_key_name: args.api_key_name.unwrap_or_default(),
            api_base: args.api_base,
            local: args.local.then_some(true),
        }
    }
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// Print the history as JSON, or write it to --output
    Export {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace the history with a validated JSON export
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Exported history to read
        #[arg(long, value_name = "PATH")]
        from: PathBuf,
    },
    /// Remove every item from the history
    Clear {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

fn parse_code_style(value: &str) -> Result<CodeBlockStyle, String> {
    CodeBlockStyle::parse(value)
        .ok_or_else(|| format!("unknown code style '{value}' (expected inline or component)"))
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main(Args::parse()))
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    Ok(match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    })
}

fn save_config(config: &Config, path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match path {
        Some(path) => config.save_to_path(path)?,
        None => config.save()?,
    }
    Ok(())
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config_path = args.config.as_deref();

    match args.command {
        Commands::Render {
            file,
            chunk_size,
            no_cursor,
            code_style,
        } => {
            let config = load_config(config_path)?;
            let mut options = config.renderer_options();
            if no_cursor {
                options = options.without_cursor();
            }
            if let Some(code_style) = code_style {
                options = options.with_code_style(code_style);
            }
            let html = run_render(file.as_deref(), chunk_size, options).await?;
            println!("{html}");
            Ok(())
        }
        Commands::Chat {
            model,
            history,
            prompt,
        } => {
            let config = load_config(config_path)?;
            let html = run_chat(&config, model.as_deref(), history.as_deref(), prompt).await?;
            println!("{html}");
            Ok(())
        }
        Commands::Providers => {
            let config = load_config(config_path)?;
            list_providers(&config);
            Ok(())
        }
        Commands::Provider { command } => {
            let mut config = load_config(config_path)?;
            let message = match command {
                ProviderCommands::Add(provider) => add_provider(&mut config, provider.into())?,
                ProviderCommands::Remove { model } => remove_provider(&mut config, &model)?,
            };
            save_config(&config, config_path)?;
            println!("{message}");
            Ok(())
        }
        Commands::History { command } => run_history(command),
        Commands::Set { key, value } => {
            let mut config = load_config(config_path)?;
            match key {
                Some(key) => {
                    let message = set_setting(&mut config, &key, &value)?;
                    save_config(&config, config_path)?;
                    println!("{message}");
                }
                None => config.print_all(),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = load_config(config_path)?;
            let message = unset_setting(&mut config, &key)?;
            save_config(&config, config_path)?;
            println!("{message}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
