use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Configuration, ConfigurationBuilder};

#[derive(Parser, Debug)]
#[command(name = "dancegrade", author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on, overrides the configuration
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// SQLite database file, overrides the configuration
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Address of the pose and audio sidecar, overrides the configuration
    #[arg(long, global = true)]
    pub sidecar: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What the binary was asked to do.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Accept live clients
    Serve,
    /// Extract and store the steps of one reference video
    Extract {
        video: PathBuf,

        /// Mark the reference as selected for play
        #[arg(long)]
        selected: bool,
    },
    /// Print the stored references
    List,
}

impl Cli {
    /// The requested command; serving is the default.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Layers the command-line overrides over a loaded configuration.
    pub fn apply(&self, configuration: Configuration) -> Configuration {
        let mut builder = ConfigurationBuilder::new(configuration);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(database) = &self.database {
            builder = builder.database_path(database.clone());
        }
        if let Some(sidecar) = &self.sidecar {
            builder = builder.sidecar_addr(sidecar.clone());
        }
        builder.build()
    }
}
