//! CLI command definitions.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the callback server
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Ask the authority whether a job is tracked
    Track {
        /// Job URL
        url: String,

        /// Job name
        name: String,

        /// Job kind (freestyle, maven, pipeline, multibranch)
        #[arg(short, long, default_value = "pipeline")]
        kind: String,

        /// Branch of a multi-branch job
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Ask the authority whether a job or stage is under change control
    Check {
        /// Job URL
        url: String,

        /// Job name
        name: String,

        /// Stage to scope the query to
        #[arg(short, long)]
        stage: Option<String>,

        /// Branch of a multi-branch job
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Print the default configuration file path
    Path,
}
