use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fasternet", version, about = "Fasternet incident board", long_about = None)]
pub struct Cli {
    /// Config file (JSON). Defaults to ./fasternet.json when present.
    #[arg(long, global = true, env = "FASTERNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging and error details on stderr
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Print records as JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// One line typed into `fasternet shell`.
#[derive(Parser, Debug)]
#[command(name = "fasternet", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a session (valid for 7 days)
    Login {
        #[arg(long)]
        user: String,
        #[arg(long, env = "FASTERNET_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session; the theme is kept
    Logout,
    /// Show who is logged in
    Whoami,
    /// Show or change the theme: dark, light or toggle
    Theme { mode: Option<String> },
    /// Show the board, newest card first
    List(NowArg),
    /// Open a new incident card
    Create(CreateArgs),
    /// Edit an open card; escalations are recomputed from its creation time
    Edit(EditArgs),
    /// Append an update to a card
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        text: String,
    },
    /// Show the update history of a card
    History {
        #[arg(long)]
        id: i64,
    },
    /// Delete a card and its history
    Delete {
        #[arg(long)]
        id: i64,
        /// Confirmation word (default: excluir)
        #[arg(long)]
        confirm: String,
    },
    /// Compute escalation checkpoints without touching the board
    Escalations {
        #[arg(long = "type")]
        incident_type: String,
        #[arg(long)]
        created_at: String,
        #[arg(long)]
        now: Option<String>,
    },
    /// Markdown report of the board
    Report {
        #[command(flatten)]
        now: NowArg,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Audit stored cards for drift from the escalation and color rules
    Audit,
    /// Export cards and updates as CSV with a checksum manifest
    Export {
        #[arg(long)]
        dest: PathBuf,
    },
    /// Manage local accounts
    #[command(subcommand)]
    User(UserCommand),
    /// Demo data for the local board
    #[command(subcommand)]
    Demo(DemoCommand),
    /// Interactive session that keeps the board in memory
    Shell,
    /// Version and build information
    About,
}

#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct NowArg {
    /// Evaluate escalations at this instant instead of the current time
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CreateArgs {
    #[arg(long)]
    pub location: String,
    #[arg(long = "type")]
    pub incident_type: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "")]
    pub ticket: String,
    #[arg(long, default_value = "")]
    pub affected: String,
    #[arg(long, default_value = "")]
    pub group: String,
    /// RFC3339, or YYYY-MM-DDTHH:MM at the configured offset. Defaults to now.
    #[arg(long)]
    pub created_at: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    #[arg(long)]
    pub id: i64,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long = "type")]
    pub incident_type: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub ticket: Option<String>,
    #[arg(long)]
    pub affected: Option<String>,
    #[arg(long)]
    pub group: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Create a local account
    Add {
        #[arg(long)]
        user: String,
        #[arg(long, env = "FASTERNET_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DemoCommand {
    /// Seed an empty local board with demo cards and a demo/demo account
    Seed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
        ShellLine::command().debug_assert();
    }

    #[test]
    fn parses_create_with_type_flag() {
        let cli = Cli::try_parse_from([
            "fasternet",
            "create",
            "--location",
            "centro",
            "--type",
            "gpon",
            "--ticket",
            "INC-1",
        ])
        .unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.incident_type, "gpon");
                assert_eq!(args.ticket, "INC-1");
                assert_eq!(args.created_at, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shell_lines_have_no_binary_name() {
        let line = ShellLine::try_parse_from(["delete", "--id", "3", "--confirm", "excluir"]).unwrap();
        assert_eq!(
            line.command,
            Command::Delete {
                id: 3,
                confirm: "excluir".to_string()
            }
        );
    }
}
