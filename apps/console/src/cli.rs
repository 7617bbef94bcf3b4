use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shared::domain::Language;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "dsp-console", about = "Administration console for a DSP server")]
pub struct Cli {
    #[arg(long, global = true)]
    pub server: Option<String>,
    #[arg(long, global = true)]
    pub email: Option<String>,
    #[arg(long, global = true)]
    pub password: Option<String>,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Flags given on the command line win over every other source.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(server) = &self.server {
            settings.server_url = server.clone();
        }
        if self.email.is_some() {
            settings.email = self.email.clone();
        }
        if self.password.is_some() {
            settings.password = self.password.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Projects(ProjectCommand),
    #[command(subcommand)]
    Groups(GroupCommand),
    #[command(subcommand)]
    Users(UserCommand),
    #[command(subcommand)]
    Ontologies(OntologyCommand),
    #[command(subcommand)]
    Lists(ListCommand),
    #[command(subcommand)]
    Context(ContextCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    List,
    /// Looks a project up by IRI, shortcode or shortname.
    Show { key: String },
    Create {
        shortcode: String,
        shortname: String,
        longname: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "en")]
        lang: Language,
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        selfjoin: bool,
    },
    Set(ProjectChanges),
}

#[derive(Args, Debug)]
pub struct ProjectChanges {
    pub key: String,
    #[arg(long)]
    pub longname: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value = "en")]
    pub lang: Language,
    #[arg(long = "add-keyword")]
    pub add_keywords: Vec<String>,
    #[arg(long = "remove-keyword")]
    pub remove_keywords: Vec<String>,
    #[arg(long)]
    pub selfjoin: Option<bool>,
    #[arg(long)]
    pub status: Option<bool>,
    /// Also grant project members the right to create resources.
    #[arg(long)]
    pub default_permissions: bool,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    List {
        /// project shortcode
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    List {
        /// project shortcode
        #[arg(long)]
        project: Option<String>,
    },
    /// Looks a user up by IRI, email or username.
    Show { key: String },
}

#[derive(Subcommand, Debug)]
pub enum OntologyCommand {
    List {
        /// project IRI
        #[arg(long)]
        project: Option<String>,
    },
    Show { shortcode: String, name: String },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    List {
        /// project IRI
        #[arg(long)]
        project: Option<String>,
    },
    /// Prints the list with the given root node IRI.
    Show { iri: String },
}

#[derive(Subcommand, Debug)]
pub enum ContextCommand {
    Expand {
        value: String,
        /// extra `prefix=iri` entries
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
    },
    Compact {
        iri: String,
        #[arg(long = "prefix")]
        prefixes: Vec<String>,
    },
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
