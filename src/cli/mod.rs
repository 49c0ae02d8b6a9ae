pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "happy-admin")]
#[command(about = "Happy CRM admin CLI - user and role maintenance through the Supabase admin API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show an auth user's id, role and sign-in status")]
    CheckUser {
        #[arg(help = "Email address")]
        email: String,
    },

    #[command(about = "Set a user's application role")]
    SetRole {
        #[arg(help = "Email address")]
        email: String,
        #[arg(help = "superuser, super_admin, admin, agency_admin, agency or user")]
        role: String,
    },

    #[command(about = "Reset a user's password")]
    ResetPassword {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "New password (generated if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Create or repair a superuser account (idempotent)")]
    EnsureSuperuser {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Password (generated for new accounts if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Full name stored on the profile")]
        full_name: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = AppConfig::from_env();

    match cli.command {
        Commands::CheckUser { email } => commands::users::check_user(&config, &email, output_format).await,
        Commands::SetRole { email, role } => commands::users::set_role(&config, &email, &role, output_format).await,
        Commands::ResetPassword { email, password } => {
            commands::users::reset_password(&config, &email, password, output_format).await
        }
        Commands::EnsureSuperuser {
            email,
            password,
            full_name,
        } => commands::users::ensure_superuser(&config, &email, password, full_name, output_format).await,
    }
}
