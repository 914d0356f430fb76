use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use fulcrum::assertion::ExprAssertion;
use fulcrum::loader;
use fulcrum::settings::Settings;
use fulcrum::{AuthorizationService, Identity};

#[derive(Parser, Debug)]
#[command(name = "fulcrum", version, about = "Role-based authorization engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the policy directory and validate the role hierarchy
    Validate,
    /// Evaluate a single permission check
    Check {
        /// Permission identifier, e.g. "post.edit"
        permission: String,
        /// Identity id
        #[arg(long, default_value = "anonymous")]
        identity: String,
        /// Comma-separated role ids assigned to the identity
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
        /// Condition expression evaluated after a positive base check
        #[arg(long)]
        assert: Option<String>,
        /// JSON context for the assertion
        #[arg(long, default_value = "null")]
        context: String,
    },
}

fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    // loading validates the hierarchy, so a cycle fails here, loudly
    let store = loader::load_roles(&settings.policies.dir)?;

    match cli.command {
        Command::Validate => {
            tracing::info!(roles = store.role_count(), "role hierarchy is valid");
            println!("ok: {} roles", store.role_count());
        }
        Command::Check {
            permission,
            identity,
            roles,
            assert,
            context,
        } => {
            let service = if settings.cache.enabled {
                AuthorizationService::with_cache(
                    store,
                    Duration::from_secs(settings.cache.ttl_secs),
                )
            } else {
                AuthorizationService::new(store)
            };

            let identity = Identity::new(identity, roles);
            let context: Value = serde_json::from_str(&context).into_diagnostic()?;

            let granted = match assert {
                Some(source) => {
                    let assertion = ExprAssertion::parse(&source)?;
                    service.is_granted_with(&identity, &permission, &assertion, &context)?
                }
                None => service.is_granted(&identity, &permission)?,
            };

            println!("{}", if granted { "granted" } else { "denied" });
            if !granted {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
