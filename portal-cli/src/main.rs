//! Portal CLI - Command-line front end for the demo portal's auth layer
//!
//! Each invocation builds an auth context from the configured backend, runs
//! one command against it and shuts it down again. The signed-in user is
//! carried between invocations by the cached current user.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use portal_auth::{AuthContext, UserAccount};
use portal_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, PortalConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Accounts, approvals and sessions for the demo portal")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login { email: String, password: String },

    /// Sign out the current user
    Logout,

    /// Show the signed-in user and check the session once
    Whoami,

    /// Register a student account awaiting approval
    Register { email: String, password: String },

    /// Add a student account (admin)
    AddStudent {
        email: String,
        password: String,

        /// Approve the account right away
        #[arg(long)]
        approve: bool,
    },

    /// Delete an account (admin)
    Delete { email: String },

    /// Approve a pending student (admin)
    Approve { email: String },

    /// Reject a pending student, deleting the account (admin)
    Reject { email: String },

    /// List students awaiting approval (admin)
    Pending {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List approved students (admin)
    Approved {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List all accounts (admin)
    Users {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Keep the session monitor running until the session expires or Ctrl-C
    Watch,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_ref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config = logging_config.verbose();
        logging_config.level = "debug".to_string();
    }

    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting Portal CLI v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file found, using defaults"),
    }

    if let Commands::Config {
        show,
        init,
        validate,
    } = cli.command
    {
        return handle_config(show, init, validate, &config);
    }

    config.validate()?;

    let ctx = AuthContext::from_config(&config)
        .await
        .context("Failed to open the account store")?;

    let result = run_command(cli.command, &ctx).await;
    ctx.shutdown().await;
    result
}

async fn run_command(command: Commands, ctx: &AuthContext) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => handle_login(ctx, &email, &password).await,
        Commands::Logout => handle_logout(ctx).await,
        Commands::Whoami => handle_whoami(ctx).await,
        Commands::Register { email, password } => {
            handle_add_student(ctx, &email, &password, false).await
        }
        Commands::AddStudent {
            email,
            password,
            approve,
        } => {
            require_admin(ctx).await?;
            handle_add_student(ctx, &email, &password, approve).await
        }
        Commands::Delete { email } => {
            require_admin(ctx).await?;
            let existed = is_listed(&ctx.users().await, &email);
            ctx.delete_student(&email).await;
            ctx.refresh_users().await;
            let message = confirm_removed(&ctx.users().await, &email, existed, "deleted")?;
            println!("🗑️  {}", message);
            Ok(())
        }
        Commands::Approve { email } => {
            require_admin(ctx).await?;
            ctx.approve_student(&email).await;
            ctx.refresh_users().await;
            println!("✅ {}", confirm_approved(&ctx.users().await, &email)?);
            Ok(())
        }
        Commands::Reject { email } => {
            require_admin(ctx).await?;
            let existed = is_listed(&ctx.users().await, &email);
            ctx.reject_student(&email).await;
            ctx.refresh_users().await;
            let message = confirm_removed(&ctx.users().await, &email, existed, "rejected")?;
            println!("❌ {}", message);
            Ok(())
        }
        Commands::Pending { json } => {
            require_admin(ctx).await?;
            print_accounts("Pending students", &ctx.get_pending_students().await, json)
        }
        Commands::Approved { json } => {
            require_admin(ctx).await?;
            print_accounts("Approved students", &ctx.get_approved_students().await, json)
        }
        Commands::Users { json } => {
            require_admin(ctx).await?;
            print_accounts("Accounts", &ctx.users().await, json)
        }
        Commands::Watch => handle_watch(ctx).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn load_config(
    config_path: Option<&PathBuf>,
) -> anyhow::Result<(PortalConfig, Option<PathBuf>)> {
    if let Some(path) = config_path {
        let config = PortalConfig::from_file(path)?;
        return Ok((config, Some(path.clone())));
    }

    // Try to load from default locations
    let default_paths = [
        dirs::config_dir().map(|d| d.join("portal").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".portal").join("config.toml")),
        Some(PathBuf::from("portal.toml")),
    ];

    for path in default_paths.into_iter().flatten() {
        if path.exists() {
            let config = PortalConfig::from_file(&path)?;
            return Ok((config, Some(path)));
        }
    }

    Ok((PortalConfig::default(), None))
}

async fn handle_login(ctx: &AuthContext, email: &str, password: &str) -> anyhow::Result<()> {
    log_operation_start!("login", email = %email);

    let outcome = ctx.login(email, password).await;
    if !outcome.success {
        log_operation_error!("login", outcome.message, email = %email);
        bail!("{}", outcome.message);
    }

    let role = if outcome.is_admin == Some(true) {
        "admin"
    } else {
        "student"
    };
    println!("✅ {} ({} as {})", outcome.message, email, role);

    log_operation_success!("login", email = %email);
    Ok(())
}

async fn handle_logout(ctx: &AuthContext) -> anyhow::Result<()> {
    match ctx.current_user().await {
        Some(user) => {
            ctx.logout().await;
            println!("👋 Signed out {}", user.email);
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

async fn handle_whoami(ctx: &AuthContext) -> anyhow::Result<()> {
    let Some(user) = ctx.current_user().await else {
        println!("Not signed in");
        return Ok(());
    };

    if ctx.poll_session().await {
        println!("👤 {} (id {}, {})", user.email, user.id, user.role);
    } else {
        println!("⌛ Session for {} has expired, please sign in again", user.email);
    }
    Ok(())
}

async fn handle_add_student(
    ctx: &AuthContext,
    email: &str,
    password: &str,
    approve: bool,
) -> anyhow::Result<()> {
    log_operation_start!("add_student", email = %email, approve = approve);

    let outcome = ctx.add_student(email, password, approve).await;
    if !outcome.success {
        log_operation_error!("add_student", outcome.message, email = %email);
        bail!("{}", outcome.message);
    }

    println!("✅ {}", outcome.message);
    if !approve {
        println!("📝 {} can sign in once an admin approves the account", email);
    }

    log_operation_success!("add_student", email = %email);
    Ok(())
}

async fn handle_watch(ctx: &AuthContext) -> anyhow::Result<()> {
    let Some(user) = ctx.current_user().await else {
        bail!("Not signed in");
    };

    if user.is_admin() {
        println!("👀 Signed in as admin {}; admin sessions do not expire", user.email);
    } else {
        println!("👀 Watching session of {} (Ctrl-C to stop)", user.email);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                println!("Stopped watching");
                return Ok(());
            }
            _ = ticker.tick() => {
                if ctx.session_expired().await {
                    println!("⌛ Session for {} has expired", user.email);
                    return Ok(());
                }
                debug!(user_id = user.id, "Session still active");
            }
        }
    }
}

async fn require_admin(ctx: &AuthContext) -> anyhow::Result<()> {
    match ctx.current_user().await {
        Some(user) if user.is_admin() => Ok(()),
        Some(user) => bail!("{} is not an admin", user.email),
        None => bail!("Sign in as an admin first (portal login <email> <password>)"),
    }
}

fn is_listed(users: &[UserAccount], email: &str) -> bool {
    users.iter().any(|user| user.email == email)
}

/// Check a delete or reject against the reloaded account list. The context
/// only logs store failures, so a still-listed account means it failed.
fn confirm_removed(
    users: &[UserAccount],
    email: &str,
    existed: bool,
    action: &str,
) -> anyhow::Result<String> {
    if is_listed(users, email) {
        bail!("{} is still listed and was not {}; see the log", email, action);
    }
    if existed {
        Ok(format!("{} {}", email, action))
    } else {
        Ok(format!("No account for {}", email))
    }
}

fn confirm_approved(users: &[UserAccount], email: &str) -> anyhow::Result<String> {
    match users.iter().find(|user| user.email == email) {
        Some(user) if user.approved => Ok(format!("{} approved", email)),
        Some(_) => bail!("{} is still pending; see the log", email),
        None => bail!("No account for {}", email),
    }
}

fn print_accounts(title: &str, accounts: &[UserAccount], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(accounts)?);
        return Ok(());
    }

    println!("📋 {} ({}):", title, accounts.len());
    for account in accounts {
        println!(
            "  {:>4}  {:<32} {:<8} {}",
            account.id,
            account.email,
            account.role.to_string(),
            if account.approved { "approved" } else { "pending" }
        );
    }
    Ok(())
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config: &PortalConfig,
) -> anyhow::Result<()> {
    if init {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
            .context("Could not determine a configuration directory")?
            .join("portal");

        std::fs::create_dir_all(&config_dir)?;
        let config_path = config_dir.join("config.toml");

        PortalConfig::default().save_to_file(&config_path)?;
        println!("✅ Configuration initialized at: {:?}", config_path);
    }

    if show {
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_auth::Role;

    fn account(id: u64, email: &str, approved: bool) -> UserAccount {
        UserAccount {
            id,
            email: email.to_string(),
            role: Role::Student,
            approved,
        }
    }

    #[test]
    fn test_confirm_removed_reports_failure_while_listed() {
        let users = vec![account(2, "s@x.com", true)];

        assert!(confirm_removed(&users, "s@x.com", true, "deleted").is_err());
        assert_eq!(
            confirm_removed(&[], "s@x.com", true, "deleted").unwrap(),
            "s@x.com deleted"
        );
        assert_eq!(
            confirm_removed(&users, "other@x.com", false, "rejected").unwrap(),
            "No account for other@x.com"
        );
    }

    #[test]
    fn test_confirm_approved_requires_approved_flag() {
        let users = vec![account(3, "p@x.com", false), account(4, "a@x.com", true)];

        assert!(confirm_approved(&users, "p@x.com").is_err());
        assert!(confirm_approved(&users, "missing@x.com").is_err());
        assert_eq!(confirm_approved(&users, "a@x.com").unwrap(), "a@x.com approved");
    }
}
