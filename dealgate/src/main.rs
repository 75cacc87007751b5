use std::sync::Arc;

use clap::Parser;
use dealgate::{
    AppState, Application, Config,
    auth::AuthService,
    config::{Args, Command},
    errors::Error,
    store::postgres::PgUserDirectory,
    telemetry,
};

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Prompt for a password without echoing it, and ask twice so a typo does
/// not get hashed into an account nobody can open.
fn prompt_password() -> anyhow::Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("passwords do not match");
    }
    Ok(password)
}

/// Take a password from the flag if given, otherwise prompt interactively.
fn resolve_password(flag: Option<String>, config: &Config) -> anyhow::Result<String> {
    let password = match flag {
        Some(p) => p,
        None => prompt_password()?,
    };
    let min_length = config.auth.password_min_length;
    if password.len() < min_length {
        anyhow::bail!("password must be at least {min_length} characters");
    }
    Ok(password)
}

/// Create the bootstrap admin, treating an already-bootstrapped system as
/// success so `init` is safe to run unconditionally from provisioning
/// scripts. Returns the message to print.
async fn init_admin(auth: &AuthService, username: &str, password: &str) -> anyhow::Result<String> {
    match auth.bootstrap_admin(username, password).await {
        Ok(admin) => Ok(format!("Created admin account '{}' ({})", admin.username, admin.id)),
        Err(Error::AdminAlreadyExists) => Ok("Admin account already exists. No changes made.".to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Build an auth service over the production database for the operator
/// subcommands, which run outside the HTTP server.
async fn operator_auth_service(config: &Config) -> anyhow::Result<AuthService> {
    let pool = dealgate::connect_pool(config).await?;
    let users = Arc::new(PgUserDirectory::new(pool));
    Ok(AuthService::new(users, AppState::hasher_from_config(config)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_tracing();
    tracing::debug!("{:?}", args);

    match args.command {
        None | Some(Command::Serve) => {
            let shutdown = shutdown_signal();
            Application::new(config).await?.serve(shutdown).await
        }
        Some(Command::Init { username, password }) => {
            let password = resolve_password(password, &config)?;
            let auth = operator_auth_service(&config).await?;
            println!("{}", init_admin(&auth, &username, &password).await?);
            Ok(())
        }
        Some(Command::ResetPassword { username, password }) => {
            let password = resolve_password(password, &config)?;
            let auth = operator_auth_service(&config).await?;
            auth.reset_password(&username, &password).await?;
            println!("Password updated for '{username}'");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealgate::auth::password::{Hasher, HashingCost};
    use dealgate::store::memory::MemoryUserDirectory;

    fn memory_auth_service() -> AuthService {
        let hasher = Hasher::new(HashingCost {
            memory_kib: 8192,
            iterations: 1,
            parallelism: 1,
        });
        AuthService::new(Arc::new(MemoryUserDirectory::new()), hasher)
    }

    #[tokio::test]
    async fn test_init_admin_reports_rerun_as_success() {
        let auth = memory_auth_service();

        let first = init_admin(&auth, "admin", "first-password").await.unwrap();
        assert!(first.starts_with("Created admin account 'admin'"));

        // A second init is a no-op message, not an error, and must not
        // touch the existing credentials
        let second = init_admin(&auth, "admin", "other-password").await.unwrap();
        assert_eq!(second, "Admin account already exists. No changes made.");
        auth.login("admin", "first-password").await.unwrap();
    }

    #[test]
    fn test_resolve_password_enforces_minimum_length() {
        let config = Config::default();

        let err = resolve_password(Some("short".to_string()), &config).unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));

        let ok = resolve_password(Some("long enough pw".to_string()), &config).unwrap();
        assert_eq!(ok, "long enough pw");
    }
}
