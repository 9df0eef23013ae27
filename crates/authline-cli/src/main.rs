//! authline - command line client for the auth and user services.
//!
//! Logs in with a one-time code, keeps the credential pair in the configured
//! backend and renews it transparently on every call.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authline_core::auth::SessionStatus;
use authline_core::{ApiClient, Config, LocaleStore, Navigator};

const USAGE: &str = "\
Usage: authline <command> [args]

Commands:
  login <identifier>   Request a one-time code and log in
  status               Show the local session state
  whoami               Ask the server whether the session is valid
  profile              Show the current user's profile
  get <path>           GET an API path and print the JSON response
  logout               Revoke the session and clear stored credentials
  locale <code>        Set the language sent with every request";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Tells the user to log in again once the session has been dropped.
fn login_prompt() -> Arc<dyn Navigator> {
    Arc::new(|target: &str| {
        eprintln!("Session expired. Run `authline login <identifier>` to sign in again ({}).", target);
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load()?;
    if command == "locale" {
        return set_locale(&mut config, args.get(1));
    }

    let store = Arc::new(config.credential_store()?);
    info!(backend = store.backend_name(), "Credential store ready");
    let client = ApiClient::from_config(&config, store, Some(login_prompt()))?;

    match command.as_str() {
        "login" => {
            let identifier = args.get(1).context("login requires an identifier")?;
            login(&client, identifier).await
        }
        "status" => {
            status(&client, &config);
            Ok(())
        }
        "whoami" => {
            let msg = client.check_user().await?;
            println!("{}", msg);
            Ok(())
        }
        "profile" => profile(&client).await,
        "get" => {
            let path = args.get(1).context("get requires a path")?;
            let body: Value = client.get(path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        "logout" => {
            match client.logout().await {
                Ok(Some(response)) => println!("{}", response.msg),
                Ok(None) => println!("Not logged in"),
                Err(e) => println!("Logged out locally (server: {})", e),
            }
            Ok(())
        }
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

async fn login(client: &ApiClient, identifier: &str) -> Result<()> {
    let requested = client.request_otp(identifier).await?;
    println!("{} ({})", requested.message, requested.identifier_type);
    if let Some(code) = &requested.otp_code {
        println!("Development code: {}", code);
    }

    let code = rpassword::prompt_password("One-time code: ").context("Failed to read code")?;
    let verified = client.verify_otp(identifier, &code).await?;

    let name = verified.user_data.name.as_deref().unwrap_or(identifier);
    if verified.is_new_user {
        println!("Welcome, {}! Your account has been created.", name);
    } else {
        println!("Logged in as {}", name);
    }
    Ok(())
}

fn status(client: &ApiClient, config: &Config) {
    let state = match client.session().status() {
        SessionStatus::Authenticated => "logged in",
        SessionStatus::Partial => "incomplete credentials",
        SessionStatus::Anonymous => "logged out",
    };
    println!("Session:   {}", state);
    println!("Server:    {}", config.api_base_url);
    println!("Backend:   {}", client.store().backend_name());
    println!("Locale:    {}", client.locale().get());
    println!("Renewal:   {:?}", client.renewal_state());
}

async fn profile(client: &ApiClient) -> Result<()> {
    let profile = client.fetch_profile().await?;

    println!("Name:      {}", profile.display_name());
    println!("Role:      {}", profile.role);
    if let Some(email) = &profile.email {
        println!("Email:     {}", email);
    }
    if let Some(phone) = &profile.phone_number {
        println!("Phone:     {}", phone);
    }
    if let Some(created) = profile.created_at() {
        println!("Member since {}", created.format("%Y-%m-%d"));
    }
    if profile.has_pending_updates() {
        println!("Changes awaiting approval: {:?}", profile.pending_updates.unwrap_or_default());
    }
    Ok(())
}

fn set_locale(config: &mut Config, code: Option<&String>) -> Result<()> {
    let code = code.context("locale requires a language code")?;
    let locale = LocaleStore::new(code)?;
    config.locale = locale.get();
    config.save()?;
    println!("Locale set to {}", config.locale);
    Ok(())
}
