use anyhow::{Context, Result};
use chrono::Local;
use dialoguer::Password;
use serde_json::Value;

use simpleinout::client::{Flow, SimpleInOut};
use simpleinout::config::{self, CliArgs, Command, LogFormat};
use simpleinout::{AuthorizationCodeClient, PasswordClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let args = CliArgs::load();

    // Initialize logging with a configured level; stdout is reserved for output
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    match args.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    tracing::debug!("Command: {:?}", args.command);

    let options = args.client_options();

    let output = match &args.command {
        Command::Login { username, password } => {
            let client = PasswordClient::new(options).context("Invalid client configuration")?;

            let password = match password {
                Some(password) => password.clone(),
                None => Password::new()
                    .with_prompt(format!("Simple In/Out password for {}", username))
                    .interact()
                    .context("Failed to read password")?,
            };

            let creds = client.get_access_token(username, &password).await?;
            tracing::info!("✅ Authentication successful");
            serde_json::to_value(creds)?
        }
        Command::Authorize { code } => {
            let client =
                AuthorizationCodeClient::new(options).context("Invalid client configuration")?;
            let creds = client.get_access_token(code.as_deref()).await?;
            tracing::info!("✅ Authentication successful");
            serde_json::to_value(creds)?
        }
        // A redirect URI marks an authorization-code deployment; only the
        // store behaviour differs, requests are identical
        command if args.redirect_uri.is_some() => {
            let client =
                AuthorizationCodeClient::new(options).context("Invalid client configuration")?;
            run(&client, command).await?
        }
        command => {
            let client = PasswordClient::new(options).context("Invalid client configuration")?;
            run(&client, command).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute an API command against an already-built client
async fn run<F: Flow>(client: &SimpleInOut<F>, command: &Command) -> Result<Value> {
    let value = match command {
        Command::Refresh => serde_json::to_value(client.refresh_access_token().await?)?,
        Command::Ok => client.ok().await?,
        Command::Company => client.company().await?,
        Command::Fences => client.fences().await?,
        Command::Groups => client.groups().await?,
        Command::Statuses { query } => client.statuses(query.as_slice()).await?,
        Command::CurrentUser => client.current_user().await?,
        Command::User { id } => client.user(id).await?,
        Command::UserStatuses {
            id,
            start_date,
            end_date,
        } => {
            let (default_start, default_end) =
                config::default_date_range(Local::now().date_naive());
            let query = [
                ("start_date", start_date.clone().unwrap_or(default_start)),
                ("end_date", end_date.clone().unwrap_or(default_end)),
            ];
            client.user_statuses(id, &query).await?
        }
        Command::Login { .. } | Command::Authorize { .. } => {
            anyhow::bail!("Token acquisition commands are not API requests")
        }
    };

    Ok(value)
}
