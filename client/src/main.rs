//! Guuber - account onboarding from the terminal.
//!
//! # Commands
//!
//! - `guuber register`: Create an account with the step-by-step form
//! - `guuber sign-in --email <email>`: Sign in with email and password
//! - `guuber google --id-token <token>`: Sign in with a Google ID token
//! - `guuber check-username <name>`: Check whether a username is free
//!
//! Passwords are read without echo when standard input is a terminal. Each
//! run is its own session; nothing is stored between runs.
//!
//! # Environment Variables
//!
//! See the [`config`](guuber_client::config) module for available configuration options.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use guuber_client::config::Config;
use guuber_client::firebase::FirebaseGateway;
use guuber_client::identity::IdTokenProvider;
use guuber_client::terminal::{self, ConsoleInput, FormRun, TerminalFeedback};
use guuber_core::{
    AlternateSignInController, FormField, RegistrationFormController, RemoteAccountGateway,
    SignInOutcome,
};

/// Guuber - account onboarding from the terminal.
#[derive(Parser, Debug)]
#[command(name = "guuber")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    GUUBER_FIREBASE_API_KEY      Firebase Web API key (required)
    GUUBER_FIREBASE_PROJECT_ID   Firebase project ID (required)
    GUUBER_AUTH_URL              Identity Toolkit URL (default: https://identitytoolkit.googleapis.com)
    GUUBER_FIRESTORE_URL         Firestore URL (default: https://firestore.googleapis.com)
    GUUBER_REQUEST_TIMEOUT_SECS  Request timeout in seconds (default: 10)
    GUUBER_LOG_JSON              Log as JSON lines (default: false)
    RUST_LOG                     Log level filter (default: warn)

Passwords are not echoed when typed at a terminal. Piped input is read as-is.

EXAMPLES:
    # Create an account
    guuber register

    # Sign in
    guuber sign-in --email jo@example.com

    # Sign in with Google
    guuber google --id-token \"$GOOGLE_ID_TOKEN\"
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    ///
    /// Asks for each field in turn; a field is only asked once the previous
    /// one is valid.
    Register,

    /// Sign in with email and password.
    ///
    /// The password is read from standard input.
    SignIn {
        /// Account email address.
        #[arg(short, long)]
        email: String,
    },

    /// Sign in with a Google ID token.
    ///
    /// New Google users pick a username and password to finish signing up.
    Google {
        /// Google ID token (JWT).
        #[arg(long)]
        id_token: String,

        /// Google OAuth access token.
        #[arg(long)]
        access_token: Option<String>,
    },

    /// Check whether a username is still available.
    CheckUsername {
        /// Username to look up (case-insensitive).
        username: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            init_logging(false);
            error!(error = %err, "Failed to load configuration");
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("Required environment variables:");
            eprintln!("  GUUBER_FIREBASE_API_KEY    - Firebase Web API key");
            eprintln!("  GUUBER_FIREBASE_PROJECT_ID - Firebase project ID");
            return ExitCode::from(2);
        }
    };

    init_logging(config.log_json);
    debug!(config = ?config, "Configuration loaded");

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<ExitCode> {
    let gateway =
        Arc::new(FirebaseGateway::from_config(config).context("Failed to create Firebase client")?);

    match command {
        Command::Register => run_register(gateway).await,
        Command::SignIn { email } => run_sign_in(gateway, &email).await,
        Command::Google {
            id_token,
            access_token,
        } => run_google(gateway, id_token, access_token).await,
        Command::CheckUsername { username } => {
            let available = gateway.check_username_availability(&username).await?;
            if available {
                println!("@{} is available.", username.to_lowercase());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("@{} is already taken.", username.to_lowercase());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Runs the register command.
async fn run_register(gateway: Arc<FirebaseGateway>) -> Result<ExitCode> {
    let mut form = RegistrationFormController::new(gateway).with_feedback(Arc::new(TerminalFeedback));

    let mut input = ConsoleInput;
    let mut output = io::stdout();

    match terminal::drive_form(&mut form, &mut input, &mut output).await? {
        FormRun::Completed(_) => Ok(ExitCode::SUCCESS),
        FormRun::Abandoned => {
            eprintln!("Aborted.");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs the sign-in command.
async fn run_sign_in(gateway: Arc<FirebaseGateway>, email: &str) -> Result<ExitCode> {
    let mut input = ConsoleInput;
    let mut output = io::stderr();

    let Some(password) =
        terminal::prompt_secret(&mut input, &mut output, FormField::Password.label())?
    else {
        eprintln!("Aborted.");
        return Ok(ExitCode::FAILURE);
    };

    let record = gateway.sign_in(email.trim(), &password).await?;
    println!("Welcome back, {} (@{}).", record.first_name, record.username);
    Ok(ExitCode::SUCCESS)
}

/// Runs the google command, finishing registration for new identities.
async fn run_google(
    gateway: Arc<FirebaseGateway>,
    id_token: String,
    access_token: Option<String>,
) -> Result<ExitCode> {
    let provider = Arc::new(IdTokenProvider::new(id_token, access_token));
    let mut controller =
        AlternateSignInController::new(gateway, provider).with_feedback(Arc::new(TerminalFeedback));

    match controller.sign_in().await {
        SignInOutcome::SignedIn(record) => {
            println!("Welcome back, {} (@{}).", record.first_name, record.username);
            Ok(ExitCode::SUCCESS)
        }
        SignInOutcome::Failed(message) => {
            eprintln!("Google sign-in failed: {message}");
            Ok(ExitCode::FAILURE)
        }
        SignInOutcome::NeedsRegistrationCompletion { .. } => {
            let mut form = controller.completion_form()?;
            let mut input = ConsoleInput;
            let mut output = io::stdout();

            match terminal::drive_form_with(&mut form, &mut controller, &mut input, &mut output)
                .await?
            {
                FormRun::Completed(_) => Ok(ExitCode::SUCCESS),
                FormRun::Abandoned => {
                    eprintln!("Aborted.");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Initialize structured logging with tracing.
///
/// Logs go to stderr so they never mix with prompts:
/// - Environment-based log level filtering via RUST_LOG
/// - Default log level of `warn`
/// - JSON lines when `GUUBER_LOG_JSON` is set
fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(io::stderr),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .init();
    }
}
