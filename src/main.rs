use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};

use filedesk::api::auth::TokenClaims;
use filedesk::api::types::{AddressFields, NewUser, ProfileUpdate};
use filedesk::api::{account, dashboard, files, profile};
use filedesk::api::{ApiClient, ApiError, Session, SessionStatus};
use filedesk::config::{Config, StoreKind};

#[derive(Parser, Debug)]
#[command(name = "filedesk", version, about = "File-management console")]
struct Cli {
    /// API base URL (overrides FILEDESK_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Token store: keychain, file or memory (overrides FILEDESK_TOKEN_STORE)
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored tokens
    Logout,
    /// Show who is signed in
    Status,
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Address(AddressCommand),
    #[command(subcommand)]
    Files(FilesCommand),
    /// Upload statistics
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
}

#[derive(Args, Debug)]
struct AddressArgs {
    #[arg(long)]
    street: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    postal_code: String,
    #[arg(long)]
    country: String,
    /// Make this the default address
    #[arg(long)]
    default: bool,
}

impl From<AddressArgs> for AddressFields {
    fn from(args: AddressArgs) -> Self {
        AddressFields {
            street: args.street,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
            country: args.country,
            is_default: args.default,
        }
    }
}

#[derive(Subcommand, Debug)]
enum AddressCommand {
    List,
    Add(AddressArgs),
    Update {
        id: u64,
        #[command(flatten)]
        fields: AddressArgs,
    },
    Delete {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum FilesCommand {
    List,
    Upload {
        path: PathBuf,
    },
    Download {
        id: u64,
        /// Destination path; defaults to the server-provided file name
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    Delete {
        id: u64,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(store) = cli.store {
        config.store = store.parse::<StoreKind>()?;
    }
    log::debug!("API base URL: {}", config.api_url);

    let session = Arc::new(Session::open(config.open_store()?)?);
    let mut status = session.subscribe();
    let client = ApiClient::with_timeouts(
        &config.api_url,
        session.clone(),
        config.timeout,
        config.connect_timeout,
    )?;

    let result = dispatch(cli.command, &client).await;

    if status.has_changed().unwrap_or(false)
        && *status.borrow_and_update() == SessionStatus::Expired
    {
        eprintln!("Session expired. Run `filedesk login` to sign in again.");
    }
    result
}

async fn dispatch(command: Command, client: &ApiClient) -> Result<(), ApiError> {
    match command {
        Command::Login { email, password } => {
            let password = password_or_stdin(password)?;
            let login = account::login(client, &email, &password).await?;
            println!(
                "Signed in as {}",
                login.username.as_deref().unwrap_or(&email)
            );
        }
        Command::Register {
            email,
            username,
            phone,
            password,
        } => {
            let password = password_or_stdin(password)?;
            let user = account::register(
                client,
                &NewUser {
                    email,
                    username,
                    phone_number: phone,
                    password,
                },
            )
            .await?;
            println!("Registered {} (id {}). You can now log in.", user.email, user.id);
        }
        Command::Logout => {
            account::logout(client).await?;
            println!("Signed out");
        }
        Command::Status => print_status(client).await,
        Command::Profile(ProfileCommand::Show) => {
            let p = profile::get_profile(client).await?;
            println!("{} <{}>", p.username, p.email);
            if !p.phone_number.is_empty() {
                println!("Phone: {}", p.phone_number);
            }
            for address in &p.addresses {
                let marker = if address.is_default { " (default)" } else { "" };
                println!("  [{}] {}{}", address.id, address.summary(), marker);
            }
        }
        Command::Profile(ProfileCommand::Update { username, phone }) => {
            let p = profile::update_profile(
                client,
                &ProfileUpdate {
                    username,
                    phone_number: phone,
                },
            )
            .await?;
            println!("Profile updated: {} <{}>", p.username, p.email);
        }
        Command::Address(AddressCommand::List) => {
            for address in profile::list_addresses(client).await? {
                let marker = if address.is_default { " (default)" } else { "" };
                println!("[{}] {}{}", address.id, address.summary(), marker);
            }
        }
        Command::Address(AddressCommand::Add(fields)) => {
            let address = profile::create_address(client, &fields.into()).await?;
            println!("Added address {}", address.id);
        }
        Command::Address(AddressCommand::Update { id, fields }) => {
            let address = profile::update_address(client, id, &fields.into()).await?;
            println!("Updated address {}", address.id);
        }
        Command::Address(AddressCommand::Delete { id }) => {
            profile::delete_address(client, id).await?;
            println!("Deleted address {}", id);
        }
        Command::Files(FilesCommand::List) => {
            for f in files::list_files(client).await? {
                println!(
                    "{:>6}  {:<6} {}  {}",
                    f.id,
                    f.file_type.label(),
                    f.upload_date,
                    f.original_filename
                );
            }
        }
        Command::Files(FilesCommand::Upload { path }) => {
            let uploaded = files::upload_path(client, &path).await?;
            println!(
                "Uploaded {} as file {} ({})",
                uploaded.original_filename,
                uploaded.id,
                uploaded.file_type.label()
            );
        }
        Command::Files(FilesCommand::Download { id, output }) => {
            let download = files::download_file(client, id).await?;
            let target = output
                .or_else(|| download.file_name.clone().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(format!("file-{}", id)));
            tokio::fs::write(&target, &download.data).await?;
            println!("Saved {} bytes to {}", download.data.len(), target.display());
        }
        Command::Files(FilesCommand::Delete { id }) => {
            files::delete_file(client, id).await?;
            println!("Deleted file {}", id);
        }
        Command::Dashboard => {
            let stats = dashboard::get_dashboard(client).await?;
            println!("Total files uploaded: {}", stats.total_files);
            for entry in &stats.file_types {
                println!("  {:<6} {}", entry.file_type.label(), entry.count);
            }
            if let Some(users) = stats.users_files.filter(|u| !u.is_empty()) {
                println!("Files uploaded by users:");
                for user in users {
                    println!("  {:<32} {}", user.email, user.file_count);
                }
            }
        }
    }
    Ok(())
}

async fn print_status(client: &ApiClient) {
    let session = client.session();
    let token = match session.access_token().await {
        Some(token) if session.status() == SessionStatus::Active => token,
        _ => {
            println!("Not signed in");
            return;
        }
    };

    match TokenClaims::decode(&token) {
        Ok(claims) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            println!("{}", status_line(&claims, now));
        }
        Err(e) => {
            log::debug!("Access token is not a readable JWT: {}", e);
            println!("Signed in");
        }
    }
}

fn status_line(claims: &TokenClaims, now: i64) -> String {
    let who = claims
        .email
        .as_deref()
        .or(claims.username.as_deref())
        .unwrap_or("unknown user");
    match claims.expires_in(now) {
        Some(secs) if secs > 0 => {
            format!("Signed in as {} (access token expires in {}s)", who, secs)
        }
        Some(_) => format!("Signed in as {} (access token expired, will refresh)", who),
        None => format!("Signed in as {}", who),
    }
}

/// Use the flag value, or read one line from stdin.
fn password_or_stdin(password: Option<String>) -> Result<String, ApiError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(email: Option<&str>, username: Option<&str>, exp: Option<i64>) -> TokenClaims {
        TokenClaims {
            user_id: Some(1),
            email: email.map(str::to_string),
            username: username.map(str::to_string),
            exp,
            token_type: Some("access".to_string()),
        }
    }

    #[test]
    fn test_status_line_prefers_email_and_shows_expiry() {
        let c = claims(Some("ada@example.com"), Some("ada"), Some(1_000));
        assert_eq!(
            status_line(&c, 700),
            "Signed in as ada@example.com (access token expires in 300s)"
        );
        assert_eq!(
            status_line(&c, 1_000),
            "Signed in as ada@example.com (access token expired, will refresh)"
        );
    }

    #[test]
    fn test_status_line_falls_back_to_username() {
        assert_eq!(
            status_line(&claims(None, Some("ada"), None), 0),
            "Signed in as ada"
        );
        assert_eq!(
            status_line(&claims(None, None, None), 0),
            "Signed in as unknown user"
        );
    }
}
