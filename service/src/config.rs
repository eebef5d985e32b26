use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::fmt;
use std::str::FromStr;

/// Default scope requested from GitHub: enough to read the viewer's node id.
pub const DEFAULT_GITHUB_SCOPES: &str = "read:user";
/// Default scope requested from Google.
pub const DEFAULT_GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/userinfo.email";

/// One `key=user_id` entry seeding the demo user directory.
///
/// Keys are either `<provider>:<subject id>` (e.g. `github:MDQ6VXNlcjM5ODM1OTYy`) or an
/// email address, depending on how the provider's accounts are keyed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownUser {
    pub key: String,
    pub user_id: String,
}

impl FromStr for KnownUser {
    type Err = String;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        // Split on the last '=' so base64 padding in a key survives.
        match entry.trim().rsplit_once('=') {
            Some((key, user_id)) if !key.is_empty() && !user_id.is_empty() => Ok(KnownUser {
                key: key.to_string(),
                user_id: user_id.to_string(),
            }),
            _ => Err(format!("expected key=user_id, got '{entry}'")),
        }
    }
}

impl fmt::Display for KnownUser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.key, self.user_id)
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 8080)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// GitHub OAuth app client ID. GitHub login is enabled when this and the secret are set.
    #[arg(long, env)]
    github_client_id: Option<String>,

    /// GitHub OAuth app client secret.
    #[arg(long, env, hide_env_values = true)]
    github_client_secret: Option<String>,

    /// Callback URL sent to GitHub. When unset, GitHub uses the one registered with the app.
    #[arg(long, env)]
    github_redirect_uri: Option<String>,

    /// Scopes requested from GitHub.
    #[arg(long, env, value_delimiter = ',', default_value = DEFAULT_GITHUB_SCOPES)]
    github_scopes: Vec<String>,

    /// Google OAuth client ID. Google login is enabled when this and the secret are set.
    #[arg(long, env)]
    google_client_id: Option<String>,

    /// Google OAuth client secret.
    #[arg(long, env, hide_env_values = true)]
    google_client_secret: Option<String>,

    /// Callback URL sent to Google (e.g. http://localhost:8080/oauth/google/callback).
    #[arg(long, env)]
    google_redirect_uri: Option<String>,

    /// Scopes requested from Google.
    #[arg(long, env, value_delimiter = ',', default_value = DEFAULT_GOOGLE_SCOPES)]
    google_scopes: Vec<String>,

    /// Users known to the demo directory, as comma separated `key=user_id` entries.
    #[arg(long, env, value_delimiter = ',')]
    known_users: Vec<KnownUser>,

    /// Applications a login may target. When empty, any application tag is accepted.
    #[arg(long, env, value_delimiter = ',')]
    allowed_applications: Vec<String>,

    /// Seconds a login attempt's state token stays valid
    #[arg(long, env, default_value_t = 600)]
    pub login_state_ttl_secs: u64,

    /// Seconds between sweeps of expired login attempts
    #[arg(long, env, default_value_t = 60)]
    pub state_sweep_interval_secs: u64,

    /// Timeout in seconds for each call to a provider's token or userinfo endpoint
    #[arg(long, env, default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    /// Timeout in seconds for handling a whole incoming request
    #[arg(long, env, default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn github_client_id(&self) -> Option<String> {
        self.github_client_id.clone()
    }

    pub fn github_client_secret(&self) -> Option<String> {
        self.github_client_secret.clone()
    }

    pub fn github_redirect_uri(&self) -> Option<String> {
        self.github_redirect_uri.clone()
    }

    pub fn github_scopes(&self) -> &[String] {
        &self.github_scopes
    }

    pub fn google_client_id(&self) -> Option<String> {
        self.google_client_id.clone()
    }

    pub fn google_client_secret(&self) -> Option<String> {
        self.google_client_secret.clone()
    }

    pub fn google_redirect_uri(&self) -> Option<String> {
        self.google_redirect_uri.clone()
    }

    pub fn google_scopes(&self) -> &[String] {
        &self.google_scopes
    }

    pub fn known_users(&self) -> &[KnownUser] {
        &self.known_users
    }

    /// Returns the configured application allow-list, ignoring blank entries.
    pub fn allowed_applications(&self) -> Vec<&str> {
        self.allowed_applications
            .iter()
            .map(|app| app.trim())
            .filter(|app| !app.is_empty())
            .collect()
    }
}
