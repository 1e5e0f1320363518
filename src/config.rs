use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{Error, Result};
use crate::store::S3Location;

/// Production service root
pub const DEFAULT_BASE_URL: &str = "https://www.simpleinout.com";

/// Region used for the credentials bucket when none is configured
pub const DEFAULT_STORE_REGION: &str = "us-east-1";

/// Transport timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Client construction options
///
/// Every field is optional here; [`ClientConfig::from_options`] enforces what
/// is required. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Required by the authorization-code flow only
    pub redirect_uri: Option<String>,

    // Seed tokens
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,

    // Credential store (all four or none)
    pub store_access_key: Option<String>,
    pub store_secret_key: Option<String>,
    pub store_bucket: Option<String>,
    pub store_object_key: Option<String>,

    // Credential store extras, defaulted
    pub store_region: Option<String>,
    pub store_endpoint: Option<String>,

    /// Service root, defaults to [`DEFAULT_BASE_URL`]
    pub base_url: Option<String>,
    /// Seconds, defaults to [`DEFAULT_REQUEST_TIMEOUT`]
    pub request_timeout: Option<u64>,
}

/// Validated S3 store settings
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub location: S3Location,
}

/// Validated, immutable client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub store: Option<StoreConfig>,
    pub base_url: String,
    pub request_timeout: u64,
}

impl ClientConfig {
    pub fn from_options(options: ClientOptions) -> Result<Self> {
        let client_id = non_empty(options.client_id).ok_or(Error::MissingParameter("client_id"))?;
        let client_secret =
            non_empty(options.client_secret).ok_or(Error::MissingParameter("client_secret"))?;

        let store = store_config(
            non_empty(options.store_access_key),
            non_empty(options.store_secret_key),
            non_empty(options.store_bucket),
            non_empty(options.store_object_key),
            non_empty(options.store_region),
            non_empty(options.store_endpoint),
        )?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: non_empty(options.redirect_uri),
            access_token: non_empty(options.access_token),
            refresh_token: non_empty(options.refresh_token),
            store,
            base_url: non_empty(options.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: options.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// All-or-nothing: supplying any store field requires the other three
fn store_config(
    access_key: Option<String>,
    secret_key: Option<String>,
    bucket: Option<String>,
    object_key: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
) -> Result<Option<StoreConfig>> {
    match (access_key, secret_key, bucket, object_key) {
        (None, None, None, None) => Ok(None),
        (Some(access_key_id), Some(secret_access_key), Some(bucket), Some(key)) => {
            Ok(Some(StoreConfig {
                access_key_id,
                secret_access_key,
                location: S3Location {
                    bucket,
                    key,
                    region: region.unwrap_or_else(|| DEFAULT_STORE_REGION.to_string()),
                    endpoint,
                },
            }))
        }
        (access_key, secret_key, bucket, _) => {
            let missing = if access_key.is_none() {
                "store_access_key"
            } else if secret_key.is_none() {
                "store_secret_key"
            } else if bucket.is_none() {
                "store_bucket"
            } else {
                "store_object_key"
            };
            Err(Error::MissingParameter(missing))
        }
    }
}

/// Simple In/Out API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// OAuth client ID
    #[arg(long, env = "SIMPLE_IN_OUT_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "SIMPLE_IN_OUT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth redirect URI (authorization-code flow)
    #[arg(long, env = "SIMPLE_IN_OUT_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Seed access token
    #[arg(long, env = "SIMPLE_IN_OUT_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Seed refresh token
    #[arg(long, env = "SIMPLE_IN_OUT_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// AWS access key for the credentials bucket
    #[arg(long, env = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,

    /// AWS secret key for the credentials bucket
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    /// S3 bucket holding the credentials object
    #[arg(long, env = "SIMPLE_IN_OUT_CREDENTIALS_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// S3 key of the credentials object
    #[arg(long, env = "SIMPLE_IN_OUT_CREDENTIALS_S3_KEY")]
    pub s3_key: Option<String>,

    /// AWS region of the credentials bucket
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_STORE_REGION)]
    pub s3_region: String,

    /// S3-compatible endpoint (path-style)
    #[arg(long, env = "SIMPLE_IN_OUT_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Simple In/Out service root
    #[arg(long, env = "SIMPLE_IN_OUT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT)]
    pub http_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Log line format on stderr
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Obtain tokens with the password grant
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Obtain tokens with an authorization code, or from the credential store
    Authorize {
        #[arg(short, long)]
        code: Option<String>,
    },
    /// Refresh the current token pair
    Refresh,
    /// Verify the client is configured correctly
    Ok,
    /// Company information
    Company,
    /// Company geofences
    Fences,
    /// Company groups
    Groups,
    /// Current statuses of all users
    Statuses {
        /// Query parameter as key=value, repeatable
        #[arg(short, long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
    /// The authenticated user
    CurrentUser,
    /// A user by ID
    User { id: String },
    /// Status history of a user
    UserStatuses {
        id: String,
        /// MM/DD/YYYY, defaults to seven days ago
        #[arg(long)]
        start_date: Option<String>,
        /// MM/DD/YYYY, defaults to today
        #[arg(long)]
        end_date: Option<String>,
    },
}

impl CliArgs {
    /// Parse CLI arguments after loading `.env`, so CLI > ENV > defaults
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            store_access_key: self.aws_access_key_id.clone(),
            store_secret_key: self.aws_secret_access_key.clone(),
            store_bucket: self.s3_bucket.clone(),
            store_object_key: self.s3_key.clone(),
            store_region: Some(self.s3_region.clone()),
            store_endpoint: self.s3_endpoint.clone(),
            base_url: Some(self.base_url.clone()),
            request_timeout: Some(self.http_timeout),
        }
    }
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Status history window ending `today`, formatted as the API expects
pub fn default_date_range(today: NaiveDate) -> (String, String) {
    let start = today - Duration::days(7);
    (
        start.format("%m/%d/%Y").to_string(),
        today.format("%m/%d/%Y").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ClientOptions {
        ClientOptions {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_client_id() {
        let err = ClientConfig::from_options(ClientOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter("client_id")));
        assert_eq!(err.to_string(), "Missing required parameter 'client_id'");
    }

    #[test]
    fn test_requires_client_secret() {
        let err = ClientConfig::from_options(ClientOptions {
            client_id: Some("id".to_string()),
            client_secret: Some(String::new()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("client_secret")));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_options(options()).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.store.is_none());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_store_all_or_nothing() {
        let err = ClientConfig::from_options(ClientOptions {
            store_bucket: Some("bucket".to_string()),
            ..options()
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("store_access_key")));

        let err = ClientConfig::from_options(ClientOptions {
            store_access_key: Some("AKID".to_string()),
            store_secret_key: Some("secret".to_string()),
            store_bucket: Some("bucket".to_string()),
            ..options()
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingParameter("store_object_key")));
    }

    #[test]
    fn test_store_complete() {
        let config = ClientConfig::from_options(ClientOptions {
            store_access_key: Some("AKID".to_string()),
            store_secret_key: Some("secret".to_string()),
            store_bucket: Some("bucket".to_string()),
            store_object_key: Some("creds.json".to_string()),
            ..options()
        })
        .unwrap();
        let store = config.store.unwrap();
        assert_eq!(store.location.bucket, "bucket");
        assert_eq!(store.location.key, "creds.json");
        assert_eq!(store.location.region, DEFAULT_STORE_REGION);
        assert_eq!(store.location.endpoint, None);
    }

    #[test]
    fn test_region_alone_does_not_enable_store() {
        let config = ClientConfig::from_options(ClientOptions {
            store_region: Some("eu-west-1".to_string()),
            ..options()
        })
        .unwrap();
        assert!(config.store.is_none());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("start_date=01/02/2024").unwrap(),
            ("start_date".to_string(), "01/02/2024".to_string())
        );
        assert_eq!(
            parse_key_value("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_default_date_range() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let (start, end) = default_date_range(today);
        assert_eq!(start, "02/27/2024");
        assert_eq!(end, "03/05/2024");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let args = CliArgs::try_parse_from([
            "simpleinout",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
            "statuses",
            "-q",
            "group_id=4",
            "--query",
            "page=2",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Statuses {
                query: vec![
                    ("group_id".to_string(), "4".to_string()),
                    ("page".to_string(), "2".to_string()),
                ]
            }
        );

        let options = args.client_options();
        assert_eq!(options.client_id.as_deref(), Some("id"));
        assert_eq!(options.request_timeout, Some(args.http_timeout));
    }

    #[test]
    fn test_cli_user_statuses() {
        let args = CliArgs::try_parse_from([
            "simpleinout",
            "user-statuses",
            "42",
            "--start-date",
            "01/01/2024",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::UserStatuses {
                id: "42".to_string(),
                start_date: Some("01/01/2024".to_string()),
                end_date: None,
            }
        );
    }

    #[test]
    fn test_cli_log_format() {
        let args = CliArgs::try_parse_from(["simpleinout", "--log-format", "json", "ok"]).unwrap();
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.command, Command::Ok);

        assert!(CliArgs::try_parse_from(["simpleinout", "--log-format", "xml", "ok"]).is_err());
    }
}
