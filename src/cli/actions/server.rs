use crate::{api, api::handlers::auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub kid: String,
    pub signing_key: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub allow_origin: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key is rejected or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let auth_config = AuthConfig::new(args.issuer, args.audience, args.signing_key)
        .with_kid(args.kid)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds);

    api::new(args.port, args.dsn, auth_config, &args.allow_origin).await
}

fn log_startup_args(args: &Args) {
    let backend = if args.dsn.is_some() {
        "postgres"
    } else {
        "memory"
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "none".to_string(), redact_dsn),
        ),
        ("issuer", args.issuer.clone()),
        ("audience", args.audience.clone()),
        ("kid", args.kid.clone()),
        ("access_ttl_seconds", args.access_ttl_seconds.to_string()),
        ("refresh_ttl_seconds", args.refresh_ttl_seconds.to_string()),
        ("allow_origin", args.allow_origin.clone()),
    ];
    log_entries("Startup configuration", &entries, backend);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)], backend: &str) {
    let backend_desc = if backend == "postgres" {
        "PostgreSQL"
    } else {
        "In-memory (ephemeral)"
    };
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\nStorage: {backend_desc}\n\n{title}:", gardi_banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn gardi_banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    GARDI_BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const GARDI_BANNER: &str = r"
  .-------------.
  | | | | | | | |
  |-+-+-+-+-+-+-|
  | | | | | | | |  G A R D I {VERSION}
  |-+-+-+-+-+-+-|
  | | | | | | | |
  '-------------'";
