use clap::{Arg, ArgMatches, Command};

pub const ARG_ISSUER: &str = "issuer";
pub const ARG_AUDIENCE: &str = "audience";
pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_KID: &str = "kid";
pub const ARG_ACCESS_TTL_SECONDS: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL_SECONDS: &str = "refresh-ttl-seconds";
pub const ARG_ALLOW_ORIGIN: &str = "allow-origin";

const DEFAULT_ISSUER: &str = "https://auth.gardi.dev";
const DEFAULT_AUDIENCE: &str = "gardi";
const DEFAULT_KID: &str = "k1";
const DEFAULT_ALLOW_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Options {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
    pub kid: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub allow_origin: String,
}

impl Options {
    /// Parse token issuance arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let signing_key = matches.get_one::<String>(ARG_SIGNING_KEY).cloned();
        let signing_key = match signing_key {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_SIGNING_KEY}"),
        };

        // Filter empty strings which clap might pass through if env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            issuer: get_non_empty(ARG_ISSUER).unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            audience: get_non_empty(ARG_AUDIENCE).unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            signing_key,
            kid: get_non_empty(ARG_KID).unwrap_or_else(|| DEFAULT_KID.to_string()),
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TTL_SECONDS)
                .copied()
                .unwrap_or(900),
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TTL_SECONDS)
                .copied()
                .unwrap_or(2_592_000),
            allow_origin: get_non_empty(ARG_ALLOW_ORIGIN)
                .unwrap_or_else(|| DEFAULT_ALLOW_ORIGIN.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_cors_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer (iss) stamped into access tokens")
                .env("GARDI_ISSUER")
                .default_value(DEFAULT_ISSUER),
        )
        .arg(
            Arg::new(ARG_AUDIENCE)
                .long(ARG_AUDIENCE)
                .help("Audience (aud) stamped into access tokens")
                .env("GARDI_AUDIENCE")
                .default_value(DEFAULT_AUDIENCE),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("RSA private key used to sign access tokens")
                .long_help(
                    "RSA private key used to sign access tokens. Accepts inline PEM or a path to a PEM file (PKCS#1 or PKCS#8).",
                )
                .env("GARDI_SIGNING_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_KID)
                .long(ARG_KID)
                .help("Key id (kid) published in token headers")
                .env("GARDI_KID")
                .default_value(DEFAULT_KID),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL_SECONDS)
                .long(ARG_ACCESS_TTL_SECONDS)
                .help("Access token TTL in seconds")
                .env("GARDI_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL_SECONDS)
                .long(ARG_REFRESH_TTL_SECONDS)
                .help("Refresh token TTL in seconds")
                .env("GARDI_REFRESH_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_cors_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_ALLOW_ORIGIN)
            .long(ARG_ALLOW_ORIGIN)
            .help("Origin allowed for browser requests (CORS)")
            .env("GARDI_ALLOW_ORIGIN")
            .default_value(DEFAULT_ALLOW_ORIGIN),
    )
}
