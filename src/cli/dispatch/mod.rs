//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its signing configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the signing key cannot be read.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let auth_opts = auth::Options::parse(matches)?;
    let signing_key = resolve_signing_key(&auth_opts.signing_key)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        issuer: auth_opts.issuer,
        audience: auth_opts.audience,
        kid: auth_opts.kid,
        signing_key,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        allow_origin: auth_opts.allow_origin,
    }))
}

// The flag may hold inline PEM or a path to a PEM file.
fn resolve_signing_key(value: &str) -> Result<SecretString> {
    let trimmed = value.trim();
    if trimmed.starts_with("-----BEGIN") {
        return Ok(SecretString::from(trimmed.to_string()));
    }

    let pem = std::fs::read_to_string(trimmed)
        .with_context(|| format!("Failed to read signing key file: {trimmed}"))?;
    Ok(SecretString::from(pem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn signing_key_must_not_be_blank() {
        // A whitespace env value satisfies clap's required check but not Options::parse
        temp_env::with_vars(
            [("GARDI_SIGNING_KEY", Some(" ")), ("GARDI_DSN", None::<&str>)],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["gardi"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --signing-key")
                    );
                }
            },
        );
    }

    #[test]
    fn inline_pem_is_accepted() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("GARDI_SIGNING_KEY", None::<&str>),
                ("GARDI_DSN", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "gardi",
                    "--signing-key",
                    crate::token::test_keys::RSA_PRIVATE_KEY_PEM,
                ]);

                let action = handler(&matches)?;
                match action {
                    Action::Server(args) => {
                        assert_eq!(args.port, 8080);
                        assert_eq!(args.dsn, None);
                        assert!(
                            args.signing_key
                                .expose_secret()
                                .starts_with("-----BEGIN")
                        );
                    }
                }
                Ok(())
            },
        )
    }

    #[test]
    fn signing_key_file_is_read() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!(
            "gardi-signing-{}.pem",
            ulid::Ulid::new().to_string().to_lowercase()
        ));
        std::fs::write(&path, crate::token::test_keys::RSA_PRIVATE_KEY_PEM)?;

        let secret = resolve_signing_key(&path.to_string_lossy())?;
        assert!(secret.expose_secret().contains("PRIVATE KEY"));

        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn missing_signing_key_file_is_an_error() {
        let result = resolve_signing_key("/nonexistent/gardi-signing.pem");
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("Failed to read signing key file"));
        }
    }
}
