//! Connection string parsing
//!
//! Accepts the URL and libpq key/value forms understood by tokio-postgres,
//! plus the semicolon-separated ADO.NET form used by Npgsql clients
//! (`Host=localhost;Port=5432;Database=app;Username=ro;Password=secret;`).

use std::time::Duration;

use tokio_postgres::config::SslMode;
use tokio_postgres::Config;

use crate::types::DriverError;

/// Parse any supported connection string form into a driver config
pub fn parse(input: &str) -> Result<Config, DriverError> {
    let trimmed = input.trim();

    let is_url = trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://");
    if is_url || !trimmed.contains(';') {
        return trimmed
            .parse::<Config>()
            .map_err(|e| DriverError::InvalidConnectionString(e.to_string()));
    }

    parse_ado(trimmed)
}

fn parse_ado(input: &str) -> Result<Config, DriverError> {
    let mut config = Config::new();

    for pair in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            DriverError::InvalidConnectionString(format!("expected key=value, got '{}'", pair))
        })?;

        // "User Id", "UserId" and "userid" are the same key
        let key: String = key
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "host" | "server" => {
                for host in value.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                    config.host(host);
                }
            }
            "port" => {
                config.port(parse_number(&key, value)?);
            }
            "database" | "db" => {
                config.dbname(value);
            }
            "username" | "userid" | "user" | "uid" => {
                config.user(value);
            }
            "password" | "pwd" => {
                config.password(value);
            }
            "timeout" => {
                config.connect_timeout(Duration::from_secs(parse_number(&key, value)?));
            }
            "applicationname" => {
                config.application_name(value);
            }
            "sslmode" => {
                config.ssl_mode(parse_ssl_mode(value)?);
            }
            other => {
                tracing::debug!(key = other, "Ignoring unsupported connection string key");
            }
        }
    }

    Ok(config)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DriverError> {
    value.parse().map_err(|_| {
        DriverError::InvalidConnectionString(format!("invalid value for {}: '{}'", key, value))
    })
}

fn parse_ssl_mode(value: &str) -> Result<SslMode, DriverError> {
    match value.to_ascii_lowercase().as_str() {
        "disable" => Ok(SslMode::Disable),
        "allow" | "prefer" => Ok(SslMode::Prefer),
        "require" | "verifyca" | "verify-ca" | "verifyfull" | "verify-full" => Ok(SslMode::Require),
        _ => Err(DriverError::InvalidConnectionString(format!(
            "invalid value for sslmode: '{}'",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_postgres::config::Host;

    fn tcp_hosts(config: &Config) -> Vec<String> {
        config
            .get_hosts()
            .iter()
            .filter_map(|h| match h {
                Host::Tcp(name) => Some(name.clone()),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_ado_style() {
        let config = parse(
            "Host=db.internal;Port=6543;Database=sales;Username=reader;Password=s3cret;SslMode=Disable;",
        )
        .unwrap();

        assert_eq!(tcp_hosts(&config), vec!["db.internal".to_string()]);
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(config.get_dbname(), Some("sales"));
        assert_eq!(config.get_user(), Some("reader"));
        assert_eq!(config.get_password(), Some(&b"s3cret"[..]));
        assert_eq!(config.get_ssl_mode(), SslMode::Disable);
    }

    #[test]
    fn test_ado_keys_are_case_and_space_insensitive() {
        let config = parse("SERVER = a, b ; User Id=app; pwd=x; Timeout=7; Application Name=reports").unwrap();

        assert_eq!(tcp_hosts(&config), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(7)));
        assert_eq!(config.get_application_name(), Some("reports"));
    }

    #[test]
    fn test_ado_allow_maps_to_prefer() {
        let config = parse("Host=localhost;SslMode=Allow;").unwrap();
        assert_eq!(config.get_ssl_mode(), SslMode::Prefer);
    }

    #[test]
    fn test_ado_unknown_keys_ignored() {
        let config = parse("Host=localhost;Pooling=false;Command Timeout=30;").unwrap();
        assert_eq!(tcp_hosts(&config), vec!["localhost".to_string()]);
    }

    #[test]
    fn test_ado_rejects_bad_values() {
        assert!(matches!(
            parse("Host=localhost;Port=abc;"),
            Err(DriverError::InvalidConnectionString(_))
        ));
        assert!(matches!(
            parse("Host=localhost;garbage;"),
            Err(DriverError::InvalidConnectionString(_))
        ));
        assert!(matches!(
            parse("Host=localhost;SslMode=sometimes;"),
            Err(DriverError::InvalidConnectionString(_))
        ));
    }

    #[test]
    fn test_url_form() {
        let config = parse("postgres://reader:pw@localhost:5433/sales").unwrap();
        assert_eq!(tcp_hosts(&config), vec!["localhost".to_string()]);
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_dbname(), Some("sales"));
        assert_eq!(config.get_user(), Some("reader"));
    }

    #[test]
    fn test_key_value_form() {
        let config = parse("host=localhost user=reader dbname=sales").unwrap();
        assert_eq!(config.get_dbname(), Some("sales"));
        assert_eq!(config.get_user(), Some("reader"));

        assert!(parse("host=localhost port=notanumber").is_err());
    }
}
