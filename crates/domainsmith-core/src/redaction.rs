use serde::{Deserialize, Serialize};

/// Connection string with credentials masked, plus the parts safe to log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactedConnection {
    pub engine: Option<String>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Mask the password and sensitive query parameters of a database URL.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let Some((scheme, rest)) = conn.split_once("://") else {
        return RedactedConnection {
            engine: None,
            host: None,
            database: None,
            redacted: mask_query(conn),
        };
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let (credentials, host_port) = match authority.rsplit_once('@') {
        Some((credentials, host_port)) => (Some(credentials), host_port),
        None => (None, authority),
    };

    let masked_credentials = credentials.map(|credentials| match credentials.split_once(':') {
        Some((user, _)) => format!("{user}:***@"),
        None => format!("{credentials}@"),
    });

    let host = host_port
        .split(':')
        .next()
        .filter(|host| !host.is_empty())
        .map(str::to_string);
    let database = path
        .trim_start_matches('/')
        .split('?')
        .next()
        .filter(|db| !db.is_empty())
        .map(str::to_string);

    let redacted = format!(
        "{scheme}://{}{host_port}{}",
        masked_credentials.unwrap_or_default(),
        mask_query(path)
    );

    RedactedConnection {
        engine: Some(scheme.to_string()),
        host,
        database,
        redacted,
    }
}

fn mask_query(value: &str) -> String {
    let Some((base, query)) = value.split_once('?') else {
        return value.to_string();
    };

    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{base}?{}", params.join("&"))
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "password" | "pass" | "token" | "sslpassword"
    )
}
