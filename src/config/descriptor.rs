//! Splits pool-level options out of a connection descriptor so the remainder
//! can be handed to `tokio_postgres::Config` untouched.

use crate::error::PgPoolError;

/// Options consumed by the pool layer rather than the protocol layer.
pub(crate) const POOL_KEYS: &[&str] = &[
    "pool_min_conns",
    "pool_max_conns",
    "pool_max_conn_lifetime",
    "pool_max_conn_idle_time",
    "pool_health_check_period",
];

/// Execution-mode hints. Accepted for compatibility and dropped: the mode is fixed.
pub(crate) const EXEC_MODE_KEYS: &[&str] = &[
    "default_query_exec_mode",
    "statement_cache_capacity",
    "description_cache_capacity",
];

/// A descriptor with the pool options removed.
#[derive(Debug, Default)]
pub(crate) struct SplitDescriptor {
    /// What remains for the protocol layer.
    pub(crate) connection: String,
    /// Extracted pool options in source order.
    pub(crate) pool_options: Vec<(String, String)>,
    /// Names of execution-mode hints that were dropped.
    pub(crate) ignored: Vec<String>,
}

impl SplitDescriptor {
    fn route(&mut self, key: &str, value: String) -> bool {
        if POOL_KEYS.contains(&key) {
            self.pool_options.push((key.to_string(), value));
            true
        } else if EXEC_MODE_KEYS.contains(&key) {
            self.ignored.push(key.to_string());
            true
        } else {
            false
        }
    }
}

pub(crate) fn is_url(descriptor: &str) -> bool {
    descriptor.starts_with("postgres://") || descriptor.starts_with("postgresql://")
}

pub(crate) fn split(descriptor: &str) -> Result<SplitDescriptor, PgPoolError> {
    let descriptor = descriptor.trim();
    if is_url(descriptor) {
        Ok(split_url(descriptor))
    } else {
        split_key_values(descriptor)
    }
}

fn split_url(descriptor: &str) -> SplitDescriptor {
    let mut out = SplitDescriptor::default();
    let Some((base, query)) = descriptor.split_once('?') else {
        out.connection = descriptor.to_string();
        return out;
    };

    let mut kept: Vec<&str> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if !out.route(key, value.to_string()) {
            kept.push(pair);
        }
    }

    out.connection = if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    };
    out
}

fn split_key_values(descriptor: &str) -> Result<SplitDescriptor, PgPoolError> {
    let mut out = SplitDescriptor::default();
    let mut kept: Vec<String> = Vec::new();
    for (key, value) in parse_key_values(descriptor)? {
        if !out.route(&key, value.clone()) {
            kept.push(format!("{key}='{}'", escape_value(&value)));
        }
    }
    out.connection = kept.join(" ");
    Ok(out)
}

fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Tokenize libpq `key=value` pairs. Values may be single-quoted; a backslash
/// escapes the next character inside or outside quotes.
fn parse_key_values(input: &str) -> Result<Vec<(String, String)>, PgPoolError> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(PgPoolError::Parse(format!("missing `=` after `{key}`")));
        }
        if key.is_empty() {
            return Err(PgPoolError::Parse("empty option name".to_string()));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => break,
                    },
                    Some(c) => value.push(c),
                    None => {
                        return Err(PgPoolError::Parse(format!(
                            "unterminated quoted value for `{key}`"
                        )));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }
        pairs.push((key, value));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_pool_options_are_removed() {
        let out = split(
            "postgres://u:p@h:5433/db?sslmode=disable&pool_max_conns=9&default_query_exec_mode=cache_statement",
        )
        .unwrap();
        assert_eq!(out.connection, "postgres://u:p@h:5433/db?sslmode=disable");
        assert_eq!(
            out.pool_options,
            vec![("pool_max_conns".to_string(), "9".to_string())]
        );
        assert_eq!(out.ignored, vec!["default_query_exec_mode".to_string()]);
    }

    #[test]
    fn url_without_remaining_query_drops_question_mark() {
        let out = split("postgresql://h/db?pool_min_conns=1").unwrap();
        assert_eq!(out.connection, "postgresql://h/db");
    }

    #[test]
    fn key_value_quoting_survives_round_trip() {
        let out = split(r"host=db  password = 'it\'s secret' pool_min_conns=2 user=bob").unwrap();
        assert_eq!(
            out.connection,
            r"host='db' password='it\'s secret' user='bob'"
        );
        assert_eq!(
            out.pool_options,
            vec![("pool_min_conns".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn key_value_errors() {
        assert!(split("host").is_err());
        assert!(split("host='db").is_err());
        assert!(split("=db").is_err());
    }
}
