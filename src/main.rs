use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pgpool_middleware::config::parse_duration;
use pgpool_middleware::prelude::*;
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one statement through a bounded PostgreSQL pool")]
struct Args {
    /// Connection descriptor, URL or key/value form
    #[arg(long, env = "PGPOOL_URL")]
    url: String,
    #[arg(long, default_value_t = 0)]
    min_conns: i64,
    #[arg(long, default_value_t = 4)]
    max_conns: i64,
    /// Overall deadline, e.g. `5s` or `1m30s`
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a statement and print its command tag
    Exec {
        sql: String,
        /// Positional argument as a JSON scalar or array; repeat for `$2`, `$3`, ...
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Run a query and print the rows as a JSON array
    Query {
        sql: String,
        #[arg(long = "arg")]
        args: Vec<String>,
    },
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

/// `1` → Int, `1.5` → Float, `"x"` → Text, `true` → Bool, `null` → Null,
/// arrays element-wise, objects as JSON. Anything that is not JSON is text.
fn to_row_value(raw: &str) -> RowValues {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value) => json_to_row_value(value),
        Err(_) => RowValues::Text(raw.to_string()),
    }
}

fn json_to_row_value(value: JsonValue) -> RowValues {
    match value {
        JsonValue::Null => RowValues::Null,
        JsonValue::Bool(b) => RowValues::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => RowValues::Int(i),
            None => n.as_f64().map_or(RowValues::Numeric(n.to_string()), RowValues::Float),
        },
        JsonValue::String(s) => RowValues::Text(s),
        JsonValue::Array(items) => RowValues::Array(items.into_iter().map(json_to_row_value).collect()),
        object @ JsonValue::Object(_) => RowValues::Json(object),
    }
}

async fn run(ctx: &Context, args: Args) -> Result<String, PgPoolError> {
    let pool = api::open(ctx, &args.url, args.min_conns, args.max_conns).await?;
    let result = match args.command {
        Command::Exec { sql, args } => {
            let params: Vec<RowValues> = args.iter().map(|a| to_row_value(a)).collect();
            api::exec(ctx, &pool, &sql, &params)
                .await
                .map(|outcome| outcome.to_string())
        }
        Command::Query { sql, args } => {
            let params: Vec<RowValues> = args.iter().map(|a| to_row_value(a)).collect();
            api::query(ctx, &pool, &sql, &params).await.map(|records| {
                serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string())
            })
        }
    };
    pool.close();
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut ctx = Context::background();
    if let Some(timeout) = args.timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match run(&ctx, args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_parse_as_json_scalars() {
        assert_eq!(to_row_value("42"), RowValues::Int(42));
        assert_eq!(to_row_value("1.5"), RowValues::Float(1.5));
        assert_eq!(to_row_value("\"42\""), RowValues::Text("42".into()));
        assert_eq!(to_row_value("true"), RowValues::Bool(true));
        assert_eq!(to_row_value("null"), RowValues::Null);
        assert_eq!(to_row_value("plain words"), RowValues::Text("plain words".into()));
        assert_eq!(
            to_row_value("[1, 2]"),
            RowValues::Array(vec![RowValues::Int(1), RowValues::Int(2)])
        );
        assert_eq!(to_row_value(r#"{"a": 1}"#), RowValues::Json(json!({"a": 1})));
    }

    #[test]
    fn cli_shape() {
        let args = Args::try_parse_from([
            "pgpool", "--url", "postgres://localhost/db", "--timeout", "2s", "query", "SELECT $1", "--arg", "7",
        ])
        .unwrap();
        assert_eq!(args.timeout, Some(Duration::from_secs(2)));
        assert!(matches!(args.command, Command::Query { ref args, .. } if args == &["7".to_string()]));
    }
}
