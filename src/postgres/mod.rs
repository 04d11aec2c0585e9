// PostgreSQL plumbing behind the pool:
// - manager: bb8 connection manager over tokio-postgres clients
// - params: argument typing and encoding
// - numeric: binary numeric codec
// - binary: interval, inet, timetz, bit and record payloads
// - query: column decoding into RowValues
// - executor: exec/query against a checked-out connection

pub(crate) mod binary;
pub mod executor;
pub mod manager;
pub(crate) mod numeric;
pub mod params;
pub mod query;

pub use executor::{exec, query};
pub use manager::{ConnectErrorSink, PgConnection, PgManager};
pub use params::typed_params;
pub use query::postgres_extract_value;
