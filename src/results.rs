//! Result shaping: column descriptors, name-keyed records, and command outcomes.

pub mod materialize;
pub mod outcome;
pub mod record;

pub use materialize::{DecodeRow, materialize, materialize_stream};
pub use outcome::CommandOutcome;
pub use record::{FieldDescriptor, Record};
