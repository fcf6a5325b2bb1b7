//! Document-creation trigger: turns hire-request inserts into handler calls.

pub mod change_stream;

pub use change_stream::{decode_insert, request_id_from_key, ChangeStreamTrigger, TriggerError};
