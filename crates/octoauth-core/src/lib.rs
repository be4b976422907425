pub mod error;
pub mod id;
pub mod time;

pub use error::{CoreError, Result};
pub use id::{ID_BYTES, SECRET_BYTES, generate_id, generate_secret, generate_token, is_valid_client_id};
pub use time::{Timestamp, now_utc};
