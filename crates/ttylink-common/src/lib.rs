pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::RelayError;
pub use id::SessionId;
pub use protocol::{Message, ERR_DEVICE_OFFLINE, ERR_ID_CONFLICT};

pub type Result<T> = std::result::Result<T, RelayError>;
