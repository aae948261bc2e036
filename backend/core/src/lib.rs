pub mod error;
pub mod event;
pub mod message;
pub mod traits;
pub mod types;

pub use error::{AuthError, EchoError, Result};
pub use event::InboundEvent;
pub use message::ReplyMessage;
pub use traits::MessagingApi;
pub use types::{Profile, StoredMedia, UserRecord, UserTable, UNKNOWN_DISPLAY_NAME};
