//! Received-image storage and the upload file server.

pub mod media_server;
pub mod media_store;
pub mod mime_detect;

pub use media_server::uploads_router;
pub use media_store::{generate_filename, MediaStore};
pub use mime_detect::{detect_mime_type, is_inline_safe, sniff_image_mime};
