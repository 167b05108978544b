pub mod sync;
pub mod upload;

pub use sync::handle_sync_command;
pub use upload::handle_upload_command;
