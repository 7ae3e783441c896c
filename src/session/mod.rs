pub mod id;
pub mod store;

pub use id::generate_session_id;
pub use store::{
    list_saved_sessions, load_meta, load_snapshot, save_snapshot, validate_session_id,
    ConversationMeta, ConversationSnapshot, SNAPSHOT_VERSION,
};
