use crate::llm::chat::transcript::Turn;
use crate::session::store::*;
use std::env;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_session_id_allows_simple_ids() {
        assert!(validate_session_id("abc").is_ok());
        assert!(validate_session_id("abc-DEF_123").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../x").is_err());
        assert!(validate_session_id("a b").is_err());
    }

    #[test]
    fn generated_ids_validate() {
        let id = crate::session::generate_session_id();
        assert!(validate_session_id(&id).is_ok());
    }

    #[test]
    fn snapshot_roundtrip() {
        let original_home = env::var("HOME").ok();
        let tmp_home = tempfile::tempdir().expect("tempdir");
        env::set_var("HOME", tmp_home.path());

        assert!(load_snapshot("never_saved").unwrap().is_none());
        assert!(list_saved_sessions().unwrap().is_empty());

        let session_id = "test_session_1";
        let snapshot = ConversationSnapshot {
            version: SNAPSHOT_VERSION,
            session_id: session_id.to_string(),
            created_at_ms: 0,
            updated_at_ms: 0,
            provider: Some("Ollama".to_string()),
            title: None,
            turns: vec![Turn::system("be brief"), Turn::user("hello")],
        };
        save_snapshot(snapshot).unwrap();

        let loaded = load_snapshot(session_id).unwrap().unwrap();
        assert_eq!(loaded.session_id, session_id);
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.turns[1].content, "hello");
        assert_eq!(loaded.provider.as_deref(), Some("Ollama"));

        let meta = load_meta(session_id).unwrap().unwrap();
        assert_eq!(meta.turn_count, 2);

        let listed = list_saved_sessions().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, session_id);

        match original_home {
            Some(v) => env::set_var("HOME", v),
            None => env::remove_var("HOME"),
        }
    }
}
