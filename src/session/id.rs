use rand::{distributions::Alphanumeric, Rng};

pub fn generate_session_id() -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    let random_part: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();

    format!("chat_{}_{}", timestamp, random_part.to_lowercase())
}
