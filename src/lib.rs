#![deny(clippy::all)]

pub mod config;
mod cons;
pub mod error;
mod llm;
pub mod session;


pub use cons::provider_cons::{ProviderKind, ALL_PROVIDER_KINDS};
pub use error::{ChatError, ChatResult};
pub use llm::chat::coordinator::ChatCoordinator;
pub use llm::chat::transcript::{reduce, Role, TokenUsage, Transcript, Turn};
pub use llm::models::provider_base::{ChatResponse, GenerationParams, ProviderClient, ResponseChunk};
pub use llm::models::provider_handle::{AnyProviderClient, ProviderClientFactory, ProviderListing};

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        use log::LevelFilter;
        use log4rs::append::file::FileAppender;
        use log4rs::config::{Appender, Config, Root};
        use log4rs::encode::pattern::PatternEncoder;

        // A log4rs config file takes precedence over the built-in setup.
        let config_path =
            std::env::var("LOG4RS_CONFIG").unwrap_or_else(|_| "log4rs.yaml".to_string());
        let _ = std::fs::create_dir_all("logs");
        if log4rs::init_file(config_path.clone(), Default::default()).is_ok() {
            log::info!("logger initialized from {}", config_path);
            return;
        }

        let pattern = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {t} - {m}\n";

        let logfile = match FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(pattern)))
            .build("logs/polychat.log")
        {
            Ok(f) => f,
            Err(e) => {
                eprintln!("failed to create log file: {}", e);
                return;
            }
        };

        let config = match Config::builder()
            .appender(Appender::builder().build("logfile", Box::new(logfile)))
            .build(Root::builder().appender("logfile").build(LevelFilter::Debug))
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to build logger config: {}", e);
                return;
            }
        };

        if let Err(e) = log4rs::init_config(config) {
            eprintln!("failed to initialize logger: {}", e);
        }
    });
}
