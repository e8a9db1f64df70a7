use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes `env_logger` once. `RUST_LOG` wins when set, otherwise the
/// tutorials log at `info`.
pub fn init() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match std::env::var("RUST_LOG") {
            Ok(filter) => {
                builder.parse_filters(&filter);
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        builder.init();
        log::debug!("logging initialized");
    });
}
