use env_logger::Builder;
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

/// `verbosity` counts `-v` flags: warn, info, debug, then trace.
/// RUST_LOG still overrides whatever the flags select.
pub fn init(verbosity: u8) {
    INIT.call_once_force(|_| {
        let level = match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        let mut builder = Builder::new();
        builder
            .filter_level(level)
            .format_timestamp(None)
            .format_target(false)
            .parse_default_env();

        let _ = builder.try_init();
    });
}

#[cfg(test)]
mod tests {
    use log::{debug, info};

    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init(2);
        init(0);
        debug!("debug message in test");
        info!("info message in test");
    }
}
