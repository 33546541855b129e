//! Utility for testing.
use once_cell::sync::OnceCell;
use simplelog::{CombinedLogger, Config, LevelFilter, WriteLogger};

const DEBUG_MODE: bool = false;

static LOGGER: OnceCell<()> = OnceCell::new();

pub(crate) fn init_logger() {
    if DEBUG_MODE {
        LOGGER.get_or_init(|| {
            let _ = std::fs::create_dir_all("./test-output");
            let _ = CombinedLogger::init(vec![WriteLogger::new(
                LevelFilter::Debug,
                Config::default(),
                std::fs::File::create("./test-output/px-test.log").unwrap(),
            )]);
        });
    }
}
