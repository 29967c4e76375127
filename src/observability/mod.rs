pub mod logging;

pub use logging::{close_all_handlers, init_logging, DEFAULT_LOG_FILTER};
