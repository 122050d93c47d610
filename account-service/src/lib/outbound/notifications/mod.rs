pub mod logging;

pub use logging::LoggingLinkDispatcher;
