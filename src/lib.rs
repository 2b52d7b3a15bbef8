pub use labtrack_cli::cli;
pub use labtrack_cli::commands;
pub use labtrack_cli::config;
pub use labtrack_cli::run;
pub use labtrack_cli::AppConfig;

pub use labtrack_core as core;
pub use labtrack_core::capture;
pub use labtrack_core::database as db;
pub use labtrack_core::model;
pub use labtrack_core::parser;
