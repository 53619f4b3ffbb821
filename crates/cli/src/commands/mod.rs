pub mod config_cmd;
pub mod prompt;
pub mod script;
pub mod serve;
