pub mod balance;
pub mod chains;
pub mod config;
pub mod daemon;
pub mod drivers;
pub mod error;
pub mod intent;
pub mod interfaces;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod services;
pub mod split;
pub mod strategy;
pub mod tool_selector;
pub mod tools;
pub mod units;

pub type Result<T> = std::result::Result<T, error::DefierError>;

pub const BUILD_SHA: &str = env!("DEFIER_GIT_SHA");
