pub mod bootstrap;
pub mod health;
pub mod search;
pub mod upstream;
pub mod workbook;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
