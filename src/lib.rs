pub mod command;
pub mod config;
pub mod console;
pub mod messages;
pub mod radio;
pub mod runtime;
pub mod smoother;
pub mod state;
