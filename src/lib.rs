pub mod app;
pub mod audio;
pub mod config;
pub mod logging;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod terminal;
pub mod visual;
