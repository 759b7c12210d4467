pub mod alignment;
pub mod config;
pub mod director;
pub mod loader;
pub mod player;
pub mod presentation;
pub mod render;
pub mod save;
pub mod stage;
