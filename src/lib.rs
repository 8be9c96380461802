pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod dropdown;
pub mod logging;
pub mod model;
pub mod noise;
pub mod player;
pub mod ui;
