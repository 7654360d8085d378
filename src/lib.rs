pub mod app;
pub mod browser;
pub mod config;
pub mod credentials;
pub mod simplifi;
