pub mod bootstrap;
pub mod calls;
pub mod chat;
pub mod config;
pub mod contacts;
pub mod core_manager;
pub mod engine;
pub mod error;
pub mod image_provider;
pub mod instance;
pub mod network_utils;
pub mod paths;
pub mod settings;

#[cfg(feature = "desktop")]
pub mod components;
