pub mod audio;
pub mod channel;
pub mod config;
mod engine;
pub mod factory;
pub mod file;
pub mod flags;
pub mod logging;
pub mod message;
pub mod mutex;
pub mod plugin;
pub mod recall;
mod routing;
pub mod soundcard;
pub mod state;
pub mod traverse;

use std::sync::Arc;
use tokio::sync::mpsc::{Sender, channel};
use tokio::task::JoinHandle;

pub fn init(config: config::EngineConfig) -> (Sender<message::Message>, JoinHandle<()>) {
    init_with_plugins(config, plugin::PluginManagers::new())
}

/// Starts the engine with the plugin registries the factory consults.
pub fn init_with_plugins(
    config: config::EngineConfig,
    plugins: plugin::PluginManagers,
) -> (Sender<message::Message>, JoinHandle<()>) {
    let (tx, rx) = channel::<message::Message>(32);
    let factory = factory::RecallFactory::new(Arc::new(plugins));
    let mut engine = engine::Engine::new(rx, config, factory);
    let handle = tokio::spawn(async move {
        engine.work().await;
    });
    (tx, handle)
}
