mod audio;
mod catalog;
mod chatters;
mod commands;
mod config;
mod dispatch;
mod points;
mod tts;
mod twitch;

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

use catalog::AudioCatalog;
use commands::CommandRouter;
use config::{BotConfig, Credentials};
use dispatch::{EventDispatcher, RewardAudioMap};
use points::PointsStore;
use twitch::messages::BotEvent;
use twitch::{EventSubConnection, HelixClient};

const CONFIG_PATH: &str = "config.json";
const POINTS_PATH: &str = "points.json";

#[tokio::main]
async fn main() {
    env_logger::init();

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let config = BotConfig::load(CONFIG_PATH);

    // Best effort: a stale access token still might work for a while
    if let Err(e) = twitch::auth::refresh_access_token(&credentials).await {
        warn!("Token refresh failed, continuing with current token: {}", e);
    }

    let player = audio::spawn_playback_thread();
    let points = Arc::new(Mutex::new(PointsStore::load(POINTS_PATH)));

    let audio_root = PathBuf::from(&config.audio_paths.base_directory);
    let catalog = AudioCatalog::scan(&audio_root);
    info!("{} sounds indexed from {}", catalog.len(), audio_root.display());
    let catalog = Arc::new(RwLock::new(catalog));

    let helix = match HelixClient::new(credentials.clone()) {
        Ok(helix) => helix,
        Err(e) => {
            error!("Failed to build API client: {}", e);
            std::process::exit(1);
        }
    };

    let chatters_task = tokio::spawn(chatters::run(helix.clone(), points.clone()));

    let volume = config.bot_settings.audio_volume;
    let dispatcher = EventDispatcher::new(
        RewardAudioMap::from_config(&config),
        player.clone(),
        volume,
    );
    let router = CommandRouter::new(
        config.bot_settings.command_prefix.clone(),
        helix,
        points.clone(),
        catalog,
        player,
        volume,
        audio_root,
    );

    let (event_tx, mut event_rx) = mpsc::channel::<BotEvent>(100);
    let mut connection = match EventSubConnection::new(credentials, &config.bot_settings) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to build event connection: {}", e);
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        if let Err(e) = connection.run(event_tx).await {
            error!(
                "Event subscription permanently failed, redemption audio is offline: {}",
                e
            );
        }
    });

    info!("Bot online in channel {}", config.bot_settings.channel);

    while let Some(event) = event_rx.recv().await {
        match event {
            BotEvent::ChatMessage(message) => router.handle(&message).await,
            BotEvent::RewardRedeemed(redemption) => {
                dispatcher.dispatch(&redemption);
            }
        }
    }

    // The event feed is gone for good; watch-time points keep accruing.
    info!("Event feed ended, points loop continues");
    let _ = chatters_task.await;
}
