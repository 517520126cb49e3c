mod commands;
mod config;
mod confirm;
mod db;
mod handlers;
mod tasks;
mod twitch;
mod ui;
mod utils;

use dotenvy::dotenv;
use serenity::all::{Client, GatewayIntents};

use crate::config::Config;
use crate::handlers::Handler;
use crate::twitch::TwitchClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    tracing::info!("connecting to db");
    let pool = db::init_pool(&config.database_url).await?;

    let twitch = TwitchClient::connect(
        config.twitch_client_id.clone(),
        config.twitch_client_secret.clone(),
    )
    .await?;

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES
        | GatewayIntents::GUILD_MESSAGES;
    let handler = Handler::new(pool, config.clone(), twitch);

    tracing::info!("starting bot");
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;

    client.start().await?;
    Ok(())
}
