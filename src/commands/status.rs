use once_cell::sync::OnceCell;
use serenity::all::{CommandInteraction, Context, CreateCommand, CreateEmbed};
use serenity::builder::EditInteractionResponse;

use crate::handlers::config_from_ctx;
use crate::ui::embeds::GREEN;

/// Unix timestamp recorded once in the ready handler.
pub static START_TIME: OnceCell<i64> = OnceCell::new();

pub fn command() -> CreateCommand {
    CreateCommand::new("status").description("Get the status of the bot.")
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    if config.hide_messages() {
        cmd.defer_ephemeral(&ctx.http).await?;
    } else {
        cmd.defer(&ctx.http).await?;
    }

    let started = START_TIME
        .get()
        .map(|ts| format!("<t:{ts}:R>"))
        .unwrap_or_else(|| "unknown".to_string());

    let embed = CreateEmbed::new()
        .colour(GREEN)
        .title("Bot status")
        .field("os", std::env::consts::OS, true)
        .field("version", env!("CARGO_PKG_VERSION"), true)
        .field("serenity", "0.12", true)
        .field("started", started, true);

    cmd.edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}
