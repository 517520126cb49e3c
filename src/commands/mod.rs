pub mod account;
pub mod admin;
pub mod birthday;
pub mod role_info;
pub mod status;

use serenity::all::{CommandInteraction, Context, GuildId};

use crate::config::Config;

pub async fn register_commands(ctx: &Context, config: &Config) -> anyhow::Result<()> {
    GuildId::new(config.guild_id)
        .set_commands(
            &ctx.http,
            vec![
                account::command(),
                admin::command(),
                role_info::role_command(),
                role_info::role_edit_command(),
                birthday::command(),
                status::command(),
            ],
        )
        .await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    match cmd.data.name.as_str() {
        "twitch" => account::handle(ctx, cmd).await,
        "admin" => admin::handle(ctx, cmd).await,
        "role" => role_info::handle_role(ctx, cmd).await,
        "role_edit" => role_info::handle_role_edit(ctx, cmd).await,
        "birthday" => birthday::handle(ctx, cmd).await,
        "status" => status::handle(ctx, cmd).await,
        _ => Ok(()),
    }
}
