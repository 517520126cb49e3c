use serenity::all::{
    Colour, CommandDataOptionValue, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateEmbed, GuildId, Permissions, RoleId,
};
use serenity::builder::EditInteractionResponse;

use crate::db::repo;
use crate::handlers::{config_from_ctx, pool_from_ctx};
use crate::utils::is_admin;

pub fn role_command() -> CreateCommand {
    CreateCommand::new("role")
        .description("get information on a role")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Role, "role", "role to get description of")
                .required(true),
        )
}

pub fn role_edit_command() -> CreateCommand {
    CreateCommand::new("role_edit")
        .description("set the description shown for a role")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(CommandOptionType::Role, "role", "role to describe").required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "description", "the new description")
                .required(true),
        )
}

fn role_option(cmd: &CommandInteraction) -> Option<RoleId> {
    for o in &cmd.data.options {
        if o.name == "role" {
            if let CommandDataOptionValue::Role(rid) = &o.value {
                return Some(*rid);
            }
        }
    }
    None
}

pub async fn handle_role(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    if config.hide_messages() {
        cmd.defer_ephemeral(&ctx.http).await?;
    } else {
        cmd.defer(&ctx.http).await?;
    }

    let Some(role_id) = role_option(cmd) else {
        return Ok(());
    };

    let pool = pool_from_ctx(ctx).await?;
    let Some(role_data) = repo::get_role(&pool, role_id.get() as i64).await? else {
        // role events keep the table in sync, so this is unexpected
        tracing::error!(role = role_id.get(), "role info returned no row");
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .content("Sorry there was an unexpected error processing your request."),
        )
        .await?;
        return Ok(());
    };

    // live name/colour when the role still exists, stored values otherwise
    let roles = GuildId::new(config.guild_id).roles(&ctx.http).await?;
    let (name, colour) = match roles.get(&role_id) {
        Some(live) => (live.name.clone(), live.colour),
        None => (role_data.name.clone(), Colour::new(role_data.color as u32)),
    };

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().embed(
            CreateEmbed::new()
                .title(name)
                .colour(colour)
                .description(role_data.description),
        ),
    )
    .await?;
    Ok(())
}

pub async fn handle_role_edit(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    cmd.defer_ephemeral(&ctx.http).await?;

    let invoker_is_admin = cmd
        .member
        .as_ref()
        .map(|m| is_admin(&m.roles, config.admin_role_id))
        .unwrap_or(false);
    if !invoker_is_admin {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("Only admins can use this."),
        )
        .await?;
        return Ok(());
    }

    let Some(role_id) = role_option(cmd) else {
        return Ok(());
    };
    let mut description = String::new();
    for o in &cmd.data.options {
        if o.name == "description" {
            if let CommandDataOptionValue::String(s) = &o.value {
                description = s.clone();
            }
        }
    }

    let roles = GuildId::new(config.guild_id).roles(&ctx.http).await?;
    let Some(role) = roles.get(&role_id) else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("Role not found on this server."),
        )
        .await?;
        return Ok(());
    };

    let pool = pool_from_ctx(ctx).await?;
    repo::sync_role(&pool, role_id.get() as i64, &role.name, role.colour.0 as i32).await?;
    repo::set_role_description(&pool, role_id.get() as i64, &description).await?;

    tracing::info!(role = role_id.get(), admin = cmd.user.id.get(), "role description updated");
    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().content(format!("Updated description for **{}**.", role.name)),
    )
    .await?;
    Ok(())
}
