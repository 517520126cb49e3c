use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, GuildId, Permissions, UserId,
};
use serenity::builder::EditInteractionResponse;

use crate::confirm::{self, ConfirmAction};
use crate::db::repo;
use crate::handlers::{config_from_ctx, pool_from_ctx};
use crate::ui::{embeds, paginator};
use crate::utils::{from_user_id, is_admin, mention_user};

pub fn command() -> CreateCommand {
    CreateCommand::new("admin")
        .description("commands for interacting with our account system using your admin powers!")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "view", "view somebodies db entry.")
                .add_sub_option(CreateCommandOption::new(
                    CommandOptionType::User,
                    "discord",
                    "discord member",
                ))
                .add_sub_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "twitch",
                    "twitch name",
                )),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "view_all",
            "view all database entries.",
        ))
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "delete",
                "delete somebody elses database entry.",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "the user to delete the entry of")
                    .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "transfer",
                "transfer somebodys twitch name to another discord account.",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::User, "from_user", "current account owner.")
                    .required(true),
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::User, "to_user", "new account owner.")
                    .required(true),
            ),
        )
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    if config.hide_messages() {
        cmd.defer_ephemeral(&ctx.http).await?;
    } else {
        cmd.defer(&ctx.http).await?;
    }

    // registration already gates on guild permissions; re-check the actual
    // admin role at dispatch like every other privileged path
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

    let Some(sub) = cmd.data.options.first() else {
        return Ok(());
    };
    match (sub.name.as_str(), &sub.value) {
        ("view", CommandDataOptionValue::SubCommand(opts)) => {
            let mut discord: Option<UserId> = None;
            let mut twitch: Option<String> = None;
            for o in opts {
                match o.name.as_str() {
                    "discord" => {
                        if let CommandDataOptionValue::User(u) = &o.value {
                            discord = Some(*u);
                        }
                    }
                    "twitch" => {
                        if let CommandDataOptionValue::String(s) = &o.value {
                            twitch = Some(s.clone());
                        }
                    }
                    _ => {}
                }
            }
            handle_view(ctx, cmd, discord, twitch).await
        }
        ("view_all", _) => handle_view_all(ctx, cmd).await,
        ("delete", CommandDataOptionValue::SubCommand(opts)) => {
            let mut user: Option<UserId> = None;
            for o in opts {
                if o.name == "user" {
                    if let CommandDataOptionValue::User(u) = &o.value {
                        user = Some(*u);
                    }
                }
            }
            handle_delete(ctx, cmd, user).await
        }
        ("transfer", CommandDataOptionValue::SubCommand(opts)) => {
            let mut from_user: Option<UserId> = None;
            let mut to_user: Option<UserId> = None;
            for o in opts {
                match o.name.as_str() {
                    "from_user" => {
                        if let CommandDataOptionValue::User(u) = &o.value {
                            from_user = Some(*u);
                        }
                    }
                    "to_user" => {
                        if let CommandDataOptionValue::User(u) = &o.value {
                            to_user = Some(*u);
                        }
                    }
                    _ => {}
                }
            }
            handle_transfer(ctx, cmd, from_user, to_user).await
        }
        _ => Ok(()),
    }
}

async fn handle_view(
    ctx: &Context,
    cmd: &CommandInteraction,
    discord: Option<UserId>,
    twitch: Option<String>,
) -> anyhow::Result<()> {
    if discord.is_some() == twitch.is_some() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("Please only provide one of `twitch` or `discord`"),
        )
        .await?;
        return Ok(());
    }

    let pool = pool_from_ctx(ctx).await?;
    let account = match (discord, twitch) {
        (Some(user), None) => repo::find_by_discord_id(&pool, from_user_id(user)).await?,
        (None, Some(name)) => repo::find_by_twitch_name(&pool, &name).await?,
        _ => unreachable!(),
    };

    let response = match account {
        None => EditInteractionResponse::new().embed(embeds::account_not_found()),
        Some(account) => EditInteractionResponse::new().embed(embeds::account_embed(&account)),
    };
    cmd.edit_response(&ctx.http, response).await?;
    Ok(())
}

async fn handle_view_all(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let pool = pool_from_ctx(ctx).await?;
    let accounts = repo::all_accounts(&pool).await?;

    if accounts.is_empty() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("No accounts registered yet."),
        )
        .await?;
        return Ok(());
    }

    let pages = accounts.iter().map(embeds::account_embed).collect();
    paginator::start(ctx, cmd, pages).await
}

async fn handle_delete(
    ctx: &Context,
    cmd: &CommandInteraction,
    user: Option<UserId>,
) -> anyhow::Result<()> {
    let Some(user) = user else {
        cmd.edit_response(&ctx.http, EditInteractionResponse::new().content("Missing user."))
            .await?;
        return Ok(());
    };

    let pool = pool_from_ctx(ctx).await?;
    match repo::find_by_discord_id(&pool, from_user_id(user)).await? {
        None => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(embeds::account_not_found()),
            )
            .await?;
        }
        Some(account) => {
            tracing::info!(admin = cmd.user.id.get(), target = user.get(), "delete prompt");
            super::account::delete_prompt(ctx, cmd, &account).await?;
        }
    }
    Ok(())
}

async fn handle_transfer(
    ctx: &Context,
    cmd: &CommandInteraction,
    from_user: Option<UserId>,
    to_user: Option<UserId>,
) -> anyhow::Result<()> {
    let (Some(from_user), Some(to_user)) = (from_user, to_user) else {
        cmd.edit_response(&ctx.http, EditInteractionResponse::new().content("Missing user."))
            .await?;
        return Ok(());
    };

    let config = config_from_ctx(ctx).await?;
    let pool = pool_from_ctx(ctx).await?;

    let Some(account) = repo::find_by_discord_id(&pool, from_user_id(from_user)).await? else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::account_not_found()),
        )
        .await?;
        return Ok(());
    };

    // the target may not already own a record: discord_id is unique
    if repo::find_by_discord_id(&pool, from_user_id(to_user)).await?.is_some() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::error_embed(
                "Can not transfer.",
                format!(
                    "{} already has a registered account; delete it first.",
                    mention_user(from_user_id(to_user))
                ),
            )),
        )
        .await?;
        return Ok(());
    }

    let to_member = GuildId::new(config.guild_id).member(&ctx.http, to_user).await?;
    let embed = embeds::account_embed(&account).description(format!(
        "You are about to transfer \"ownership\" of `{}` to {} (original owner {}), \
         points will not be affected, admin status will be updated if needed",
        account.twitch_name,
        mention_user(from_user_id(to_user)),
        mention_user(from_user_id(from_user)),
    ));

    confirm::prompt(
        ctx,
        cmd,
        format!("Transfer to {}", to_member.user.tag()),
        embed,
        crate::ui::menus::danger_confirm_button(),
        crate::ui::menus::primary_cancel_button(),
        ConfirmAction::TransferAccount {
            record_id: account.id,
            discord_id: from_user_id(to_user),
            discord_name: to_member.user.tag(),
            is_admin: is_admin(&to_member.roles, config.admin_role_id),
        },
    )
    .await
}
