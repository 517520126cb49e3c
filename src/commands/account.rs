use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption, CreateEmbedFooter,
};
use serenity::builder::EditInteractionResponse;

use crate::confirm::{self, ConfirmAction};
use crate::db::models::LinkedAccount;
use crate::db::repo;
use crate::handlers::{config_from_ctx, pool_from_ctx, twitch_from_ctx};
use crate::twitch;
use crate::ui::{embeds, menus};
use crate::utils::{from_user_id, is_admin, mention_user};

pub fn command() -> CreateCommand {
    CreateCommand::new("twitch")
        .description("commands for interacting with our account system.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "register",
                "register a link between this discord account and your twitch account.",
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "username",
                    "Your twitch user name",
                )
                .required(true),
            ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "unregister",
            "remove your discord -> twitch link from our systems.",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "points",
            "check your points",
        ))
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    if config.hide_messages() {
        cmd.defer_ephemeral(&ctx.http).await?;
    } else {
        cmd.defer(&ctx.http).await?;
    }

    let Some(sub) = cmd.data.options.first() else {
        return Ok(());
    };
    match (sub.name.as_str(), &sub.value) {
        ("register", CommandDataOptionValue::SubCommand(opts)) => {
            let mut username = String::new();
            for o in opts {
                if o.name == "username" {
                    if let CommandDataOptionValue::String(s) = &o.value {
                        username = s.clone();
                    }
                }
            }
            handle_register(ctx, cmd, &username).await
        }
        ("unregister", _) => handle_unregister(ctx, cmd).await,
        ("points", _) => handle_points(ctx, cmd).await,
        _ => Ok(()),
    }
}

/// What /twitch register should do, decided purely from the two lookups.
/// Concurrent registrations stay last-write-wins at the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterPlan {
    CreateNew,
    LinkChat { record_id: i64 },
    AlreadyLinked,
    Conflict { owner: i64 },
    OverwriteExternal { record_id: i64, old_twitch_name: String },
}

pub fn plan_register(
    by_twitch: Option<&LinkedAccount>,
    by_discord: Option<&LinkedAccount>,
    discord_id: i64,
) -> RegisterPlan {
    if let Some(existing) = by_twitch {
        return match existing.discord_id {
            None => RegisterPlan::LinkChat {
                record_id: existing.id,
            },
            Some(owner) if owner == discord_id => RegisterPlan::AlreadyLinked,
            Some(owner) => RegisterPlan::Conflict { owner },
        };
    }

    match by_discord {
        Some(existing) => RegisterPlan::OverwriteExternal {
            record_id: existing.id,
            old_twitch_name: existing.twitch_name.clone(),
        },
        None => RegisterPlan::CreateNew,
    }
}

async fn handle_register(ctx: &Context, cmd: &CommandInteraction, username: &str) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    let login = twitch::channel_login(username);

    tracing::info!(login, user = cmd.user.id.get(), "registering");

    let twitch_client = twitch_from_ctx(ctx).await?;
    let Some(twitch_user) = twitch_client.user_by_login(login).await? else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::error_embed(
                "Can not find account.",
                format!("Could not find twitch account with name `{login}`"),
            )),
        )
        .await?;
        return Ok(());
    };

    let pool = pool_from_ctx(ctx).await?;
    let discord_id = from_user_id(cmd.user.id);
    let by_twitch = repo::find_by_twitch_id(&pool, twitch_user.id).await?;
    let by_discord = repo::find_by_discord_id(&pool, discord_id).await?;

    let discord_name = cmd.user.tag();
    let member_is_admin = cmd
        .member
        .as_ref()
        .map(|m| is_admin(&m.roles, config.admin_role_id))
        .unwrap_or(false);

    let channel_link = format!("[{0}](https://twitch.tv/{0})", twitch_user.login);

    match plan_register(by_twitch.as_ref(), by_discord.as_ref(), discord_id) {
        RegisterPlan::AlreadyLinked => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    serenity::all::CreateEmbed::new()
                        .colour(embeds::BLUE)
                        .title("Nothing to do.")
                        .description(format!(
                            "{channel_link} is already linked to this discord account."
                        )),
                ),
            )
            .await?;
        }
        RegisterPlan::Conflict { owner } => {
            tracing::info!(login = %twitch_user.login, owner, "already owned twitch account");
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    embeds::error_embed(
                        "already registered by somebody else.",
                        format!(
                            "{} has already registered {channel_link}, \
                             if they are not the owner of this account please contact an admin",
                            mention_user(owner)
                        ),
                    )
                    .thumbnail(twitch_user.profile_image_url.clone()),
                ),
            )
            .await?;
        }
        RegisterPlan::CreateNew => {
            let embed = serenity::all::CreateEmbed::new()
                .colour(embeds::BLUE)
                .description(format!(
                    "you are about to register a link between this discord account and \
                     {channel_link} make sure this is what you are meaning to do!"
                ))
                .thumbnail(twitch_user.profile_image_url.clone())
                .footer(CreateEmbedFooter::new(
                    "You can change this later using /twitch register",
                ));
            confirm::prompt(
                ctx,
                cmd,
                format!("Register {}", twitch_user.login),
                embed,
                menus::confirm_button(),
                menus::cancel_button(),
                ConfirmAction::CreateAccount {
                    twitch_id: twitch_user.id,
                    twitch_name: twitch_user.login.clone(),
                    discord_id,
                    discord_name,
                    is_admin: member_is_admin,
                },
            )
            .await?;
        }
        RegisterPlan::LinkChat { record_id } => {
            let embed = serenity::all::CreateEmbed::new()
                .colour(embeds::BLUE)
                .description(format!(
                    "you are about to register a link between this discord account and \
                     {channel_link} make sure this is what you are meaning to do!\n\n\
                     **NOTE:** you were already registered, but a discord account was missing."
                ))
                .thumbnail(twitch_user.profile_image_url.clone());
            confirm::prompt(
                ctx,
                cmd,
                format!("Register {}", twitch_user.login),
                embed,
                menus::confirm_button(),
                menus::cancel_button(),
                ConfirmAction::LinkChat {
                    record_id,
                    discord_id,
                    discord_name,
                },
            )
            .await?;
        }
        RegisterPlan::OverwriteExternal {
            record_id,
            old_twitch_name,
        } => {
            let embed = serenity::all::CreateEmbed::new()
                .colour(embeds::BLUE)
                .description(format!(
                    "you are about to register a link between this discord account and \
                     {channel_link} but you have already registered \
                     [{old_twitch_name}](https://twitch.tv/{old_twitch_name}), \
                     this will overwrite that, make sure this is what you are meaning to do!\
                     \n\n**WARNING:** this will reset your points!"
                ))
                .thumbnail(twitch_user.profile_image_url.clone());
            confirm::prompt(
                ctx,
                cmd,
                format!("Overwrite {old_twitch_name} with {}", twitch_user.login),
                embed,
                menus::danger_confirm_button(),
                menus::primary_cancel_button(),
                ConfirmAction::OverwriteExternal {
                    record_id,
                    twitch_id: twitch_user.id,
                    twitch_name: twitch_user.login.clone(),
                },
            )
            .await?;
        }
    }

    Ok(())
}

/// Delete prompt shared by /twitch unregister and /admin delete.
pub async fn delete_prompt(
    ctx: &Context,
    cmd: &CommandInteraction,
    account: &LinkedAccount,
) -> anyhow::Result<()> {
    let title = format!(
        "Delete `{}`/`{}`",
        account.discord_name.as_deref().unwrap_or("None"),
        account.twitch_name
    );
    confirm::prompt(
        ctx,
        cmd,
        title,
        embeds::account_embed(account),
        menus::delete_button(),
        menus::primary_cancel_button(),
        ConfirmAction::DeleteAccount {
            record_id: account.id,
        },
    )
    .await
}

async fn handle_unregister(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let pool = pool_from_ctx(ctx).await?;
    match repo::find_by_discord_id(&pool, from_user_id(cmd.user.id)).await? {
        None => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(embeds::account_not_found()),
            )
            .await?;
        }
        Some(account) => {
            tracing::info!(user = cmd.user.id.get(), "unregister prompt");
            delete_prompt(ctx, cmd, &account).await?;
        }
    }
    Ok(())
}

async fn handle_points(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let pool = pool_from_ctx(ctx).await?;
    match repo::find_by_discord_id(&pool, from_user_id(cmd.user.id)).await? {
        None => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(embeds::error_embed(
                    "Not found.",
                    "We could not find an account connected to this discord account.\n\
                     you can register one using `/twitch register <your_twitch_name>`"
                        .to_string(),
                )),
            )
            .await?;
        }
        Some(account) => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().embed(
                    serenity::all::CreateEmbed::new()
                        .colour(embeds::BLUE)
                        .title(format!("Points for {}", account.twitch_name))
                        .description(format!("You have **{}** points", account.points)),
                ),
            )
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, twitch_id: i64, discord_id: Option<i64>, points: i64) -> LinkedAccount {
        LinkedAccount {
            id,
            twitch_id,
            twitch_name: format!("streamer{twitch_id}"),
            discord_id,
            discord_name: discord_id.map(|d| format!("user{d}")),
            points,
            is_admin: false,
            stream_platform: None,
            stream_url: None,
        }
    }

    #[test]
    fn fresh_identities_create_a_new_record() {
        assert_eq!(plan_register(None, None, 42), RegisterPlan::CreateNew);
    }

    #[test]
    fn orphan_twitch_record_gets_linked() {
        let orphan = account(1, 100, None, 250);
        assert_eq!(
            plan_register(Some(&orphan), None, 42),
            RegisterPlan::LinkChat { record_id: 1 }
        );
    }

    #[test]
    fn claimed_twitch_account_conflicts() {
        let claimed = account(1, 100, Some(7), 250);
        assert_eq!(
            plan_register(Some(&claimed), None, 42),
            RegisterPlan::Conflict { owner: 7 }
        );
    }

    #[test]
    fn own_twitch_account_is_a_no_op() {
        let mine = account(1, 100, Some(42), 250);
        assert_eq!(plan_register(Some(&mine), None, 42), RegisterPlan::AlreadyLinked);
    }

    #[test]
    fn new_twitch_name_on_existing_record_overwrites() {
        let mine = account(1, 100, Some(42), 250);
        assert_eq!(
            plan_register(None, Some(&mine), 42),
            RegisterPlan::OverwriteExternal {
                record_id: 1,
                old_twitch_name: "streamer100".to_string(),
            }
        );
    }

    #[test]
    fn conflict_wins_over_overwrite() {
        // both lookups hit: the twitch account belongs to somebody else
        let theirs = account(1, 100, Some(7), 0);
        let mine = account(2, 200, Some(42), 10);
        assert_eq!(
            plan_register(Some(&theirs), Some(&mine), 42),
            RegisterPlan::Conflict { owner: 7 }
        );
    }
}
