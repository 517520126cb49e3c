use dashmap::DashMap;
use once_cell::sync::Lazy;
use serenity::all::{
    CommandInteraction, ComponentInteraction, Context, CreateEmbed, UserId,
};
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};
use sqlx::PgPool;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::db::repo;
use crate::handlers::pool_from_ctx;
use crate::ui::embeds::{GREEN, RED};
use crate::ui::menus::{self, ButtonInfo};

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The single registry write a prompt is guarding. Applied at most once,
/// only after the initiating user clicks confirm.
#[derive(Debug, Clone)]
pub enum ConfirmAction {
    /// Brand-new account, zero points.
    CreateAccount {
        twitch_id: i64,
        twitch_name: String,
        discord_id: i64,
        discord_name: String,
        is_admin: bool,
    },
    /// Attach the acting user to an orphan twitch record, keeping points.
    LinkChat {
        record_id: i64,
        discord_id: i64,
        discord_name: String,
    },
    /// Swap the twitch identity on the acting user's record; points reset.
    OverwriteExternal {
        record_id: i64,
        twitch_id: i64,
        twitch_name: String,
    },
    DeleteAccount { record_id: i64 },
    /// Admin transfer to a new discord owner, keeping points.
    TransferAccount {
        record_id: i64,
        discord_id: i64,
        discord_name: String,
        is_admin: bool,
    },
}

impl ConfirmAction {
    pub async fn apply(&self, pool: &PgPool) -> anyhow::Result<()> {
        match self {
            Self::CreateAccount {
                twitch_id,
                twitch_name,
                discord_id,
                discord_name,
                is_admin,
            } => {
                repo::insert_account(pool, *twitch_id, twitch_name, *discord_id, discord_name, *is_admin)
                    .await?;
                Ok(())
            }
            Self::LinkChat {
                record_id,
                discord_id,
                discord_name,
            } => repo::link_discord(pool, *record_id, *discord_id, discord_name).await,
            Self::OverwriteExternal {
                record_id,
                twitch_id,
                twitch_name,
            } => repo::overwrite_twitch(pool, *record_id, *twitch_id, twitch_name).await,
            Self::DeleteAccount { record_id } => repo::delete_account(pool, *record_id).await,
            Self::TransferAccount {
                record_id,
                discord_id,
                discord_name,
                is_admin,
            } => {
                repo::transfer_discord(pool, *record_id, *discord_id, discord_name, *is_admin).await
            }
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::CreateAccount { .. } => "create account",
            Self::LinkChat { .. } => "link discord",
            Self::OverwriteExternal { .. } => "overwrite twitch",
            Self::DeleteAccount { .. } => "delete account",
            Self::TransferAccount { .. } => "transfer account",
        }
    }
}

/// Everything needed to resolve a prompt: who may answer, what to render,
/// what to run.
pub struct PendingConfirm {
    pub initiator: UserId,
    pub title: String,
    pub embed: CreateEmbed,
    pub confirm: ButtonInfo,
    pub deny: ButtonInfo,
    pub action: ConfirmAction,
}

static PENDING: Lazy<DashMap<Uuid, PendingConfirm>> = Lazy::new(DashMap::new);

pub enum Claim {
    Claimed(Box<PendingConfirm>),
    NotInitiator,
    Expired,
}

/// Resolve a click against the pending map. Removal is atomic, so exactly
/// one claimer wins no matter how many clicks race; a non-initiator click
/// leaves the entry untouched.
fn claim(map: &DashMap<Uuid, PendingConfirm>, token: Uuid, user: UserId) -> Claim {
    if let Some((_, pending)) = map.remove_if(&token, |_, p| p.initiator == user) {
        return Claim::Claimed(Box::new(pending));
    }
    if map.contains_key(&token) {
        Claim::NotInitiator
    } else {
        Claim::Expired
    }
}

fn resolved_embed(pending: &PendingConfirm, suffix: &str, colour: serenity::all::Colour) -> CreateEmbed {
    pending
        .embed
        .clone()
        .title(format!("{}{suffix}", pending.title))
        .colour(colour)
}

/// Render the prompt onto the (already deferred) interaction response and
/// arm the 5-minute timeout. The wrapped action will run at most once.
pub async fn prompt(
    ctx: &Context,
    cmd: &CommandInteraction,
    title: String,
    embed: CreateEmbed,
    confirm: ButtonInfo,
    deny: ButtonInfo,
    action: ConfirmAction,
) -> anyhow::Result<()> {
    let token = Uuid::new_v4();

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new()
            .embed(embed.clone().title(title.clone()))
            .components(vec![menus::confirm_row(token, &confirm, &deny, false)]),
    )
    .await?;

    PENDING.insert(
        token,
        PendingConfirm {
            initiator: cmd.user.id,
            title,
            embed,
            confirm,
            deny,
            action,
        },
    );

    // the timer owns its interaction clone; whoever removes the entry first
    // (click or timer) performs the terminal render
    let http = ctx.http.clone();
    let interaction = cmd.clone();
    tokio::spawn(async move {
        sleep(CONFIRM_TIMEOUT).await;
        let Some((_, pending)) = PENDING.remove(&token) else {
            return;
        };
        tracing::info!(
            action = pending.action.describe(),
            user = pending.initiator.get(),
            "confirmation timed out"
        );
        let render = EditInteractionResponse::new()
            .embed(resolved_embed(&pending, ": **CANCELLED**", RED))
            .components(vec![menus::confirm_row(
                token,
                &pending.confirm,
                &pending.deny,
                true,
            )]);
        if let Err(e) = interaction.edit_response(&http, render).await {
            tracing::warn!("could not render timed-out prompt: {e}");
        }
    });

    Ok(())
}

/// Route a cf:* button click.
pub async fn handle_click(
    ctx: &Context,
    it: &ComponentInteraction,
    token: Uuid,
    confirmed: bool,
) -> anyhow::Result<()> {
    let pending = match claim(&PENDING, token, it.user.id) {
        Claim::Claimed(pending) => pending,
        Claim::NotInitiator => {
            it.create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Sorry, only the user who started this can answer the prompt.")
                        .ephemeral(true),
                ),
            )
            .await?;
            return Ok(());
        }
        Claim::Expired => {
            it.create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("This confirmation has expired.")
                        .ephemeral(true),
                ),
            )
            .await?;
            return Ok(());
        }
    };

    let (suffix, colour) = if confirmed {
        let pool = pool_from_ctx(ctx).await?;
        match pending.action.apply(&pool).await {
            Ok(()) => {
                tracing::info!(
                    action = pending.action.describe(),
                    user = it.user.id.get(),
                    "confirmed"
                );
                (": **DONE**", GREEN)
            }
            Err(e) => {
                tracing::error!(action = pending.action.describe(), "apply failed: {e:#}");
                (": **FAILED**", RED)
            }
        }
    } else {
        tracing::info!(
            action = pending.action.describe(),
            user = it.user.id.get(),
            "cancelled"
        );
        (": **CANCELLED**", RED)
    };

    it.create_response(
        &ctx.http,
        CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .embed(resolved_embed(&pending, suffix, colour))
                .components(vec![menus::confirm_row(
                    token,
                    &pending.confirm,
                    &pending.deny,
                    true,
                )]),
        ),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_for(initiator: u64) -> PendingConfirm {
        PendingConfirm {
            initiator: UserId::new(initiator),
            title: "Register somebody".to_string(),
            embed: CreateEmbed::new(),
            confirm: menus::confirm_button(),
            deny: menus::cancel_button(),
            action: ConfirmAction::DeleteAccount { record_id: 1 },
        }
    }

    #[test]
    fn initiator_claims_exactly_once() {
        let map = DashMap::new();
        let token = Uuid::new_v4();
        map.insert(token, pending_for(7));

        assert!(matches!(claim(&map, token, UserId::new(7)), Claim::Claimed(_)));
        // a second click finds nothing to run
        assert!(matches!(claim(&map, token, UserId::new(7)), Claim::Expired));
    }

    #[test]
    fn other_users_never_advance_the_prompt() {
        let map = DashMap::new();
        let token = Uuid::new_v4();
        map.insert(token, pending_for(7));

        assert!(matches!(claim(&map, token, UserId::new(8)), Claim::NotInitiator));
        // the entry is still live for the real initiator
        assert!(matches!(claim(&map, token, UserId::new(7)), Claim::Claimed(_)));
    }

    #[test]
    fn unknown_tokens_read_as_expired() {
        let map: DashMap<Uuid, PendingConfirm> = DashMap::new();
        assert!(matches!(
            claim(&map, Uuid::new_v4(), UserId::new(7)),
            Claim::Expired
        ));
    }
}
