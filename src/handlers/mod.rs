pub mod components;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serenity::all::{
    ActivityType, ChannelId, Context, CreateMessage, EventHandler, GuildId, GuildMemberUpdateEvent,
    Interaction, Member, Message, Presence, Ready, Role, RoleId, User,
};
use serenity::async_trait;
use sqlx::PgPool;

use crate::commands;
use crate::config::Config;
use crate::db::models::StreamInfo;
use crate::db::repo;
use crate::tasks;
use crate::twitch::TwitchClient;
use crate::ui::embeds;
use crate::utils::{self, from_user_id, is_admin};

pub struct Handler {
    pool: PgPool,
    config: Config,
    twitch: TwitchClient,
    started: AtomicBool,
}

impl Handler {
    pub fn new(pool: PgPool, config: Config, twitch: TwitchClient) -> Self {
        Self {
            pool,
            config,
            twitch,
            started: AtomicBool::new(false),
        }
    }
}

/// Last observed "is streaming" flag per user. Seeded by the startup
/// resync; store writes happen only on transitions.
pub static LIVE_STATE: Lazy<DashMap<u64, bool>> = Lazy::new(DashMap::new);

pub fn streaming_activity(presence: &Presence) -> Option<StreamInfo> {
    presence
        .activities
        .iter()
        .find(|a| a.kind == ActivityType::Streaming)
        .map(|a| StreamInfo {
            platform: a.name.to_lowercase(),
            url: a.url.as_ref().map(|u| u.to_string()),
        })
}

/// Record the new observation; true when it differs from the previous one.
/// A user never seen before counts as not streaming.
pub fn presence_transition(map: &DashMap<u64, bool>, user_id: u64, is_streaming: bool) -> bool {
    let prev = map.insert(user_id, is_streaming).unwrap_or(false);
    prev != is_streaming
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("{} is connected", ready.user.name);
        {
            let mut data = ctx.data.write().await;
            data.insert::<DbKey>(self.pool.clone());
            data.insert::<ConfigKey>(self.config.clone());
            data.insert::<TwitchKey>(self.twitch.clone());
        }

        // READY re-fires after a resume; the loops must only spawn once
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = commands::status::START_TIME.set(chrono::Utc::now().timestamp());

        if let Err(e) = commands::register_commands(&ctx, &self.config).await {
            utils::report_error(&ctx.http, &self.config, "register_commands", &e).await;
        }

        let _ = ChannelId::new(self.config.log_channel_id)
            .send_message(&ctx.http, CreateMessage::new().embed(embeds::online_embed()))
            .await;

        tasks::spawn_all(ctx, self.pool.clone(), self.config.clone());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(cmd) => {
                if let Err(e) = commands::handle(&ctx, &cmd).await {
                    let what = format!("/{} failed", cmd.data.name);
                    utils::report_error(&ctx.http, &self.config, &what, &e).await;
                }
            }
            Interaction::Component(comp) => {
                if let Err(e) = components::handle_component(&ctx, &comp).await {
                    utils::report_error(&ctx.http, &self.config, "component click failed", &e).await;
                }
            }
            _ => {}
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot || msg.guild_id.map(|g| g.get()) != Some(self.config.guild_id) {
            return;
        }
        let at = chrono::DateTime::from_timestamp(msg.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(chrono::Utc::now);
        if let Err(e) = repo::touch_last_seen(&self.pool, from_user_id(msg.author.id), at).await {
            tracing::error!("touch_last_seen failed: {e:#}");
        }
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        if event.guild_id.get() != self.config.guild_id {
            return;
        }

        let discord_id = from_user_id(event.user.id);
        let admin_now = is_admin(&event.roles, self.config.admin_role_id);
        let name_now = event.user.tag();

        // without the old member we cannot tell what changed; both writes
        // are idempotent so just issue them
        let (admin_changed, name_changed) = match &old_if_available {
            Some(old) => (
                is_admin(&old.roles, self.config.admin_role_id) != admin_now,
                old.user.tag() != name_now,
            ),
            None => (true, true),
        };

        if admin_changed {
            tracing::info!(user = discord_id, admin_now, "updating admin flag");
            if let Err(e) = repo::set_admin_flag(&self.pool, discord_id, admin_now).await {
                tracing::error!("set_admin_flag failed: {e:#}");
            }
        }

        if name_changed {
            tracing::info!(user = discord_id, name = %name_now, "updating display name");
            if let Err(e) = repo::set_display_name(&self.pool, discord_id, &name_now).await {
                tracing::error!("set_display_name failed: {e:#}");
            }
        }
    }

    async fn presence_update(&self, _ctx: Context, new_data: Presence) {
        if new_data.guild_id.map(|g| g.get()) != Some(self.config.guild_id) {
            return;
        }

        let stream = streaming_activity(&new_data);
        let user_id = new_data.user.id;
        if !presence_transition(&LIVE_STATE, user_id.get(), stream.is_some()) {
            return;
        }

        tracing::info!(
            user = user_id.get(),
            streaming = stream.is_some(),
            "updating live status"
        );
        if let Err(e) =
            repo::set_stream_info(&self.pool, from_user_id(user_id), stream.as_ref()).await
        {
            tracing::error!("set_stream_info failed: {e:#}");
        }
    }

    async fn guild_role_create(&self, _ctx: Context, new: Role) {
        if new.guild_id.get() != self.config.guild_id {
            return;
        }
        if let Err(e) =
            repo::sync_role(&self.pool, new.id.get() as i64, &new.name, new.colour.0 as i32).await
        {
            tracing::error!("sync_role (create) failed: {e:#}");
        }
    }

    async fn guild_role_update(&self, _ctx: Context, _old_data_if_available: Option<Role>, new: Role) {
        if new.guild_id.get() != self.config.guild_id {
            return;
        }
        if let Err(e) =
            repo::sync_role(&self.pool, new.id.get() as i64, &new.name, new.colour.0 as i32).await
        {
            tracing::error!("sync_role (update) failed: {e:#}");
        }
    }

    async fn guild_role_delete(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        removed_role_id: RoleId,
        _removed_role_data_if_available: Option<Role>,
    ) {
        if guild_id.get() != self.config.guild_id {
            return;
        }
        if let Err(e) = repo::delete_role(&self.pool, removed_role_id.get() as i64).await {
            tracing::error!("delete_role failed: {e:#}");
        }
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        if guild_id.get() != self.config.guild_id {
            return;
        }
        let discord_id = from_user_id(user.id);
        tracing::info!(user = discord_id, "member left, dropping records");
        if let Err(e) = repo::delete_by_discord_id(&self.pool, discord_id).await {
            tracing::error!("delete_by_discord_id failed: {e:#}");
        }
        if let Err(e) = repo::delete_last_seen(&self.pool, discord_id).await {
            tracing::error!("delete_last_seen failed: {e:#}");
        }
    }
}

/* Context data access */
use serenity::prelude::TypeMapKey;

struct DbKey;
impl TypeMapKey for DbKey {
    type Value = PgPool;
}

struct ConfigKey;
impl TypeMapKey for ConfigKey {
    type Value = Config;
}

struct TwitchKey;
impl TypeMapKey for TwitchKey {
    type Value = TwitchClient;
}

pub async fn pool_from_ctx(ctx: &Context) -> anyhow::Result<PgPool> {
    let data = ctx.data.read().await;
    data.get::<DbKey>().cloned().context("PgPool missing from ctx data")
}

pub async fn config_from_ctx(ctx: &Context) -> anyhow::Result<Config> {
    let data = ctx.data.read().await;
    data.get::<ConfigKey>().cloned().context("Config missing from ctx data")
}

pub async fn twitch_from_ctx(ctx: &Context) -> anyhow::Result<TwitchClient> {
    let data = ctx.data.read().await;
    data.get::<TwitchKey>().cloned().context("TwitchClient missing from ctx data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_of_a_streamer_is_a_transition() {
        let map = DashMap::new();
        assert!(presence_transition(&map, 1, true));
    }

    #[test]
    fn first_observation_of_a_non_streamer_is_not() {
        let map = DashMap::new();
        assert!(!presence_transition(&map, 1, false));
    }

    #[test]
    fn repeated_still_streaming_updates_write_nothing() {
        let map = DashMap::new();
        assert!(presence_transition(&map, 1, true));
        assert!(!presence_transition(&map, 1, true));
        assert!(!presence_transition(&map, 1, true));
    }

    #[test]
    fn going_offline_is_a_transition() {
        let map = DashMap::new();
        assert!(presence_transition(&map, 1, true));
        assert!(presence_transition(&map, 1, false));
        assert!(!presence_transition(&map, 1, false));
    }
}
