use std::collections::HashMap;

use chrono::{DateTime, Duration as CDuration, Utc};
use serenity::all::{
    ChannelId, ChannelType, Context, CreateInvite, CreateMessage, GuildId, Member, UserId,
};
use serenity::builder::{EditMessage, GetMessages};
use sqlx::PgPool;
use tokio::time::{interval, Duration};

use crate::commands::birthday::{advance_year, to_utc_midnight};
use crate::config::Config;
use crate::db::repo;
use crate::handlers::{streaming_activity, LIVE_STATE};
use crate::ui::embeds;
use crate::utils::{self, dm_user, from_user_id, is_admin, snowflake_at};

const LEADERBOARD_SIZE: i64 = 10;
const LEADERBOARD_INTERVAL: Duration = Duration::from_secs(10 * 60);
const INACTIVITY_INTERVAL: Duration = Duration::from_secs(60 * 60);
const BIRTHDAY_INTERVAL: Duration = Duration::from_secs(60 * 60);

const NOTIFY_AFTER_DAYS: i64 = 7;
const KICK_AFTER_DAYS: i64 = 30;
const HISTORY_WINDOW_DAYS: i64 = 30;

/// Startup resyncs plus the standing loops. Called once from ready; every
/// job reports its own failures and none can take the process down.
pub fn spawn_all(ctx: Context, pool: PgPool, config: Config) {
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = sync_admins(&ctx, &pool, &config).await {
                utils::report_error(&ctx.http, &config, "sync_admins failed", &e).await;
            }
        });
    }
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = sync_live(&ctx, &pool, &config).await {
                utils::report_error(&ctx.http, &config, "sync_live failed", &e).await;
            }
        });
    }
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = sync_roles(&ctx, &pool, &config).await {
                utils::report_error(&ctx.http, &config, "sync_roles failed", &e).await;
            }
        });
    }
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = sync_last_seen(&ctx, &pool, &config).await {
                utils::report_error(&ctx.http, &config, "sync_last_seen failed", &e).await;
            }
        });
    }
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            if let Err(e) = leaderboard_loop(&ctx, &pool, &config).await {
                utils::report_error(&ctx.http, &config, "leaderboard loop died", &e).await;
            }
        });
    }
    {
        let (ctx, pool, config) = (ctx.clone(), pool.clone(), config.clone());
        tokio::spawn(async move {
            inactivity_loop(&ctx, &pool, &config).await;
        });
    }
    tokio::spawn(async move {
        birthday_loop(&ctx, &pool, &config).await;
    });
}

async fn fetch_all_members(ctx: &Context, config: &Config) -> anyhow::Result<Vec<Member>> {
    let gid = GuildId::new(config.guild_id);
    let mut members = Vec::new();
    let mut after: Option<UserId> = None;
    loop {
        let batch = gid.members(&ctx.http, Some(1000), after).await?;
        let len = batch.len();
        after = batch.last().map(|m| m.user.id);
        members.extend(batch);
        if len < 1000 {
            return Ok(members);
        }
    }
}

/// Make sure all admin flags are correct after a restart.
async fn sync_admins(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    tracing::info!("syncing admins");

    let members = fetch_all_members(ctx, config).await?;
    let admin_ids: Vec<i64> = members
        .iter()
        .filter(|m| is_admin(&m.roles, config.admin_role_id))
        .map(|m| from_user_id(m.user.id))
        .collect();

    repo::sync_admins(pool, &admin_ids).await?;

    tracing::info!("synced admins.");
    Ok(())
}

/// Overwrite every member's stream field from current presence state to
/// correct drift accumulated while offline, and seed the transition map.
async fn sync_live(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    tracing::info!("syncing live");

    // snapshot the cached presences before the first await; the cache ref
    // cannot be held across suspension points
    let streams: HashMap<u64, crate::db::models::StreamInfo> = {
        match ctx.cache.guild(GuildId::new(config.guild_id)) {
            Some(guild) => guild
                .presences
                .iter()
                .filter_map(|(uid, presence)| {
                    streaming_activity(presence).map(|s| (uid.get(), s))
                })
                .collect(),
            None => HashMap::new(),
        }
    };

    let members = fetch_all_members(ctx, config).await?;
    for member in members.iter().filter(|m| !m.user.bot) {
        let user_id = member.user.id.get();
        let stream = streams.get(&user_id);
        LIVE_STATE.insert(user_id, stream.is_some());
        repo::set_stream_info(pool, from_user_id(member.user.id), stream).await?;
    }

    tracing::info!("synced live.");
    Ok(())
}

/// Refresh every role's name/colour; descriptions survive.
async fn sync_roles(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    tracing::info!("syncing roles");

    let roles = GuildId::new(config.guild_id).roles(&ctx.http).await?;
    for (role_id, role) in &roles {
        repo::sync_role(pool, role_id.get() as i64, &role.name, role.colour.0 as i32).await?;
    }

    tracing::info!("synced roles");
    Ok(())
}

fn message_time(msg: &serenity::all::Message) -> DateTime<Utc> {
    let ts = msg
        .edited_timestamp
        .unwrap_or(msg.timestamp)
        .unix_timestamp();
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Rebuild last-seen times from channel history, most recent message in
/// the window per member; members with no message get epoch so the kick
/// check sees them.
async fn sync_last_seen(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    tracing::info!("syncing inactive members.");

    let members = fetch_all_members(ctx, config).await?;
    let mut seen: HashMap<i64, Option<DateTime<Utc>>> = members
        .iter()
        .filter(|m| !m.user.bot)
        .map(|m| (from_user_id(m.user.id), None))
        .collect();

    let window_start = Utc::now() - CDuration::days(HISTORY_WINDOW_DAYS);
    let channels = GuildId::new(config.guild_id).channels(&ctx.http).await?;

    for channel in channels.values().filter(|c| c.kind == ChannelType::Text) {
        tracing::info!(channel = %channel.name, "getting messages");
        let mut cursor = snowflake_at(window_start);
        loop {
            let batch = match channel
                .id
                .messages(&ctx.http, GetMessages::new().after(cursor).limit(100))
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    // history can be forbidden per channel; skip it
                    tracing::error!(channel = %channel.name, "could not read history: {e}");
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }

            for msg in &batch {
                if msg.id > cursor {
                    cursor = msg.id;
                }
                if let Some(entry) = seen.get_mut(&from_user_id(msg.author.id)) {
                    let at = message_time(msg);
                    if entry.map_or(true, |prev| at > prev) {
                        *entry = Some(at);
                    }
                }
            }

            if batch.len() < 100 {
                break;
            }
        }
    }

    for (discord_id, last) in seen {
        repo::seed_last_seen(pool, discord_id, last.unwrap_or(DateTime::UNIX_EPOCH)).await?;
    }

    tracing::info!("synced inactive members.");
    Ok(())
}

/// Re-render the persistent ranking message every ten minutes.
async fn leaderboard_loop(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    let channel = ChannelId::new(config.leaderboard_channel_id);

    // reuse the channel's newest message as the persistent board
    let existing = channel
        .messages(&ctx.http, GetMessages::new().limit(1))
        .await?;
    let message_id = match existing.first() {
        Some(msg) => msg.id,
        None => channel.say(&ctx.http, "TMP").await?.id,
    };

    let mut tick = interval(LEADERBOARD_INTERVAL);
    loop {
        tick.tick().await;

        let top = match repo::top_by_points(pool, LEADERBOARD_SIZE).await {
            Ok(top) => top,
            Err(e) => {
                tracing::error!("leaderboard query failed: {e:#}");
                continue;
            }
        };

        let embed = embeds::leaderboard_embed(&top, Utc::now().timestamp());
        if let Err(e) = channel
            .edit_message(&ctx.http, message_id, EditMessage::new().content("").embed(embed))
            .await
        {
            tracing::error!("leaderboard edit failed: {e}");
        }
    }
}

async fn inactivity_loop(ctx: &Context, pool: &PgPool, config: &Config) {
    let mut tick = interval(INACTIVITY_INTERVAL);
    loop {
        tick.tick().await;
        tracing::info!("doing inactivity check");

        if let Err(e) = send_inactive_notifications(ctx, pool, config).await {
            utils::report_error(&ctx.http, config, "inactivity notifications failed", &e).await;
        }
        if let Err(e) = kick_inactive_users(ctx, pool, config).await {
            utils::report_error(&ctx.http, config, "inactivity kicks failed", &e).await;
        }

        tracing::info!("inactivity check done");
    }
}

async fn send_inactive_notifications(
    ctx: &Context,
    pool: &PgPool,
    config: &Config,
) -> anyhow::Result<()> {
    let gid = GuildId::new(config.guild_id);
    let cutoff = Utc::now() - CDuration::days(NOTIFY_AFTER_DAYS);
    let rows = repo::unnotified_idle_since(pool, cutoff).await?;

    let mut processed = Vec::with_capacity(rows.len());
    for row in rows {
        processed.push(row.discord_id);

        let member = match gid.member(&ctx.http, UserId::new(row.discord_id as u64)).await {
            Ok(member) => member,
            Err(_) => {
                tracing::error!(user = row.discord_id, "could not get member to notify");
                continue;
            }
        };
        if member.user.bot {
            continue;
        }

        tracing::info!(user = row.discord_id, "notifying inactive member");
        let kick_at = (row.last_seen + CDuration::days(KICK_AFTER_DAYS)).timestamp();
        let sent = dm_user(
            &ctx.http,
            row.discord_id as u64,
            CreateMessage::new().embed(embeds::inactivity_warning_embed(kick_at)),
        )
        .await;
        if !sent {
            tracing::error!(user = row.discord_id, "could not notify user.");
        }
    }

    repo::mark_notified(pool, &processed).await?;
    Ok(())
}

async fn kick_inactive_users(ctx: &Context, pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    let gid = GuildId::new(config.guild_id);
    let cutoff = Utc::now() - CDuration::days(KICK_AFTER_DAYS);
    let rows = repo::idle_since(pool, cutoff).await?;
    if rows.is_empty() {
        return Ok(());
    }

    // one shared invite so kicked members can come back
    let channels = gid.channels(&ctx.http).await?;
    let invite_url = match channels.values().find(|c| c.kind == ChannelType::Text) {
        Some(channel) => match channel.id.create_invite(&ctx.http, CreateInvite::new().unique(false)).await {
            Ok(invite) => Some(invite.url()),
            Err(e) => {
                tracing::error!("could not create invite: {e}");
                None
            }
        },
        None => None,
    };

    for row in rows {
        let member = match gid.member(&ctx.http, UserId::new(row.discord_id as u64)).await {
            Ok(member) => member,
            Err(_) => {
                tracing::error!(user = row.discord_id, "could not get member to kick");
                continue;
            }
        };
        if member.user.bot {
            continue;
        }

        tracing::info!(user = row.discord_id, "kicking inactive member");

        let mut dm = CreateMessage::new().embed(embeds::kicked_embed());
        if let Some(url) = &invite_url {
            dm = dm.content(url.clone());
        }
        if !dm_user(&ctx.http, row.discord_id as u64, dm).await {
            tracing::error!(user = row.discord_id, "could not notify user.");
        }

        // kicks can be forbidden (role above ours); skip and continue
        if let Err(e) = member.kick_with_reason(&ctx.http, "inactive for 30 days.").await {
            tracing::error!(user = row.discord_id, "could not kick user: {e}");
        }
    }

    Ok(())
}

async fn birthday_loop(ctx: &Context, pool: &PgPool, config: &Config) {
    let channel = ChannelId::new(config.birthday_channel_id);
    let mut tick = interval(BIRTHDAY_INTERVAL);
    loop {
        tick.tick().await;

        let due = match repo::due_birthdays(pool, Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!("birthday query failed: {e:#}");
                continue;
            }
        };

        for record in due {
            if let Err(e) = channel
                .send_message(
                    &ctx.http,
                    CreateMessage::new().embed(embeds::birthday_embed(record.discord_id)),
                )
                .await
            {
                tracing::error!(user = record.discord_id, "birthday message failed: {e}");
                continue;
            }

            let next = to_utc_midnight(advance_year(record.next_date.date_naive()));
            if let Err(e) = repo::upsert_birthday(pool, record.discord_id, next).await {
                tracing::error!(user = record.discord_id, "birthday advance failed: {e:#}");
            }
        }
    }
}
