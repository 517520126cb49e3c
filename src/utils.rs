use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, CreateMessage, Http, MessageId, RoleId, UserId};
use serenity::prelude::Mentionable;

use crate::config::Config;

pub fn from_user_id(id: UserId) -> i64 {
    id.get() as i64
}

pub fn mention_user(id: i64) -> String {
    UserId::new(id as u64).mention().to_string()
}

pub fn is_admin(roles: &[RoleId], admin_role_id: u64) -> bool {
    roles.iter().any(|rid| rid.get() == admin_role_id)
}

const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Synthetic message id for "everything sent after this instant"; used as a
/// history pagination cursor.
pub fn snowflake_at(at: DateTime<Utc>) -> MessageId {
    let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    MessageId::new((ms << 22).max(1))
}

pub async fn dm_user(http: &Http, user_id: u64, message: CreateMessage) -> bool {
    let uid = UserId::new(user_id);
    match uid.create_dm_channel(http).await {
        Ok(dm) => dm.id.send_message(http, message).await.is_ok(),
        Err(_) => false,
    }
}

/// Best-effort operator report: log channel, owner mention, error in a code
/// block truncated to fit a Discord message.
pub async fn report_error(http: &Http, config: &Config, what: &str, err: &anyhow::Error) {
    tracing::error!(what, "{err:#}");

    let mut body = format!("{err:#}");
    body.truncate(1900);
    let content = format!(
        "{}\n**{what}**\n```\n{body}\n```",
        mention_user(config.bot_owner_id as i64)
    );

    let _ = ChannelId::new(config.log_channel_id)
        .send_message(http, CreateMessage::new().content(content))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn admin_check_matches_role_id() {
        let roles = vec![RoleId::new(1), RoleId::new(797573934848802817)];
        assert!(is_admin(&roles, 797573934848802817));
        assert!(!is_admin(&roles, 2));
        assert!(!is_admin(&[], 797573934848802817));
    }

    #[test]
    fn snowflake_cursor_encodes_the_timestamp() {
        // discord epoch itself maps to the smallest valid id
        let epoch = Utc.timestamp_millis_opt(DISCORD_EPOCH_MS).unwrap();
        assert_eq!(snowflake_at(epoch).get(), 1);

        let at = Utc.timestamp_millis_opt(DISCORD_EPOCH_MS + 1000).unwrap();
        assert_eq!(snowflake_at(at).get(), 1000 << 22);
    }

    #[test]
    fn snowflake_cursor_clamps_pre_epoch_times() {
        let ancient = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(snowflake_at(ancient).get(), 1);
    }
}
