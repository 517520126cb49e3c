use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::models::{BirthdayRecord, LastSeen, LinkedAccount, RoleInfo, StreamInfo};

/* accounts */

pub async fn find_by_twitch_id(pool: &PgPool, twitch_id: i64) -> anyhow::Result<Option<LinkedAccount>> {
    let account = sqlx::query_as::<_, LinkedAccount>(
        "SELECT * FROM accounts WHERE twitch_id = $1",
    )
    .bind(twitch_id)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn find_by_discord_id(pool: &PgPool, discord_id: i64) -> anyhow::Result<Option<LinkedAccount>> {
    let account = sqlx::query_as::<_, LinkedAccount>(
        "SELECT * FROM accounts WHERE discord_id = $1",
    )
    .bind(discord_id)
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

pub async fn find_by_twitch_name(pool: &PgPool, twitch_name: &str) -> anyhow::Result<Option<LinkedAccount>> {
    let account = sqlx::query_as::<_, LinkedAccount>(
        "SELECT * FROM accounts WHERE twitch_name = $1",
    )
    .bind(twitch_name.to_lowercase())
    .fetch_optional(pool)
    .await?;
    Ok(account)
}

/// Insert a brand-new account with zero points.
pub async fn insert_account(
    pool: &PgPool,
    twitch_id: i64,
    twitch_name: &str,
    discord_id: i64,
    discord_name: &str,
    is_admin: bool,
) -> anyhow::Result<LinkedAccount> {
    let account = sqlx::query_as::<_, LinkedAccount>(
        r#"
        INSERT INTO accounts (twitch_id, twitch_name, discord_id, discord_name, points, is_admin)
        VALUES ($1, $2, $3, $4, 0, $5)
        RETURNING *
        "#,
    )
    .bind(twitch_id)
    .bind(twitch_name.to_lowercase())
    .bind(discord_id)
    .bind(discord_name)
    .bind(is_admin)
    .fetch_one(pool)
    .await?;
    Ok(account)
}

/// Attach a discord identity to an orphan twitch record. Points are kept.
pub async fn link_discord(
    pool: &PgPool,
    id: i64,
    discord_id: i64,
    discord_name: &str,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE accounts SET discord_id = $1, discord_name = $2 WHERE id = $3")
        .bind(discord_id)
        .bind(discord_name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Replace the twitch identity on a record. Points reset to zero.
pub async fn overwrite_twitch(
    pool: &PgPool,
    id: i64,
    twitch_id: i64,
    twitch_name: &str,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE accounts SET twitch_id = $1, twitch_name = $2, points = 0 WHERE id = $3")
        .bind(twitch_id)
        .bind(twitch_name.to_lowercase())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move a record to a new discord owner. Points are kept.
pub async fn transfer_discord(
    pool: &PgPool,
    id: i64,
    discord_id: i64,
    discord_name: &str,
    is_admin: bool,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE accounts SET discord_id = $1, discord_name = $2, is_admin = $3 WHERE id = $4",
    )
    .bind(discord_id)
    .bind(discord_name)
    .bind(is_admin)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_account(pool: &PgPool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_by_discord_id(pool: &PgPool, discord_id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM accounts WHERE discord_id = $1")
        .bind(discord_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_admin_flag(pool: &PgPool, discord_id: i64, is_admin: bool) -> anyhow::Result<()> {
    sqlx::query("UPDATE accounts SET is_admin = $1 WHERE discord_id = $2")
        .bind(is_admin)
        .bind(discord_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_display_name(pool: &PgPool, discord_id: i64, name: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE accounts SET discord_name = $1 WHERE discord_id = $2")
        .bind(name)
        .bind(discord_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_stream_info(
    pool: &PgPool,
    discord_id: i64,
    stream: Option<&StreamInfo>,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE accounts SET stream_platform = $1, stream_url = $2 WHERE discord_id = $3",
    )
    .bind(stream.map(|s| s.platform.as_str()))
    .bind(stream.and_then(|s| s.url.as_deref()))
    .bind(discord_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Top accounts by points, stable on ties.
pub async fn top_by_points(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<LinkedAccount>> {
    let accounts = sqlx::query_as::<_, LinkedAccount>(
        "SELECT * FROM accounts ORDER BY points DESC, id ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(accounts)
}

pub async fn all_accounts(pool: &PgPool) -> anyhow::Result<Vec<LinkedAccount>> {
    let accounts = sqlx::query_as::<_, LinkedAccount>("SELECT * FROM accounts ORDER BY id ASC")
        .fetch_all(pool)
        .await?;
    Ok(accounts)
}

/// After this, is_admin is TRUE exactly for linked accounts in `admin_ids`
/// and FALSE for every other linked account.
pub async fn sync_admins(pool: &PgPool, admin_ids: &[i64]) -> anyhow::Result<()> {
    sqlx::query("UPDATE accounts SET is_admin = TRUE WHERE discord_id = ANY($1)")
        .bind(admin_ids)
        .execute(pool)
        .await?;
    sqlx::query(
        "UPDATE accounts SET is_admin = FALSE WHERE discord_id IS NOT NULL AND NOT (discord_id = ANY($1))",
    )
    .bind(admin_ids)
    .execute(pool)
    .await?;
    Ok(())
}

/* role_info */

/// Upsert a role's name and color; the placeholder description is only set
/// on first insert so edits survive role updates.
pub async fn sync_role(pool: &PgPool, role_id: i64, name: &str, color: i32) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO role_info (role_id, name, color)
        VALUES ($1, $2, $3)
        ON CONFLICT (role_id) DO UPDATE SET name = EXCLUDED.name, color = EXCLUDED.color
        "#,
    )
    .bind(role_id)
    .bind(name)
    .bind(color)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_role(pool: &PgPool, role_id: i64) -> anyhow::Result<Option<RoleInfo>> {
    let role = sqlx::query_as::<_, RoleInfo>("SELECT * FROM role_info WHERE role_id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}

pub async fn set_role_description(pool: &PgPool, role_id: i64, description: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE role_info SET description = $1 WHERE role_id = $2")
        .bind(description)
        .bind(role_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_role(pool: &PgPool, role_id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM role_info WHERE role_id = $1")
        .bind(role_id)
        .execute(pool)
        .await?;
    Ok(())
}

/* birthdays */

pub async fn upsert_birthday(
    pool: &PgPool,
    discord_id: i64,
    next_date: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO birthdays (discord_id, next_date)
        VALUES ($1, $2)
        ON CONFLICT (discord_id) DO UPDATE SET next_date = EXCLUDED.next_date
        "#,
    )
    .bind(discord_id)
    .bind(next_date)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn due_birthdays(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<Vec<BirthdayRecord>> {
    let due = sqlx::query_as::<_, BirthdayRecord>(
        "SELECT * FROM birthdays WHERE next_date <= $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(due)
}

/* last_seen */

/// A fresh message resets the inactivity clock and re-arms the warning.
pub async fn touch_last_seen(pool: &PgPool, discord_id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO last_seen (discord_id, last_seen, sent_notification)
        VALUES ($1, $2, FALSE)
        ON CONFLICT (discord_id)
        DO UPDATE SET last_seen = EXCLUDED.last_seen, sent_notification = FALSE
        "#,
    )
    .bind(discord_id)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Startup resync write: overwrites the timestamp but keeps
/// sent_notification, so restarts do not re-warn everyone.
pub async fn seed_last_seen(pool: &PgPool, discord_id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO last_seen (discord_id, last_seen)
        VALUES ($1, $2)
        ON CONFLICT (discord_id) DO UPDATE SET last_seen = EXCLUDED.last_seen
        "#,
    )
    .bind(discord_id)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn unnotified_idle_since(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> anyhow::Result<Vec<LastSeen>> {
    let rows = sqlx::query_as::<_, LastSeen>(
        "SELECT * FROM last_seen WHERE last_seen <= $1 AND NOT sent_notification",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn idle_since(pool: &PgPool, cutoff: DateTime<Utc>) -> anyhow::Result<Vec<LastSeen>> {
    let rows = sqlx::query_as::<_, LastSeen>("SELECT * FROM last_seen WHERE last_seen <= $1")
        .bind(cutoff)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn mark_notified(pool: &PgPool, discord_ids: &[i64]) -> anyhow::Result<()> {
    sqlx::query("UPDATE last_seen SET sent_notification = TRUE WHERE discord_id = ANY($1)")
        .bind(discord_ids)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_last_seen(pool: &PgPool, discord_id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM last_seen WHERE discord_id = $1")
        .bind(discord_id)
        .execute(pool)
        .await?;
    Ok(())
}
