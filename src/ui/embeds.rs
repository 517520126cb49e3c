use serenity::all::{Colour, CreateEmbed};

use crate::db::models::LinkedAccount;
use crate::utils::mention_user;

pub const RED: Colour = Colour::new(0xFF0000);
pub const GREEN: Colour = Colour::new(0x07E500);
pub const BLUE: Colour = Colour::new(0x0044F2);
pub const YELLOW: Colour = Colour::new(0xF7EB02);

pub fn error_embed(title: &str, description: String) -> CreateEmbed {
    CreateEmbed::new().colour(RED).title(title).description(description)
}

pub fn account_not_found() -> CreateEmbed {
    error_embed(
        "Not found.",
        "We could not find an account connected to this discord account.".to_string(),
    )
}

/// Raw db record rendered for /admin view and the delete prompt. Ids and
/// stream internals stay out of the embed, like the data we show users.
pub fn account_embed(account: &LinkedAccount) -> CreateEmbed {
    let owner = account
        .discord_name
        .clone()
        .unwrap_or_else(|| account.twitch_name.clone());

    let mut embed = CreateEmbed::new()
        .colour(BLUE)
        .title(format!("Data for user `{owner}`"))
        .field("twitch_name", account.twitch_name.clone(), true)
        .field(
            "discord_name",
            account.discord_name.clone().unwrap_or_else(|| "None".to_string()),
            true,
        )
        .field("points", account.points.to_string(), true)
        .field("isAdmin", account.is_admin.to_string(), true);

    if let Some(stream) = account.stream() {
        embed = embed.field("streaming", stream.platform, true);
    }

    embed
}

/// One leaderboard line per account, already ordered by the caller.
pub fn leaderboard_lines(accounts: &[LinkedAccount]) -> String {
    let mut lines = Vec::with_capacity(accounts.len());
    for account in accounts {
        let twitch_mention = format!(
            "[{0}](https://www.twitch.tv/{0})",
            account.twitch_name
        );
        let user_mention = match account.discord_id {
            Some(discord_id) => format!("{} / {twitch_mention}", mention_user(discord_id)),
            None => twitch_mention,
        };
        lines.push(format!("{user_mention} : **{}**", account.points));
    }
    lines.join("\n")
}

pub fn leaderboard_embed(accounts: &[LinkedAccount], now_ts: i64) -> CreateEmbed {
    CreateEmbed::new()
        .colour(YELLOW)
        .title(format!("last updated <t:{now_ts}:R>"))
        .description(leaderboard_lines(accounts))
}

pub fn online_embed() -> CreateEmbed {
    CreateEmbed::new().colour(GREEN).title("Bot online")
}

pub fn birthday_embed(discord_id: i64) -> CreateEmbed {
    CreateEmbed::new()
        .colour(GREEN)
        .title("Happy Birthday!")
        .description(format!(
            "it is {} birthday 🥳\n\ndont forget to wish them a happy birthday!",
            mention_user(discord_id)
        ))
}

pub fn inactivity_warning_embed(kick_at_ts: i64) -> CreateEmbed {
    CreateEmbed::new()
        .colour(RED)
        .title("WARNING: you might get kicked.")
        .description(format!(
            "you have not been active in over 7 days, \
             you will be kicked from the server at <t:{kick_at_ts}>"
        ))
}

pub fn kicked_embed() -> CreateEmbed {
    CreateEmbed::new()
        .colour(RED)
        .title("KICKED: you have been kicked for inactivity.")
        .description(
            "you have not been active in over 30 days, \
             you have been kicked from the server, but you can rejoin!",
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, points: i64, discord: Option<i64>) -> LinkedAccount {
        LinkedAccount {
            id,
            twitch_id: id * 100,
            twitch_name: format!("streamer{id}"),
            discord_id: discord,
            discord_name: discord.map(|d| format!("user{d}")),
            points,
            is_admin: false,
            stream_platform: None,
            stream_url: None,
        }
    }

    #[test]
    fn leaderboard_lines_render_in_given_order() {
        let accounts = vec![account(1, 50, Some(11)), account(2, 10, None)];
        let lines = leaderboard_lines(&accounts);
        let expected = "<@11> / [streamer1](https://www.twitch.tv/streamer1) : **50**\n\
                        [streamer2](https://www.twitch.tv/streamer2) : **10**";
        assert_eq!(lines, expected);
    }

    #[test]
    fn leaderboard_lines_are_deterministic() {
        let accounts = vec![account(1, 5, Some(11)), account(2, 5, Some(22))];
        assert_eq!(leaderboard_lines(&accounts), leaderboard_lines(&accounts));
    }

    #[test]
    fn unlinked_accounts_get_twitch_mentions_only() {
        let lines = leaderboard_lines(&[account(3, 0, None)]);
        assert!(!lines.contains("<@"));
        assert!(lines.contains("twitch.tv/streamer3"));
    }
}
