use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context, CreateCommand,
    CreateCommandOption,
};
use serenity::builder::EditInteractionResponse;

use crate::db::repo;
use crate::handlers::{config_from_ctx, pool_from_ctx};
use crate::utils::from_user_id;

const HUMAN_DATE_FORMAT: &str = "dd/mm";

pub fn command() -> CreateCommand {
    CreateCommand::new("birthday")
        .description("Register your birthday so we can wish you a happy birthday!")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "date",
                format!(
                    "your birthday, provided in the format of {HUMAN_DATE_FORMAT} \
                     (day, then a slash, then the month)"
                ),
            )
            .required(true),
        )
}

pub fn parse_day_month(input: &str) -> Option<(u32, u32)> {
    let (day, month) = input.trim().split_once('/')?;
    let day: u32 = day.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    // validate against a leap year so 29/02 is accepted
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some((day, month))
}

/// Next strictly-future occurrence of day/month. Years that do not contain
/// the date (Feb 29) are skipped.
pub fn next_occurrence(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    for year in today.year()..=today.year() + 8 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date > today {
                return Some(date);
            }
        }
    }
    None
}

/// Push a fired birthday to its next occurrence.
pub fn advance_year(date: NaiveDate) -> NaiveDate {
    next_occurrence(date.day(), date.month(), date)
        .unwrap_or_else(|| date + chrono::Duration::days(365))
}

pub fn to_utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight always exists"))
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let config = config_from_ctx(ctx).await?;
    if config.hide_messages() {
        cmd.defer_ephemeral(&ctx.http).await?;
    } else {
        cmd.defer(&ctx.http).await?;
    }

    let mut raw = String::new();
    for o in &cmd.data.options {
        if o.name == "date" {
            if let CommandDataOptionValue::String(s) = &o.value {
                raw = s.clone();
            }
        }
    }

    let Some((day, month)) = parse_day_month(&raw) else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(format!(
                "**ERROR:** Sorry I had some trouble converting your input to a date, \
                 please use format `{HUMAN_DATE_FORMAT}`"
            )),
        )
        .await?;
        return Ok(());
    };

    let today = Utc::now().date_naive();
    let Some(date) = next_occurrence(day, month, today) else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(format!(
                "**ERROR:** Sorry I had some trouble converting your input to a date, \
                 please use format `{HUMAN_DATE_FORMAT}`"
            )),
        )
        .await?;
        return Ok(());
    };

    let next_date = to_utc_midnight(date);
    let pool = pool_from_ctx(ctx).await?;
    repo::upsert_birthday(&pool, from_user_id(cmd.user.id), next_date).await?;

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().content(format!(
            "great! I will remind everyone at <t:{}:D> in <#{}> :D",
            next_date.timestamp(),
            config.birthday_channel_id
        )),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_day_slash_month() {
        assert_eq!(parse_day_month("14/07"), Some((14, 7)));
        assert_eq!(parse_day_month(" 1/1 "), Some((1, 1)));
        assert_eq!(parse_day_month("29/02"), Some((29, 2)));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_day_month("32/01"), None);
        assert_eq!(parse_day_month("14-07"), None);
        assert_eq!(parse_day_month("birthday"), None);
        assert_eq!(parse_day_month("14/13"), None);
    }

    #[test]
    fn upcoming_dates_stay_in_the_current_year() {
        assert_eq!(
            next_occurrence(24, 12, date(2026, 8, 6)),
            Some(date(2026, 12, 24))
        );
    }

    #[test]
    fn past_dates_roll_to_next_year() {
        assert_eq!(
            next_occurrence(14, 2, date(2026, 8, 6)),
            Some(date(2027, 2, 14))
        );
        // today itself counts as passed
        assert_eq!(
            next_occurrence(6, 8, date(2026, 8, 6)),
            Some(date(2027, 8, 6))
        );
    }

    #[test]
    fn leap_day_skips_to_a_leap_year() {
        assert_eq!(
            next_occurrence(29, 2, date(2026, 8, 6)),
            Some(date(2028, 2, 29))
        );
    }

    #[test]
    fn advancing_a_fired_birthday_moves_one_year() {
        assert_eq!(advance_year(date(2026, 12, 24)), date(2027, 12, 24));
        assert_eq!(advance_year(date(2028, 2, 29)), date(2032, 2, 29));
    }
}
