use serenity::all::{ButtonStyle, ReactionType};
use serenity::builder::{CreateActionRow, CreateButton};
use uuid::Uuid;

/// Label/style/emoji for one prompt button.
#[derive(Debug, Clone)]
pub struct ButtonInfo {
    pub label: String,
    pub style: ButtonStyle,
    pub emoji: Option<ReactionType>,
}

impl ButtonInfo {
    pub fn new(label: &str, style: ButtonStyle) -> Self {
        Self {
            label: label.to_string(),
            style,
            emoji: None,
        }
    }

    pub fn with_emoji(label: &str, style: ButtonStyle, emoji: &str) -> Self {
        Self {
            label: label.to_string(),
            style,
            emoji: Some(ReactionType::Unicode(emoji.to_string())),
        }
    }

    fn build(&self, custom_id: String, disabled: bool) -> CreateButton {
        let mut button = CreateButton::new(custom_id)
            .label(self.label.clone())
            .style(self.style)
            .disabled(disabled);
        if let Some(emoji) = &self.emoji {
            button = button.emoji(emoji.clone());
        }
        button
    }
}

pub fn confirm_button() -> ButtonInfo {
    ButtonInfo::with_emoji("confirm", ButtonStyle::Success, "☑️")
}

pub fn cancel_button() -> ButtonInfo {
    ButtonInfo::with_emoji("cancel", ButtonStyle::Danger, "⛔")
}

/// Red-confirm variant for destructive prompts (overwrite, transfer).
pub fn danger_confirm_button() -> ButtonInfo {
    ButtonInfo::with_emoji("confirm", ButtonStyle::Danger, "☑️")
}

pub fn primary_cancel_button() -> ButtonInfo {
    ButtonInfo::with_emoji("cancel", ButtonStyle::Primary, "⛔")
}

pub fn delete_button() -> ButtonInfo {
    ButtonInfo::with_emoji("delete", ButtonStyle::Danger, "🗑️")
}

/* Confirm/deny row, cf:ok / cf:no */
pub fn confirm_row(
    token: Uuid,
    confirm: &ButtonInfo,
    deny: &ButtonInfo,
    disabled: bool,
) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        confirm.build(format!("cf:ok:{token}"), disabled),
        deny.build(format!("cf:no:{token}"), disabled),
    ])
}

/* Paginator row, pg:pv / pg:nx; arrows disable at the ends */
pub fn paginator_row(token: Uuid, page: usize, num_pages: usize) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new(format!("pg:pv:{token}"))
            .emoji(ReactionType::Unicode("⬅️".to_string()))
            .style(ButtonStyle::Primary)
            .disabled(page == 0),
        CreateButton::new(format!("pg:nx:{token}"))
            .emoji(ReactionType::Unicode("➡️".to_string()))
            .style(ButtonStyle::Primary)
            .disabled(page + 1 >= num_pages),
    ])
}
