use serenity::all::{ComponentInteraction, Context};
use uuid::Uuid;

use crate::confirm;
use crate::ui::paginator;

/* custom_id formats: cf:ok:<uuid> cf:no:<uuid> pg:pv:<uuid> pg:nx:<uuid> */
pub fn parse_component_id(s: &str) -> Option<(&str, &str, Uuid)> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [kind @ "cf", which, token] if matches!(*which, "ok" | "no") => {
            token.parse().ok().map(|t| (*kind, *which, t))
        }
        [kind @ "pg", which, token] if matches!(*which, "pv" | "nx") => {
            token.parse().ok().map(|t| (*kind, *which, t))
        }
        _ => None,
    }
}

pub async fn handle_component(ctx: &Context, it: &ComponentInteraction) -> anyhow::Result<()> {
    let Some((kind, which, token)) = parse_component_id(&it.data.custom_id) else {
        return Ok(());
    };

    match (kind, which) {
        ("cf", "ok") => confirm::handle_click(ctx, it, token, true).await,
        ("cf", "no") => confirm::handle_click(ctx, it, token, false).await,
        ("pg", "pv") => paginator::flip(ctx, it, token, false).await,
        ("pg", "nx") => paginator::flip(ctx, it, token, true).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_parse() {
        let token = Uuid::new_v4();
        assert_eq!(
            parse_component_id(&format!("cf:ok:{token}")),
            Some(("cf", "ok", token))
        );
        assert_eq!(
            parse_component_id(&format!("pg:nx:{token}")),
            Some(("pg", "nx", token))
        );
    }

    #[test]
    fn unknown_ids_are_ignored() {
        assert_eq!(parse_component_id("cf:maybe:123"), None);
        assert_eq!(parse_component_id("cf:ok:not-a-uuid"), None);
        assert_eq!(parse_component_id("something else"), None);
    }
}
