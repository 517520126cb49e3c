use dashmap::DashMap;
use once_cell::sync::Lazy;
use serenity::all::{
    CommandInteraction, ComponentInteraction, Context, CreateEmbed, CreateEmbedFooter, UserId,
};
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};
use uuid::Uuid;

use crate::ui::menus;

/// Button-driven page flipper over a fixed set of embeds. Only the invoking
/// user can turn pages; everyone else gets an ephemeral notice.
struct Paginator {
    pages: Vec<CreateEmbed>,
    owner: UserId,
    page: usize,
}

static PAGINATORS: Lazy<DashMap<Uuid, Paginator>> = Lazy::new(DashMap::new);

fn page_embed(pages: &[CreateEmbed], page: usize) -> CreateEmbed {
    pages[page]
        .clone()
        .footer(CreateEmbedFooter::new(format!("Page {}/{}", page + 1, pages.len())))
}

fn flip_index(page: usize, num_pages: usize, forward: bool) -> usize {
    if forward {
        (page + 1).min(num_pages.saturating_sub(1))
    } else {
        page.saturating_sub(1)
    }
}

/// Render page one onto the (already deferred) interaction response.
pub async fn start(
    ctx: &Context,
    cmd: &CommandInteraction,
    pages: Vec<CreateEmbed>,
) -> anyhow::Result<()> {
    anyhow::ensure!(!pages.is_empty(), "paginator started with no pages");

    let token = Uuid::new_v4();
    let embed = page_embed(&pages, 0);
    let row = menus::paginator_row(token, 0, pages.len());
    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().embed(embed).components(vec![row]),
    )
    .await?;

    PAGINATORS.insert(
        token,
        Paginator {
            pages,
            owner: cmd.user.id,
            page: 0,
        },
    );
    Ok(())
}

enum Flip {
    Render(Box<CreateEmbed>, usize, usize),
    NotOwner,
    Expired,
}

pub async fn flip(
    ctx: &Context,
    it: &ComponentInteraction,
    token: Uuid,
    forward: bool,
) -> anyhow::Result<()> {
    // resolve and mutate before any await; the map guard must not live
    // across suspension points
    let outcome = match PAGINATORS.get_mut(&token) {
        None => Flip::Expired,
        Some(mut entry) => {
            if entry.owner != it.user.id {
                Flip::NotOwner
            } else {
                entry.page = flip_index(entry.page, entry.pages.len(), forward);
                Flip::Render(
                    Box::new(page_embed(&entry.pages, entry.page)),
                    entry.page,
                    entry.pages.len(),
                )
            }
        }
    };

    match outcome {
        Flip::Render(embed, page, num_pages) => {
            it.create_response(
                &ctx.http,
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(*embed)
                        .components(vec![menus::paginator_row(token, page, num_pages)]),
                ),
            )
            .await?;
        }
        Flip::NotOwner => {
            it.create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("Sorry only the original command user can use this button")
                        .ephemeral(true),
                ),
            )
            .await?;
        }
        Flip::Expired => {
            it.create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("These buttons are no longer active.")
                        .ephemeral(true),
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

    #[test]
    fn flipping_clamps_at_both_ends() {
        assert_eq!(flip_index(0, 3, false), 0);
        assert_eq!(flip_index(0, 3, true), 1);
        assert_eq!(flip_index(2, 3, true), 2);
        assert_eq!(flip_index(2, 3, false), 1);
    }

    #[test]
    fn single_page_never_moves() {
        assert_eq!(flip_index(0, 1, true), 0);
        assert_eq!(flip_index(0, 1, false), 0);
    }
}
