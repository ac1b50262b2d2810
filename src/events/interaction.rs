use async_trait::async_trait;
use poise::serenity_prelude::{
    self as serenity, ActionRowComponent, ComponentInteraction, ComponentInteractionDataKind,
    CreateActionRow, CreateInputText, CreateInteractionResponse,
    CreateInteractionResponseMessage, CreateModal, InputTextStyle, ModalInteraction, UserId,
};
use tracing::{debug, error, info, warn};

use super::intent::{code_modal_id, Intent, CODE_INPUT};
use crate::managers::{
    AcceptOutcome, CodeEntryOutcome, CreateOutcome, RatingSubmission, StaffOutcome,
};
use crate::managers::verification_manager::{expired_session, not_your_session};
use crate::messages;
use crate::platform::discord::{create_followup, summarize};
use crate::platform::{FollowUp, Render};
use crate::{Data, Error};

const GUILD_ONLY: &str = "This only works inside the server.";
const FAILED: &str = "❌ Something went wrong, please try again later.";

/// Room for a pasted code with surrounding whitespace; trimming happens on submit
const CODE_INPUT_MAX: u16 = 20;

/// Routes button presses, select choices and modal submissions
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> Result<(), Error> {
    match interaction {
        serenity::Interaction::Component(component) => handle_component(ctx, component, data).await,
        serenity::Interaction::Modal(modal) => handle_modal(ctx, modal, data).await,
        _ => Ok(()),
    }
}

/// Ephemeral follow-ups on a deferred component interaction
struct InteractionFollowUp<'a> {
    http: &'a serenity::Http,
    interaction: &'a ComponentInteraction,
}

#[async_trait]
impl FollowUp for InteractionFollowUp<'_> {
    async fn follow_up(&self, content: &str) {
        if let Err(e) = self
            .interaction
            .create_followup(self.http, create_followup(&Render::text(content)))
            .await
        {
            warn!("Failed to send follow-up: {}", e);
        }
    }
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let values: &[String] = match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values,
        _ => &[],
    };
    let Some(intent) = Intent::from_component(&component.data.custom_id, values) else {
        debug!("Ignoring component '{}'", component.data.custom_id);
        return Ok(());
    };
    debug!("{:?} from {}", intent, component.user.id);

    // The code modal must be the first response, so it cannot be deferred
    if let Intent::OpenCodeEntry { owner } = intent {
        return open_code_entry(ctx, component, data, owner).await;
    }

    component.defer_ephemeral(&ctx.http).await?;
    let follow_up = InteractionFollowUp {
        http: &ctx.http,
        interaction: component,
    };

    let reply = match dispatch_component(component, data, intent, &follow_up).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("Error handling '{}': {}", component.data.custom_id, e);
            Some(Render::text(FAILED))
        }
    };

    if let Some(reply) = reply {
        component
            .create_followup(&ctx.http, create_followup(&reply))
            .await?;
    }
    Ok(())
}

async fn dispatch_component(
    component: &ComponentInteraction,
    data: &Data,
    intent: Intent,
    follow_up: &InteractionFollowUp<'_>,
) -> Result<Option<Render>, Error> {
    let user = summarize(&component.user);
    let can_manage = component
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .map(|p| p.manage_channels())
        .unwrap_or(false);
    let ticket_name = component
        .channel
        .as_ref()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| component.channel_id.to_string());

    let reply = match intent {
        Intent::CreateTicket => {
            let Some(guild_id) = component.guild_id else {
                return Ok(Some(Render::text(GUILD_ONLY)));
            };
            match data.tickets.create(guild_id, &user).await? {
                CreateOutcome::Created { channel_id } => {
                    Render::notice(messages::ticket_created(channel_id))
                }
                CreateOutcome::SupportClosed { reply } => reply,
            }
        }
        Intent::ClaimTicket => {
            match data
                .tickets
                .claim(component.channel_id, &ticket_name, user.id, can_manage, follow_up)
                .await?
            {
                StaffOutcome::Done => Render::text("Ticket has been claimed!"),
                StaffOutcome::NotPermitted => {
                    Render::text("You do not have the required permissions to claim tickets!")
                }
            }
        }
        Intent::ReleaseTicket => {
            match data
                .tickets
                .release(component.channel_id, &ticket_name, user.id, can_manage)
                .await?
            {
                StaffOutcome::Done => Render::text("Ticket has been released!"),
                StaffOutcome::NotPermitted => {
                    Render::text("You do not have the required permissions to release tickets!")
                }
            }
        }
        Intent::CloseTicket => {
            // Answer first, the channel is gone afterwards
            follow_up.follow_up("Closing ticket!").await;
            data.tickets
                .close(
                    component.guild_id,
                    component.channel_id,
                    &ticket_name,
                    user.id,
                    follow_up,
                )
                .await?;
            return Ok(None);
        }
        Intent::ShowRatingAverage => Render::notice(data.tickets.average_notice().await),
        Intent::SubmitRating { stars } => {
            match data
                .tickets
                .submit_rating(component.message.id, stars, &user)
                .await
            {
                RatingSubmission::Accepted { stars, ratings, .. } => {
                    info!("{} rated support with {} stars", user.name, stars);
                    Render::notice(messages::rating_thanks(stars, &ratings))
                }
                RatingSubmission::AlreadySubmitted { prior } => {
                    Render::notice(messages::rating_already_submitted(prior))
                }
                RatingSubmission::Invalid { .. } => {
                    Render::text("Invalid rating. Please choose between 1 and 5 stars.")
                }
            }
        }
        Intent::AcceptRules => {
            let Some(guild_id) = component.guild_id else {
                return Ok(Some(Render::text(GUILD_ONLY)));
            };
            let roles = component
                .member
                .as_ref()
                .map(|m| m.roles.clone())
                .unwrap_or_default();
            match data
                .verification
                .accept_rules(guild_id, user.id, &roles)
                .await?
            {
                AcceptOutcome::CodeIssued { code } => messages::verification_code(&code, user.id),
                other => Render::text(other.reply()),
            }
        }
        Intent::OpenCodeEntry { .. } | Intent::SubmitCode { .. } => return Ok(None),
    };
    Ok(Some(reply))
}

async fn open_code_entry(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
    owner: UserId,
) -> Result<(), Error> {
    let response = match data.verification.open_code_entry(owner, component.user.id) {
        CodeEntryOutcome::Open => CreateInteractionResponse::Modal(code_modal(owner)),
        CodeEntryOutcome::NotYourSession => ephemeral_message(not_your_session()),
        CodeEntryOutcome::Expired => ephemeral_message(expired_session()),
    };
    component.create_response(&ctx.http, response).await?;
    Ok(())
}

fn code_modal(owner: UserId) -> CreateModal {
    let input = CreateInputText::new(InputTextStyle::Short, "Verification Code", CODE_INPUT)
        .placeholder("Enter the code from the message")
        .max_length(CODE_INPUT_MAX)
        .required(true);
    CreateModal::new(code_modal_id(owner), "Enter Verification Code")
        .components(vec![CreateActionRow::InputText(input)])
}

fn ephemeral_message(content: String) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

async fn handle_modal(
    ctx: &serenity::Context,
    modal: &ModalInteraction,
    data: &Data,
) -> Result<(), Error> {
    let code = modal_input(modal, CODE_INPUT).unwrap_or_default();
    let Some(Intent::SubmitCode { owner, code }) = Intent::from_modal(&modal.data.custom_id, &code)
    else {
        debug!("Ignoring modal '{}'", modal.data.custom_id);
        return Ok(());
    };

    modal.defer_ephemeral(&ctx.http).await?;
    let reply = match modal.guild_id {
        Some(guild_id) => match data
            .verification
            .submit_code(guild_id, owner, modal.user.id, &code)
            .await
        {
            Ok(outcome) => outcome.reply(),
            Err(e) => {
                error!("Error verifying {}: {}", owner, e);
                FAILED.to_string()
            }
        },
        None => GUILD_ONLY.to_string(),
    };

    modal
        .create_followup(&ctx.http, create_followup(&Render::text(reply)))
        .await?;
    Ok(())
}

/// Value of the text input `custom_id` in a submitted modal
fn modal_input(modal: &ModalInteraction, custom_id: &str) -> Option<String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_modal_accepts_padded_input() {
        let json = serde_json::to_string(&code_modal(UserId::new(7))).unwrap();
        assert!(json.contains("\"max_length\":20"));
        assert!(!json.contains("min_length"));
        assert!(json.contains(CODE_INPUT));
    }
}
