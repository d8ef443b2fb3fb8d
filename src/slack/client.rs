use crate::config::Identity;
use crate::error::{ArchiveBotError, Result};
use crate::remote::{Channel, ChannelKind, User};
use slack_morphism::prelude::*;
use std::sync::Arc;

pub struct SlackClient {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let connector = SlackClientHyperConnector::new()
            .map_err(|e| ArchiveBotError::SlackApi(e.to_string()))?;

        let client = Arc::new(slack_morphism::SlackClient::new(connector));
        let token: String = token.into();
        let token = SlackApiToken::new(token.into());

        Ok(Self { client, token })
    }

    /// Get user information from Slack API
    pub async fn get_user_info(&self, user_id: &str) -> Result<User> {
        let session = self.client.open_session(&self.token);

        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string()));

        let response = session
            .users_info(&request)
            .await
            .map_err(|e| ArchiveBotError::SlackApi(e.to_string()))?;

        let user = response.user;
        let display_name = user
            .profile
            .as_ref()
            .and_then(|p| p.display_name.clone())
            .filter(|name| !name.is_empty());

        Ok(User {
            id: Identity::from(user.id.to_string()),
            name: display_name
                .or(user.name)
                .unwrap_or_else(|| user_id.to_string()),
        })
    }

    /// Conversations the bot is a member of, attributed to `guild`
    pub async fn list_channels(&self, guild: &Identity) -> Result<Vec<Channel>> {
        tracing::debug!("Fetching channel list from Slack API");
        let session = self.client.open_session(&self.token);

        let request = SlackApiConversationsListRequest::new().with_types(vec![
            SlackConversationType::Public,
            SlackConversationType::Private,
        ]);

        let response = session
            .conversations_list(&request)
            .await
            .map_err(|e| ArchiveBotError::SlackApi(e.to_string()))?;

        tracing::debug!(total = response.channels.len(), "Received channel list");

        let channels = response
            .channels
            .into_iter()
            .filter(|c| c.flags.is_member.unwrap_or(false))
            .map(|c| {
                let id = c.id.to_string();
                Channel {
                    name: c.name.unwrap_or_else(|| id.clone()),
                    id: Identity::from(id),
                    guild: guild.clone(),
                    // Slack conversations carry text only
                    kind: ChannelKind::Text,
                }
            })
            .collect();

        Ok(channels)
    }
}
