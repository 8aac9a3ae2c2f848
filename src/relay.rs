use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RelayConfig;
use crate::line::{GroupSummary, MessagingApi, TextMessage};
use crate::webhook::{IncomingText, SourceKind};

/// How many characters of the original text go into the success log line.
const LOG_PREVIEW_CHARS: usize = 50;

/// The two messages produced for every forwarded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTemplate {
    /// Pushed into the target group.
    ForwardToTarget,
    /// Replied into the source group as confirmation.
    ReplyToSource,
}

impl MessageTemplate {
    /// `group` is the source group name for `ForwardToTarget` and the target
    /// group name for `ReplyToSource`.
    pub fn compose(self, sender: &str, group: &str, text: &str) -> String {
        match self {
            MessageTemplate::ForwardToTarget => format!(
                "[轉發訊息]\n發送者：{sender}\nFrom群組：{group}\n訊息內容：\n\n{text}"
            ),
            MessageTemplate::ReplyToSource => format!(
                "[訊息已轉發]\n發送者：{sender}\nTo群組：{group}\n訊息內容：\n\n{text}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupInfo {
    pub summary: GroupSummary,
    pub member_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a group message, or posted in a group other than the source group.
    Source,
    /// Text did not pass the keyword filter.
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    Skipped(SkipReason),
    Forwarded {
        source_group: String,
        target_group: String,
        sender: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("message has no sender id")]
    MissingSender,
    #[error("message has no reply token")]
    MissingReplyToken,
    #[error("failed to fetch group info for {group_id}: {reason:#}")]
    GroupInfo {
        group_id: String,
        reason: anyhow::Error,
    },
    #[error("failed to fetch profile of {user_id}: {reason:#}")]
    SenderProfile {
        user_id: String,
        reason: anyhow::Error,
    },
    #[error("failed to push to target group: {0:#}")]
    Push(anyhow::Error),
    #[error("failed to reply to source group: {0:#}")]
    Reply(anyhow::Error),
}

/// Forwards qualifying source-group messages to the target group.
///
/// Built once at startup and shared by every webhook request; it holds no
/// mutable state.
pub struct Relay {
    config: RelayConfig,
    api: Arc<dyn MessagingApi>,
}

impl Relay {
    pub fn new(config: RelayConfig, api: Arc<dyn MessagingApi>) -> Self {
        Self { config, api }
    }

    fn is_from_source_group(&self, event: &IncomingText) -> bool {
        event.source_kind == SourceKind::Group
            && event.group_id.as_deref() == Some(self.config.source_group_id.as_str())
    }

    async fn group_info(&self, group_id: &str) -> Result<GroupInfo, ForwardError> {
        let fetch = async {
            let summary = self.api.get_group_summary(group_id).await?;
            let member_count = self.api.get_group_member_count(group_id).await?;
            anyhow::Ok(GroupInfo {
                summary,
                member_count,
            })
        };
        fetch.await.map_err(|reason| ForwardError::GroupInfo {
            group_id: group_id.to_string(),
            reason,
        })
    }

    /// Run the forwarding workflow for one text message.
    ///
    /// Guards return `Skipped` without touching the platform API. Metadata is
    /// fetched in full before anything is sent, so a lookup failure never
    /// leaves a one-sided forward. The push always precedes the reply.
    pub async fn handle(&self, event: &IncomingText) -> Result<ForwardOutcome, ForwardError> {
        if !self.is_from_source_group(event) {
            debug!("Ignoring message outside the source group");
            return Ok(ForwardOutcome::Skipped(SkipReason::Source));
        }

        if !self.config.filter.should_forward(&event.text) {
            debug!("Message did not match the forward filter");
            return Ok(ForwardOutcome::Skipped(SkipReason::Filter));
        }

        let source_group_id = self.config.source_group_id.as_str();
        let target_group_id = self.config.target_group_id.as_str();
        let sender_id = event
            .sender_id
            .as_deref()
            .ok_or(ForwardError::MissingSender)?;
        let reply_token = event
            .reply_token
            .as_deref()
            .ok_or(ForwardError::MissingReplyToken)?;

        let source_group = self.group_info(source_group_id).await?;
        let sender = self
            .api
            .get_group_member_profile(source_group_id, sender_id)
            .await
            .map_err(|reason| ForwardError::SenderProfile {
                user_id: sender_id.to_string(),
                reason,
            })?;
        let target_group = self.group_info(target_group_id).await?;

        debug!(
            "Source group '{}' ({} members), target group '{}' ({} members)",
            source_group.summary.group_name,
            source_group.member_count,
            target_group.summary.group_name,
            target_group.member_count
        );

        let forward_text = MessageTemplate::ForwardToTarget.compose(
            &sender.display_name,
            &source_group.summary.group_name,
            &event.text,
        );
        self.api
            .push_message(target_group_id, &[TextMessage::new(forward_text)])
            .await
            .map_err(ForwardError::Push)?;

        let reply_text = MessageTemplate::ReplyToSource.compose(
            &sender.display_name,
            &target_group.summary.group_name,
            &event.text,
        );
        self.api
            .reply_message(reply_token, &[TextMessage::new(reply_text)])
            .await
            .map_err(ForwardError::Reply)?;

        let preview: String = event.text.chars().take(LOG_PREVIEW_CHARS).collect();
        info!("Message forwarded: {}...", preview);

        Ok(ForwardOutcome::Forwarded {
            source_group: source_group.summary.group_name,
            target_group: target_group.summary.group_name,
            sender: sender.display_name,
        })
    }

    /// Handle each event in order. Failures are logged and returned, never
    /// propagated, so one bad event does not stop the rest.
    pub async fn dispatch(
        &self,
        events: &[IncomingText],
    ) -> Vec<Result<ForwardOutcome, ForwardError>> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let outcome = self.handle(event).await;
            match &outcome {
                Ok(ForwardOutcome::Forwarded {
                    source_group,
                    target_group,
                    sender,
                }) => info!(
                    "Relayed message from {} in '{}' to '{}'",
                    sender, source_group, target_group
                ),
                Ok(ForwardOutcome::Skipped(_)) => {}
                Err(e) => error!("Failed to forward message: {}", e),
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
