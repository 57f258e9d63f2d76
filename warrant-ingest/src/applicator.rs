//! Command handler: decodes transport commands into pipeline operations.

use crate::{PipelineError, PipelineResult, RightMutation, UpdatePipeline};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use warrant_model::Entry;
use warrant_types::{Command, CommandPayload, Rights};

/// What applying a command left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The entry as written.
    Entry(Entry),
    Deleted,
}

/// Something that consumes commands from the ingestion transport.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &Command) -> PipelineResult<Applied>;
}

/// Applies commands through an [`UpdatePipeline`].
pub struct CommandApplicator {
    pipeline: Arc<UpdatePipeline>,
}

impl CommandApplicator {
    pub fn new(pipeline: Arc<UpdatePipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &UpdatePipeline {
        &self.pipeline
    }

    /// Applies one command.
    pub async fn apply(&self, command: &Command) -> PipelineResult<Applied> {
        let kind = command.kind.as_str();
        let id = command.resource_id.as_str();
        debug!(command = %command.id, kind, id, "applying command");

        match &command.payload {
            CommandPayload::FeaturesReplaced { features } => self
                .pipeline
                .apply_feature_update(kind, id, features.clone(), &command.issuer)
                .await
                .map(Applied::Entry),
            CommandPayload::AnnotationsReplaced { annotations } => self
                .pipeline
                .apply_annotations(kind, id, annotations.clone())
                .await
                .map(Applied::Entry),
            CommandPayload::RightsGranted { principal, rights } => {
                let mutation = RightMutation::grant(principal.clone(), parse_rights(rights)?);
                self.pipeline
                    .apply_right_mutation(kind, id, &mutation)
                    .await
                    .map(Applied::Entry)
            }
            CommandPayload::RightsRevoked { principal, rights } => {
                let mutation = match rights {
                    Some(rights) => RightMutation::revoke(principal.clone(), parse_rights(rights)?),
                    None => RightMutation::revoke_all(principal.clone()),
                };
                self.pipeline
                    .apply_right_mutation(kind, id, &mutation)
                    .await
                    .map(Applied::Entry)
            }
            CommandPayload::Deleted => {
                self.pipeline.delete_entry(kind, id).await?;
                Ok(Applied::Deleted)
            }
        }
    }
}

#[async_trait]
impl CommandHandler for CommandApplicator {
    async fn handle(&self, command: &Command) -> PipelineResult<Applied> {
        self.apply(command).await
    }
}

/// Rights in commands are strict: unknown characters and empty sets are
/// refused rather than skipped.
fn parse_rights(s: &str) -> PipelineResult<Rights> {
    let rights = Rights::parse_strict(s).map_err(|e| PipelineError::InvalidCommand(e.to_string()))?;
    if rights.is_empty() {
        return Err(PipelineError::InvalidCommand("empty rights".into()));
    }
    Ok(rights)
}
