//! Seal-and-send path shared by every handler

use quorum_storage_traits::{ConversationId, InboxAddress, QuorumStorageProvider};

use super::HandlerDeps;
use crate::error::ActionError;
use crate::wire::WirePayload;

impl<S> HandlerDeps<S>
where
    S: QuorumStorageProvider,
{
    /// Seal `payload` with the conversation's latest session and send it to every
    /// destination.
    ///
    /// Advanced session state is persisted before anything reaches transport, so a
    /// crash after sending never reuses ratchet material.
    pub(crate) async fn deliver(
        &self,
        conversation_id: &ConversationId,
        destinations: &[InboxAddress],
        payload: &WirePayload,
    ) -> Result<(), ActionError> {
        if destinations.is_empty() {
            return Err(ActionError::Validation(format!(
                "no destination for conversation {conversation_id}"
            )));
        }

        let plaintext = payload.to_plaintext()?;
        let state = self.encryption.latest(conversation_id)?;
        let sealed = self
            .sealer
            .seal(conversation_id, state.as_ref(), &plaintext)
            .await?;

        if let Some(next_state) = sealed.next_state {
            self.encryption.save(next_state, true).await?;
        }

        for destination in destinations {
            self.transport.send(destination, &sealed.envelope).await?;
        }

        Ok(())
    }
}
