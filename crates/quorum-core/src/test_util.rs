//! Test utilities for the quorum-core crate
//!
//! Fixtures plus scriptable collaborators: a transport that records envelopes, a sealer
//! that passes plaintext through, a handler with programmable outcomes and a storage
//! wrapper that counts reads and injects failures.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use quorum_memory_storage::QuorumMemoryStorage;
use quorum_storage_traits::encryption::EncryptionStateStorage;
use quorum_storage_traits::encryption::types::{EncryptionState, SessionState};
use quorum_storage_traits::messages::MessageStorage;
use quorum_storage_traits::messages::types::{Message, MessageContent};
use quorum_storage_traits::queue::ActionQueueStorage;
use quorum_storage_traits::queue::types::{
    Action, ActionContext, ActionStatus, ChannelTarget, DirectTarget, EnqueueOutcome, NewAction,
    QueueStats,
};
use quorum_storage_traits::spaces::SpaceStorage;
use quorum_storage_traits::spaces::types::{Channel, Space, SpaceMember};
use quorum_storage_traits::user_config::{UserConfig, UserConfigStorage};
use quorum_storage_traits::{
    ActionId, Backend, ChannelId, ConversationId, InboxAddress, MessageId, QuorumStorageProvider,
    SpaceId, StorageError, Timestamp, UserAddress,
};

use crate::error::{ActionError, SanitizedError};
use crate::handlers::ActionHandler;
use crate::sealer::{EnvelopeSealer, SealError, SealedEnvelope};
use crate::transport::{Transport, TransportError};
use crate::wire::WirePayload;

/// Creates a space with a `general` channel, hub `hub-{id}` and inbox `inbox-{id}`
pub fn create_test_space(space_id: &str) -> Space {
    Space {
        space_id: SpaceId::new(space_id),
        name: format!("Space {space_id}"),
        description: String::new(),
        channels: vec![Channel {
            channel_id: ChannelId::new("general"),
            name: "General".to_string(),
        }],
        hub_address: Some(InboxAddress::new(format!("hub-{space_id}"))),
        inbox_address: Some(InboxAddress::new(format!("inbox-{space_id}"))),
        created_at: Timestamp::from_millis(1),
    }
}

/// Creates a member whose inbox is `inbox-{user}`
pub fn create_test_member(space_id: &str, user: &str) -> SpaceMember {
    SpaceMember {
        space_id: SpaceId::new(space_id),
        user_address: UserAddress::new(user),
        inbox_address: Some(InboxAddress::new(format!("inbox-{user}"))),
        display_name: None,
        joined_at: Timestamp::from_millis(1),
    }
}

/// Creates a post from `alice`
pub fn create_test_message(
    space_id: &str,
    channel_id: &str,
    message_id: &str,
    created_at: u64,
) -> Message {
    Message {
        space_id: SpaceId::new(space_id),
        channel_id: ChannelId::new(channel_id),
        message_id: MessageId::new(message_id),
        sender: UserAddress::new("alice"),
        created_at: Timestamp::from_millis(created_at),
        modified_at: Timestamp::from_millis(created_at),
        content: MessageContent::Post {
            text: format!("message {message_id}"),
            reply_to: None,
        },
        pinned: false,
    }
}

/// Creates a membership event in the `general` channel
pub fn create_test_event(
    space_id: &str,
    message_id: &str,
    created_at: u64,
    content: MessageContent,
) -> Message {
    Message {
        content,
        ..create_test_message(space_id, "general", message_id, created_at)
    }
}

/// Creates a session record whose blob is `ratchet-{tag}`
pub fn create_test_state(conversation_id: &str, tag: &str, inbox: Option<&str>) -> EncryptionState {
    EncryptionState {
        conversation_id: ConversationId::new(conversation_id),
        tag: tag.to_string(),
        inbox_id: inbox.map(InboxAddress::new),
        state: SessionState::new(format!("ratchet-{tag}").into_bytes()),
        updated_at: Timestamp::from_millis(1),
    }
}

/// Channel target whose hub matches [`create_test_space`]
pub fn channel_target(space_id: &str, channel_id: &str) -> ChannelTarget {
    ChannelTarget {
        space_id: SpaceId::new(space_id),
        channel_id: ChannelId::new(channel_id),
        hub_address: InboxAddress::new(format!("hub-{space_id}")),
    }
}

/// Direct target with a single device inbox `inbox-{user}`
pub fn direct_target(user: &str) -> DirectTarget {
    DirectTarget {
        counterparty: UserAddress::new(user),
        inbox_addresses: vec![InboxAddress::new(format!("inbox-{user}"))],
    }
}

/// Transport that records envelopes and fails on demand
#[derive(Debug, Default)]
pub struct MockTransport {
    scripted: Mutex<VecDeque<TransportError>>,
    always: Mutex<Option<TransportError>>,
    sent: Mutex<Vec<(InboxAddress, Vec<u8>)>>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// Fail the next send with `error`. Queued errors are used in order.
    pub fn fail_next(&self, error: TransportError) {
        self.scripted.lock().push_back(error);
    }

    /// Fail every send with `error` until [`MockTransport::recover`]
    pub fn fail_always(&self, error: TransportError) {
        *self.always.lock() = Some(error);
    }

    /// Stop failing
    pub fn recover(&self) {
        *self.always.lock() = None;
        self.scripted.lock().clear();
    }

    /// Send attempts, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Successfully sent envelopes
    pub fn sent(&self) -> Vec<(InboxAddress, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Sent envelopes decoded, assuming they came from [`PassthroughSealer`]
    pub fn sent_payloads(&self) -> Vec<(InboxAddress, WirePayload)> {
        self.sent()
            .into_iter()
            .map(|(to, envelope)| {
                let payload = serde_json::from_slice(&envelope).expect("passthrough envelope");
                (to, payload)
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, destination: &InboxAddress, envelope: &[u8]) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.always.lock().clone() {
            return Err(error);
        }
        self.sent
            .lock()
            .push((destination.clone(), envelope.to_vec()));
        Ok(())
    }
}

/// Sealer whose envelope is the plaintext itself
#[derive(Debug, Default)]
pub struct PassthroughSealer {
    advance: bool,
    require_session: bool,
}

impl PassthroughSealer {
    /// Returns the session with `+1` appended as the advanced state
    pub fn advancing() -> Self {
        Self {
            advance: true,
            require_session: false,
        }
    }

    /// Fails with a missing session when no state is supplied
    pub fn requiring_session() -> Self {
        Self {
            advance: false,
            require_session: true,
        }
    }
}

#[async_trait]
impl EnvelopeSealer for PassthroughSealer {
    async fn seal(
        &self,
        conversation_id: &ConversationId,
        state: Option<&EncryptionState>,
        plaintext: &[u8],
    ) -> Result<SealedEnvelope, SealError> {
        if self.require_session && state.is_none() {
            return Err(SealError::MissingSession(conversation_id.clone()));
        }

        let next_state = match state {
            Some(state) if self.advance => {
                let mut bytes = state.state.as_bytes().to_vec();
                bytes.extend_from_slice(b"+1");
                Some(EncryptionState {
                    state: SessionState::new(bytes),
                    ..state.clone()
                })
            }
            _ => None,
        };

        Ok(SealedEnvelope {
            envelope: plaintext.to_vec(),
            next_state,
        })
    }
}

type PermanentFn = fn(&ActionError) -> bool;

/// Handler with programmable outcomes that records every call
pub struct ScriptedHandler {
    scripted: Mutex<VecDeque<ActionError>>,
    always: Mutex<Option<ActionError>>,
    permanent: PermanentFn,
    failure_message: Option<&'static str>,
    executed: Mutex<Vec<ActionContext>>,
    failures: Mutex<Vec<SanitizedError>>,
}

impl fmt::Debug for ScriptedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedHandler")
            .field("calls", &self.calls())
            .field("failures", &self.failures())
            .finish()
    }
}

impl Default for ScriptedHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHandler {
    /// Handler that always succeeds and treats nothing as permanent
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            always: Mutex::new(None),
            permanent: |_| false,
            failure_message: None,
            executed: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Fail every execution with `error`
    pub fn failing_always(self, error: ActionError) -> Self {
        *self.always.lock() = Some(error);
        self
    }

    /// Classify errors with `permanent`
    pub fn permanent_when(mut self, permanent: PermanentFn) -> Self {
        self.permanent = permanent;
        self
    }

    /// Notice emitted on abandonment
    pub fn with_failure_message(mut self, message: &'static str) -> Self {
        self.failure_message = Some(message);
        self
    }

    /// Fail the next execution with `error`
    pub fn fail_next(&self, error: ActionError) {
        self.scripted.lock().push_back(error);
    }

    /// Succeed from now on
    pub fn succeed(&self) {
        *self.always.lock() = None;
        self.scripted.lock().clear();
    }

    /// Number of executions
    pub fn calls(&self) -> usize {
        self.executed.lock().len()
    }

    /// Executed contexts in call order
    pub fn executed(&self) -> Vec<ActionContext> {
        self.executed.lock().clone()
    }

    /// Number of `on_failure` invocations
    pub fn failures(&self) -> usize {
        self.failures.lock().len()
    }

    /// Error passed to the most recent `on_failure`
    pub fn last_failure(&self) -> Option<SanitizedError> {
        self.failures.lock().last().copied()
    }
}

#[async_trait]
impl ActionHandler for ScriptedHandler {
    async fn execute(&self, context: &ActionContext) -> Result<(), ActionError> {
        self.executed.lock().push(context.clone());
        if let Some(error) = self.scripted.lock().pop_front() {
            return Err(error);
        }
        match self.always.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn is_permanent_error(&self, error: &ActionError) -> bool {
        (self.permanent)(error)
    }

    async fn on_failure(&self, _context: &ActionContext, error: &SanitizedError) {
        self.failures.lock().push(*error);
    }

    fn failure_message(&self) -> Option<&'static str> {
        self.failure_message
    }
}

type RetryHook = Box<dyn FnOnce() + Send>;

/// Memory storage wrapper that counts reads, can be told to fail inbox mapping deletes
/// and can run a hook when a retry is persisted
#[derive(Default)]
pub struct InstrumentedStorage {
    inner: QuorumMemoryStorage,
    space_reads: AtomicUsize,
    log_reads: AtomicUsize,
    fail_mapping_deletes: AtomicBool,
    on_retry_persisted: Mutex<Option<RetryHook>>,
}

impl fmt::Debug for InstrumentedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedStorage")
            .field("reads", &self.reads())
            .field("log_reads", &self.log_reads())
            .finish_non_exhaustive()
    }
}

impl InstrumentedStorage {
    /// Wrap `inner`
    pub fn new(inner: QuorumMemoryStorage) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// The wrapped storage, bypassing instrumentation
    pub fn inner(&self) -> &QuorumMemoryStorage {
        &self.inner
    }

    /// Every space, member and message read so far
    pub fn reads(&self) -> usize {
        self.space_reads.load(Ordering::SeqCst) + self.log_reads()
    }

    /// Member and message reads only
    pub fn log_reads(&self) -> usize {
        self.log_reads.load(Ordering::SeqCst)
    }

    /// Make `delete_inbox_mapping` fail
    pub fn fail_inbox_mapping_deletes(&self, fail: bool) {
        self.fail_mapping_deletes.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` once, right after the next retry (a pending record with attempts) is
    /// written
    pub fn on_retry_persisted<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.on_retry_persisted.lock() = Some(Box::new(hook));
    }

    fn count_space_read(&self) {
        self.space_reads.fetch_add(1, Ordering::SeqCst);
    }

    fn count_log_read(&self) {
        self.log_reads.fetch_add(1, Ordering::SeqCst);
    }
}

impl SpaceStorage for InstrumentedStorage {
    fn find_space(&self, space_id: &SpaceId) -> Result<Option<Space>, StorageError> {
        self.count_space_read();
        self.inner.find_space(space_id)
    }

    fn save_space(&self, space: Space) -> Result<(), StorageError> {
        self.inner.save_space(space)
    }

    fn delete_space(&self, space_id: &SpaceId) -> Result<(), StorageError> {
        self.inner.delete_space(space_id)
    }

    fn space_members(&self, space_id: &SpaceId) -> Result<Vec<SpaceMember>, StorageError> {
        self.count_log_read();
        self.inner.space_members(space_id)
    }

    fn save_space_member(&self, member: SpaceMember) -> Result<(), StorageError> {
        self.inner.save_space_member(member)
    }

    fn delete_space_member(
        &self,
        space_id: &SpaceId,
        user_address: &UserAddress,
    ) -> Result<bool, StorageError> {
        self.inner.delete_space_member(space_id, user_address)
    }
}

impl MessageStorage for InstrumentedStorage {
    fn find_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<Option<Message>, StorageError> {
        self.count_log_read();
        self.inner.find_message(space_id, channel_id, message_id)
    }

    fn save_message(&self, message: Message) -> Result<(), StorageError> {
        self.inner.save_message(message)
    }

    fn delete_message(
        &self,
        space_id: &SpaceId,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<bool, StorageError> {
        self.inner.delete_message(space_id, channel_id, message_id)
    }

    fn all_space_messages(&self, space_id: &SpaceId) -> Result<Vec<Message>, StorageError> {
        self.count_log_read();
        self.inner.all_space_messages(space_id)
    }
}

impl EncryptionStateStorage for InstrumentedStorage {
    fn encryption_states(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<EncryptionState>, StorageError> {
        self.inner.encryption_states(conversation_id)
    }

    fn find_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.inner.find_encryption_state(conversation_id, tag)
    }

    fn latest_encryption_state(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<EncryptionState>, StorageError> {
        self.inner.latest_encryption_state(conversation_id)
    }

    fn save_encryption_state(
        &self,
        state: EncryptionState,
        set_latest: bool,
    ) -> Result<(), StorageError> {
        self.inner.save_encryption_state(state, set_latest)
    }

    fn delete_encryption_state(
        &self,
        conversation_id: &ConversationId,
        tag: &str,
    ) -> Result<(), StorageError> {
        self.inner.delete_encryption_state(conversation_id, tag)
    }

    fn find_inbox_mapping(
        &self,
        inbox: &InboxAddress,
    ) -> Result<Option<ConversationId>, StorageError> {
        self.inner.find_inbox_mapping(inbox)
    }

    fn inbox_mappings(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<InboxAddress>, StorageError> {
        self.inner.inbox_mappings(conversation_id)
    }

    fn delete_inbox_mapping(&self, inbox: &InboxAddress) -> Result<(), StorageError> {
        if self.fail_mapping_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Database("injected failure".to_string()));
        }
        self.inner.delete_inbox_mapping(inbox)
    }

    fn delete_latest_state(&self, conversation_id: &ConversationId) -> Result<(), StorageError> {
        self.inner.delete_latest_state(conversation_id)
    }
}

impl UserConfigStorage for InstrumentedStorage {
    fn find_user_config(
        &self,
        user_address: &UserAddress,
    ) -> Result<Option<UserConfig>, StorageError> {
        self.inner.find_user_config(user_address)
    }

    fn save_user_config(&self, config: UserConfig) -> Result<(), StorageError> {
        self.inner.save_user_config(config)
    }
}

impl ActionQueueStorage for InstrumentedStorage {
    fn enqueue_action(&self, new: NewAction) -> Result<EnqueueOutcome, StorageError> {
        self.inner.enqueue_action(new)
    }

    fn find_action(&self, id: &ActionId) -> Result<Option<Action>, StorageError> {
        self.inner.find_action(id)
    }

    fn pending_actions(&self) -> Result<Vec<Action>, StorageError> {
        self.inner.pending_actions()
    }

    fn actions_by_status(
        &self,
        status: ActionStatus,
        limit: usize,
    ) -> Result<Vec<Action>, StorageError> {
        self.inner.actions_by_status(status, limit)
    }

    fn update_action(&self, action: &Action) -> Result<(), StorageError> {
        self.inner.update_action(action)?;
        if action.status == ActionStatus::Pending && action.attempts > 0 {
            let hook = self.on_retry_persisted.lock().take();
            if let Some(hook) = hook {
                hook();
            }
        }
        Ok(())
    }

    fn delete_action(&self, id: &ActionId) -> Result<bool, StorageError> {
        self.inner.delete_action(id)
    }

    fn reset_processing_actions(&self) -> Result<usize, StorageError> {
        self.inner.reset_processing_actions()
    }

    fn queue_stats(&self) -> Result<QueueStats, StorageError> {
        self.inner.queue_stats()
    }

    fn prune_failed_actions(&self, before: Timestamp) -> Result<usize, StorageError> {
        self.inner.prune_failed_actions(before)
    }
}

impl QuorumStorageProvider for InstrumentedStorage {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }
}
