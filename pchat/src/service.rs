//! Streaming turn orchestration: credential failover, incremental rendering,
//! reply normalization, and the conversation commit.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_timer::Delay;
use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable, Either, select};
use pcommon::{BoxFuture, ConversationId, SessionId};
use pprovider::{
    CredentialLease, CredentialPool, ModelProvider, ModelRequest, NoopOperationHooks,
    ProviderOperationHooks, StreamEvent, execute_with_failover,
};

use crate::context::{DEFAULT_CONTEXT_TURNS, DEFAULT_SYSTEM_INSTRUCTION, build_turn_messages};
use crate::{
    ChatError, ChatSessionHooks, Conversation, ConversationMessage, ConversationStore,
    FragmentSink, InMemoryConversationStore, NoopChatHooks, Normalizer, SessionEnd, SessionState,
    TurnRequest, TurnResult, needs_normalization,
};

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPolicy {
    pub model: String,
    pub temperature: f32,
    pub context_turns: usize,
    pub system_instruction: String,
    pub normalize_replies: bool,
    /// Bounds everything from credential selection through normalization.
    pub request_timeout: Option<Duration>,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            context_turns: DEFAULT_CONTEXT_TURNS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            normalize_replies: true,
            request_timeout: None,
        }
    }
}

impl ChatPolicy {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_context_turns(mut self, context_turns: usize) -> Self {
        self.context_turns = context_turns;
        self
    }

    pub fn with_system_instruction(mut self, system_instruction: impl Into<String>) -> Self {
        self.system_instruction = system_instruction.into();
        self
    }

    pub fn with_normalization(mut self, enabled: bool) -> Self {
        self.normalize_replies = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        if self.model.trim().is_empty() {
            return Err(ChatError::invalid_request("model must not be empty"));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::invalid_request(
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ChatError::invalid_request(
                "request_timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

pub struct ChatServiceBuilder {
    provider: Arc<dyn ModelProvider>,
    pool: Arc<CredentialPool>,
    store: Option<Arc<dyn ConversationStore>>,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    session_hooks: Arc<dyn ChatSessionHooks>,
    policy: ChatPolicy,
}

impl ChatServiceBuilder {
    pub fn new(provider: Arc<dyn ModelProvider>, pool: Arc<CredentialPool>) -> Self {
        Self {
            provider,
            pool,
            store: None,
            provider_hooks: Arc::new(NoopOperationHooks),
            session_hooks: Arc::new(NoopChatHooks),
            policy: ChatPolicy::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.provider_hooks = hooks;
        self
    }

    pub fn session_hooks(mut self, hooks: Arc<dyn ChatSessionHooks>) -> Self {
        self.session_hooks = hooks;
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn normalization(mut self, enabled: bool) -> Self {
        self.policy.normalize_replies = enabled;
        self
    }

    pub fn build(self) -> Result<ChatService, ChatError> {
        self.policy.validate()?;

        let normalizer = Normalizer::new(self.provider.clone(), self.policy.model.clone());
        Ok(ChatService {
            provider: self.provider,
            pool: self.pool,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryConversationStore::new())),
            normalizer,
            provider_hooks: self.provider_hooks,
            session_hooks: self.session_hooks,
            policy: self.policy,
        })
    }
}

/// Drives one turn at a time per conversation.
///
/// Running two turns against the same conversation concurrently is not
/// guarded here; callers serialize turns per conversation.
#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
    pool: Arc<CredentialPool>,
    store: Arc<dyn ConversationStore>,
    normalizer: Normalizer,
    provider_hooks: Arc<dyn ProviderOperationHooks>,
    session_hooks: Arc<dyn ChatSessionHooks>,
    policy: ChatPolicy,
}

impl ChatService {
    pub fn builder(provider: Arc<dyn ModelProvider>, pool: Arc<CredentialPool>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(provider, pool)
    }

    pub fn new(
        provider: Arc<dyn ModelProvider>,
        pool: Arc<CredentialPool>,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, ChatError> {
        Self::builder(provider, pool).store(store).build()
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn policy(&self) -> &ChatPolicy {
        &self.policy
    }

    /// Runs one turn to completion, rendering increments into `sink`.
    ///
    /// On failure nothing is written to the store and `sink` is told to retract.
    pub async fn send_turn(
        &self,
        request: TurnRequest,
        sink: &dyn FragmentSink,
    ) -> Result<TurnResult, ChatError> {
        self.run_session(SessionId::generate(), request, sink).await
    }

    /// Like [`ChatService::send_turn`], but can be stopped from elsewhere.
    ///
    /// Aborting discards accumulated content, leaves the store untouched, and
    /// retracts the sink with a `Cancelled` error.
    pub fn abortable_turn<'a>(
        &'a self,
        request: TurnRequest,
        sink: Arc<dyn FragmentSink>,
    ) -> (BoxFuture<'a, Result<TurnResult, ChatError>>, AbortHandle) {
        let (handle, registration) = AbortHandle::new_pair();

        let turn = Box::pin(async move {
            let started = Instant::now();
            let session_id = SessionId::generate();
            let session = self.run_session(session_id.clone(), request, sink.as_ref());

            match Abortable::new(session, registration).await {
                Ok(result) => result,
                Err(_aborted) => {
                    let error = ChatError::cancelled("turn was aborted before it committed");
                    sink.on_session_end(
                        &session_id,
                        SessionEnd::Retracted {
                            error: error.clone(),
                        },
                    );
                    self.session_hooks
                        .on_session_failed(&session_id, &error, started.elapsed());
                    Err(error)
                }
            }
        });

        (turn, handle)
    }

    async fn run_session(
        &self,
        session_id: SessionId,
        request: TurnRequest,
        sink: &dyn FragmentSink,
    ) -> Result<TurnResult, ChatError> {
        if request.user_text.trim().is_empty() {
            return Err(ChatError::invalid_request("user_text must not be empty"));
        }

        let started = Instant::now();
        let mut tracker = SessionTracker::new(session_id.clone(), self.session_hooks.as_ref());

        let outcome = self.run_steps(&mut tracker, request, sink).await;

        match outcome {
            Ok(result) => {
                tracker.transition(SessionState::Committed);
                sink.on_session_end(
                    &session_id,
                    SessionEnd::Committed {
                        text: result.content.clone(),
                    },
                );
                self.session_hooks.on_session_committed(
                    &session_id,
                    &result.conversation_id,
                    result.normalized,
                    started.elapsed(),
                );
                Ok(result)
            }
            Err(error) => {
                tracker.transition(SessionState::Failed);
                sink.on_session_end(
                    &session_id,
                    SessionEnd::Retracted {
                        error: error.clone(),
                    },
                );
                self.session_hooks
                    .on_session_failed(&session_id, &error, started.elapsed());
                Err(error)
            }
        }
    }

    async fn run_steps(
        &self,
        tracker: &mut SessionTracker<'_>,
        request: TurnRequest,
        sink: &dyn FragmentSink,
    ) -> Result<TurnResult, ChatError> {
        let existing = match &request.conversation_id {
            Some(id) => Some(self.store.get(id).await?.ok_or_else(|| {
                ChatError::conversation_not_found(format!("conversation '{id}' not found"))
            })?),
            None => None,
        };

        let context = existing
            .clone()
            .unwrap_or_else(|| Conversation::new(ConversationId::new("pending")));
        let messages = build_turn_messages(
            &self.policy.system_instruction,
            &context,
            self.policy.context_turns,
            &request.user_text,
        );
        let model_request = ModelRequest::new(self.policy.model.clone(), messages)
            .with_temperature(self.policy.temperature)
            .with_options(request.options)
            .enable_streaming();
        model_request.validate()?;

        let reply = with_timeout(
            self.policy.request_timeout,
            self.produce_reply(tracker, model_request, sink),
        )
        .await?;

        let mut batch = vec![ConversationMessage::user(request.user_text)];
        if !reply.content.is_empty() {
            batch.push(ConversationMessage::assistant(reply.content.clone()));
        }
        let conversation_id = self
            .commit(
                &tracker.session_id,
                existing.map(|conversation| conversation.id),
                batch,
            )
            .await?;

        Ok(TurnResult {
            conversation_id,
            session_id: tracker.session_id.clone(),
            content: reply.content,
            normalized: reply.normalized,
        })
    }

    /// Credential selection, streaming, and normalization.
    async fn produce_reply(
        &self,
        tracker: &mut SessionTracker<'_>,
        model_request: ModelRequest,
        sink: &dyn FragmentSink,
    ) -> Result<Reply, ChatError> {
        let (lease, mut events) = execute_with_failover(
            "stream",
            &self.pool,
            self.provider_hooks.as_ref(),
            |lease| {
                tracker.transition(SessionState::KeySelected);
                tracker.transition(SessionState::Requesting);
                self.provider.stream(model_request.clone(), lease)
            },
        )
        .await?;

        tracker.transition(SessionState::Streaming);
        let mut content = String::new();
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::TextDelta(fragment) => {
                    content.push_str(&fragment);
                    self.session_hooks
                        .on_fragment(&tracker.session_id, content.len());
                    sink.on_fragment_update(&tracker.session_id, &content);
                }
                StreamEvent::FrameSkipped { reason } => {
                    self.session_hooks
                        .on_frame_skipped(&tracker.session_id, &reason);
                }
            }
        }
        drop(events);

        tracker.transition(SessionState::Finalizing);
        self.finalize(&tracker.session_id, content, lease, sink).await
    }

    async fn finalize(
        &self,
        session_id: &SessionId,
        content: String,
        lease: CredentialLease,
        sink: &dyn FragmentSink,
    ) -> Result<Reply, ChatError> {
        if !self.policy.normalize_replies || !needs_normalization(&content) {
            return Ok(Reply {
                content,
                normalized: false,
            });
        }

        match self.normalizer.normalize(&content, lease).await {
            Ok(translated) => {
                sink.on_fragment_update(session_id, &translated);
                Ok(Reply {
                    content: translated,
                    normalized: true,
                })
            }
            Err(error) => {
                self.session_hooks.on_normalization_failed(session_id, &error);
                Ok(Reply {
                    content,
                    normalized: false,
                })
            }
        }
    }

    async fn commit(
        &self,
        session_id: &SessionId,
        existing: Option<ConversationId>,
        batch: Vec<ConversationMessage>,
    ) -> Result<ConversationId, ChatError> {
        if let Some(id) = existing {
            self.store.append_messages(&id, batch).await?;
            return Ok(id);
        }

        let created = self.store.create().await?;
        if let Err(error) = self.store.append_messages(&created.id, batch).await {
            if let Err(cleanup) = self.store.delete(&created.id).await {
                self.session_hooks
                    .on_orphaned_conversation(session_id, &created.id, &cleanup);
            }
            return Err(error);
        }

        Ok(created.id)
    }
}

struct Reply {
    content: String,
    normalized: bool,
}

struct SessionTracker<'h> {
    session_id: SessionId,
    state: SessionState,
    hooks: &'h dyn ChatSessionHooks,
}

impl<'h> SessionTracker<'h> {
    fn new(session_id: SessionId, hooks: &'h dyn ChatSessionHooks) -> Self {
        Self {
            session_id,
            state: SessionState::Idle,
            hooks,
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        self.hooks.on_transition(&self.session_id, from, to);
    }
}

async fn with_timeout<T, F>(timeout: Option<Duration>, work: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, ChatError>>,
{
    let Some(limit) = timeout else {
        return work.await;
    };

    match select(pin!(work), Delay::new(limit)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(ChatError::request_failed(format!(
            "no complete reply within {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures_util::stream;
    use pprovider::{
        BoxedEventStream, ModelResponse, ProviderError, ProviderFuture, QuotaPolicy,
        VecEventStream,
    };

    use super::*;
    use crate::{ChatErrorKind, ChatFuture, MessageRole, NoopSink};

    enum Script {
        Unauthorized,
        Status(u16),
        Events(Vec<Result<StreamEvent, ProviderError>>),
        Hang,
    }

    fn fragments(parts: &[&str]) -> Script {
        Script::Events(
            parts
                .iter()
                .map(|part| Ok(StreamEvent::TextDelta(part.to_string())))
                .collect(),
        )
    }

    struct ScriptedProvider {
        scripts: Mutex<VecDeque<Script>>,
        translation: Result<String, ProviderError>,
        streamed: Mutex<Vec<(ModelRequest, String)>>,
        completed: Mutex<Vec<(ModelRequest, String)>>,
    }

    impl ScriptedProvider {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                translation: Ok("翻译后的回答".to_string()),
                streamed: Mutex::new(Vec::new()),
                completed: Mutex::new(Vec::new()),
            }
        }

        fn with_translation(mut self, translation: Result<String, ProviderError>) -> Self {
            self.translation = translation;
            self
        }

        fn streamed_tokens(&self) -> Vec<String> {
            self.streamed
                .lock()
                .expect("streamed lock")
                .iter()
                .map(|(_, token)| token.clone())
                .collect()
        }
    }

    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete<'a>(
            &'a self,
            request: ModelRequest,
            credential: CredentialLease,
        ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
            Box::pin(async move {
                let model = request.model.clone();
                self.completed
                    .lock()
                    .expect("completed lock")
                    .push((request, credential.expose().to_string()));
                self.translation
                    .clone()
                    .map(|content| ModelResponse { model, content })
            })
        }

        fn stream<'a>(
            &'a self,
            request: ModelRequest,
            credential: CredentialLease,
        ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
            Box::pin(async move {
                self.streamed
                    .lock()
                    .expect("streamed lock")
                    .push((request, credential.expose().to_string()));
                let script = self
                    .scripts
                    .lock()
                    .expect("scripts lock")
                    .pop_front()
                    .unwrap_or(Script::Events(Vec::new()));

                match script {
                    Script::Unauthorized => {
                        Err(ProviderError::from_status(401, "Invalid API Key"))
                    }
                    Script::Status(status) => Err(ProviderError::from_status(status, "failed")),
                    Script::Events(events) => {
                        Ok(Box::pin(VecEventStream::new(events)) as BoxedEventStream<'a>)
                    }
                    Script::Hang => Ok(Box::pin(
                        stream::pending::<Result<StreamEvent, ProviderError>>(),
                    ) as BoxedEventStream<'a>),
                }
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<String>>,
        ends: Mutex<Vec<SessionEnd>>,
    }

    impl RecordingSink {
        fn updates(&self) -> Vec<String> {
            self.updates.lock().expect("updates lock").clone()
        }

        fn ends(&self) -> Vec<SessionEnd> {
            self.ends.lock().expect("ends lock").clone()
        }
    }

    impl FragmentSink for RecordingSink {
        fn on_fragment_update(&self, _session_id: &SessionId, full_text: &str) {
            self.updates
                .lock()
                .expect("updates lock")
                .push(full_text.to_string());
        }

        fn on_session_end(&self, _session_id: &SessionId, end: SessionEnd) {
            self.ends.lock().expect("ends lock").push(end);
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        transitions: Mutex<Vec<SessionState>>,
        skipped: Mutex<Vec<String>>,
        normalization_failures: Mutex<usize>,
        orphans: Mutex<Vec<ConversationId>>,
    }

    impl ChatSessionHooks for RecordingHooks {
        fn on_transition(&self, _session_id: &SessionId, _from: SessionState, to: SessionState) {
            self.transitions.lock().expect("transitions lock").push(to);
        }

        fn on_frame_skipped(&self, _session_id: &SessionId, reason: &str) {
            self.skipped
                .lock()
                .expect("skipped lock")
                .push(reason.to_string());
        }

        fn on_normalization_failed(&self, _session_id: &SessionId, _error: &ChatError) {
            *self
                .normalization_failures
                .lock()
                .expect("failures lock") += 1;
        }

        fn on_orphaned_conversation(
            &self,
            _session_id: &SessionId,
            conversation_id: &ConversationId,
            _error: &ChatError,
        ) {
            self.orphans
                .lock()
                .expect("orphans lock")
                .push(conversation_id.clone());
        }
    }

    /// Creates conversations but refuses every write after that.
    struct ReadOnlyStore;

    impl ConversationStore for ReadOnlyStore {
        fn create<'a>(&'a self) -> ChatFuture<'a, Result<Conversation, ChatError>> {
            Box::pin(async { Ok(Conversation::new(ConversationId::from("stranded"))) })
        }

        fn get<'a>(
            &'a self,
            _id: &'a ConversationId,
        ) -> ChatFuture<'a, Result<Option<Conversation>, ChatError>> {
            Box::pin(async { Ok(None) })
        }

        fn list<'a>(&'a self) -> ChatFuture<'a, Result<Vec<Conversation>, ChatError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn append_messages<'a>(
            &'a self,
            _id: &'a ConversationId,
            _messages: Vec<ConversationMessage>,
        ) -> ChatFuture<'a, Result<(), ChatError>> {
            Box::pin(async { Err(ChatError::store("disk is read-only")) })
        }

        fn delete<'a>(
            &'a self,
            _id: &'a ConversationId,
        ) -> ChatFuture<'a, Result<bool, ChatError>> {
            Box::pin(async { Err(ChatError::store("disk is read-only")) })
        }
    }

    struct Fixture {
        provider: Arc<ScriptedProvider>,
        pool: Arc<CredentialPool>,
        store: Arc<InMemoryConversationStore>,
        hooks: Arc<RecordingHooks>,
        service: ChatService,
    }

    fn fixture(provider: ScriptedProvider, tokens: &[&str], policy: ChatPolicy) -> Fixture {
        let provider = Arc::new(provider);
        let pool = Arc::new(CredentialPool::new(tokens.iter().copied()).expect("pool"));
        let store = Arc::new(InMemoryConversationStore::new());
        let hooks = Arc::new(RecordingHooks::default());
        let service = ChatService::builder(provider.clone(), pool.clone())
            .store(store.clone())
            .session_hooks(hooks.clone())
            .policy(policy)
            .build()
            .expect("service should build");

        Fixture {
            provider,
            pool,
            store,
            hooks,
            service,
        }
    }

    fn without_normalization() -> ChatPolicy {
        ChatPolicy::default().with_normalization(false)
    }

    #[tokio::test]
    async fn sink_receives_whole_accumulated_content_each_time() {
        let f = fixture(
            ScriptedProvider::new(vec![fragments(&["He", "llo", " world"])]),
            &["gsk-a"],
            without_normalization(),
        );
        let sink = RecordingSink::default();

        let result = f
            .service
            .send_turn(TurnRequest::new("Say hello"), &sink)
            .await
            .expect("turn should commit");

        assert_eq!(result.content, "Hello world");
        assert_eq!(sink.updates(), vec!["He", "Hello", "Hello world"]);
        assert_eq!(
            sink.ends(),
            vec![SessionEnd::Committed {
                text: "Hello world".to_string()
            }]
        );
        assert_eq!(
            *f.hooks.transitions.lock().expect("transitions lock"),
            vec![
                SessionState::KeySelected,
                SessionState::Requesting,
                SessionState::Streaming,
                SessionState::Finalizing,
                SessionState::Committed,
            ]
        );
    }

    #[tokio::test]
    async fn first_turn_creates_titled_conversation_with_both_messages() {
        let f = fixture(
            ScriptedProvider::new(vec![fragments(&["递归是", "函数调用自身。"])]),
            &["gsk-a"],
            ChatPolicy::default(),
        );

        let result = f
            .service
            .send_turn(TurnRequest::new("Explain recursion"), &NoopSink)
            .await
            .expect("turn should commit");
        assert!(!result.normalized);

        let saved = f
            .store
            .get(&result.conversation_id)
            .await
            .expect("get")
            .expect("conversation created");
        assert_eq!(saved.title, "Explain recursion");
        assert_eq!(
            saved.messages,
            vec![
                ConversationMessage::user("Explain recursion"),
                ConversationMessage::assistant("递归是函数调用自身。"),
            ]
        );
        assert!(f.provider.completed.lock().expect("completed lock").is_empty());
    }

    #[tokio::test]
    async fn request_carries_instruction_recent_context_and_new_turn() {
        let f = fixture(
            ScriptedProvider::new(vec![fragments(&["好的"])]),
            &["gsk-a"],
            ChatPolicy::default(),
        );
        let conversation = f.store.create().await.expect("create");
        let history = (0..7)
            .map(|index| ConversationMessage::user(format!("m{index}")))
            .collect::<Vec<_>>();
        f.store
            .append_messages(&conversation.id, history)
            .await
            .expect("seed");

        f.service
            .send_turn(
                TurnRequest::new("next").in_conversation(conversation.id.clone()),
                &NoopSink,
            )
            .await
            .expect("turn should commit");

        let streamed = f.provider.streamed.lock().expect("streamed lock");
        let (request, _) = &streamed[0];
        assert!(request.stream);
        assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.messages[0].content, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(request.messages[1].content, "m2");
        assert_eq!(request.messages[6].content, "next");

        let saved = f
            .store
            .get(&conversation.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(saved.messages.len(), 9);
        assert_eq!(saved.title, "m0");
    }

    #[tokio::test]
    async fn english_reply_is_normalized_with_the_same_credential() {
        let f = fixture(
            ScriptedProvider::new(vec![fragments(&["Recursion is ", "a function calling itself."])]),
            &["gsk-only"],
            ChatPolicy::default(),
        );
        let sink = RecordingSink::default();

        let result = f
            .service
            .send_turn(TurnRequest::new("Explain recursion"), &sink)
            .await
            .expect("turn should commit");

        assert!(result.normalized);
        assert_eq!(result.content, "翻译后的回答");
        assert_eq!(sink.updates().last().map(String::as_str), Some("翻译后的回答"));

        let completed = f.provider.completed.lock().expect("completed lock");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1, "gsk-only");
        assert_eq!(completed[0].0.temperature, Some(0.3));

        let saved = f
            .store
            .get(&result.conversation_id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(saved.messages[1].content, "翻译后的回答");
    }

    #[tokio::test]
    async fn failed_normalization_keeps_original_and_commits() {
        let f = fixture(
            ScriptedProvider::new(vec![fragments(&["Plain English answer"])])
                .with_translation(Err(ProviderError::from_status(503, "busy"))),
            &["gsk-a"],
            ChatPolicy::default(),
        );

        let result = f
            .service
            .send_turn(TurnRequest::new("question"), &NoopSink)
            .await
            .expect("turn should still commit");

        assert!(!result.normalized);
        assert_eq!(result.content, "Plain English answer");
        assert_eq!(*f.hooks.normalization_failures.lock().expect("lock"), 1);
    }

    #[tokio::test]
    async fn rejected_credential_fails_over_to_the_next_one() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Unauthorized, fragments(&["好"])]),
            &["gsk-a", "gsk-b"],
            without_normalization(),
        );

        let result = f
            .service
            .send_turn(TurnRequest::new("hi"), &NoopSink)
            .await
            .expect("failover should succeed");

        assert_eq!(result.content, "好");
        let tokens = f.provider.streamed_tokens();
        assert_eq!(tokens.len(), 2);
        assert_ne!(tokens[0], tokens[1]);
        assert_eq!(f.pool.len().expect("len"), 1);
    }

    #[tokio::test]
    async fn every_credential_rejected_exhausts_pool_without_commit() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Unauthorized, Script::Unauthorized]),
            &["gsk-a", "gsk-b"],
            without_normalization(),
        );
        let sink = RecordingSink::default();

        let error = f
            .service
            .send_turn(TurnRequest::new("hi"), &sink)
            .await
            .expect_err("turn should fail");

        assert_eq!(error.kind, ChatErrorKind::AllCredentialsExhausted);
        assert!(f.pool.is_empty().expect("is_empty"));
        assert!(f.store.list().await.expect("list").is_empty());
        assert!(matches!(sink.ends()[..], [SessionEnd::Retracted { .. }]));
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Status(500)]),
            &["gsk-a", "gsk-b"],
            without_normalization(),
        );

        let error = f
            .service
            .send_turn(TurnRequest::new("hi"), &NoopSink)
            .await
            .expect_err("turn should fail");

        assert_eq!(error.kind, ChatErrorKind::RequestFailed);
        assert_eq!(error.status, Some(500));
        assert_eq!(f.provider.streamed_tokens().len(), 1);
        assert_eq!(f.pool.len().expect("len"), 2);
    }

    #[tokio::test]
    async fn partial_stream_failure_appends_nothing_and_retracts() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Events(vec![
                Ok(StreamEvent::TextDelta("部分".to_string())),
                Err(ProviderError::transport("connection reset")),
            ])]),
            &["gsk-a"],
            without_normalization(),
        );
        let conversation = f.store.create().await.expect("create");
        let sink = RecordingSink::default();

        let error = f
            .service
            .send_turn(
                TurnRequest::new("hi").in_conversation(conversation.id.clone()),
                &sink,
            )
            .await
            .expect_err("turn should fail");

        assert_eq!(error.kind, ChatErrorKind::RequestFailed);
        assert_eq!(sink.updates(), vec!["部分"]);
        assert!(matches!(sink.ends()[..], [SessionEnd::Retracted { .. }]));
        let saved = f
            .store
            .get(&conversation.id)
            .await
            .expect("get")
            .expect("exists");
        assert!(saved.messages.is_empty());
        assert_eq!(
            f.hooks.transitions.lock().expect("lock").last(),
            Some(&SessionState::Failed)
        );
    }

    #[tokio::test]
    async fn failed_cleanup_of_new_conversation_is_reported() {
        let provider = Arc::new(ScriptedProvider::new(vec![fragments(&["好"])]));
        let pool = Arc::new(CredentialPool::new(["gsk-a"]).expect("pool"));
        let hooks = Arc::new(RecordingHooks::default());
        let service = ChatService::builder(provider, pool)
            .store(Arc::new(ReadOnlyStore))
            .session_hooks(hooks.clone())
            .policy(without_normalization())
            .build()
            .expect("service should build");
        let sink = RecordingSink::default();

        let error = service
            .send_turn(TurnRequest::new("hi"), &sink)
            .await
            .expect_err("commit should fail");

        assert_eq!(error.kind, ChatErrorKind::Store);
        assert_eq!(
            *hooks.orphans.lock().expect("orphans lock"),
            vec![ConversationId::from("stranded")]
        );
        assert!(matches!(sink.ends()[..], [SessionEnd::Retracted { .. }]));
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped_and_reported() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Events(vec![
                Ok(StreamEvent::TextDelta("你".to_string())),
                Ok(StreamEvent::FrameSkipped {
                    reason: "expected value at line 1".to_string(),
                }),
                Ok(StreamEvent::TextDelta("好".to_string())),
            ])]),
            &["gsk-a"],
            ChatPolicy::default(),
        );

        let result = f
            .service
            .send_turn(TurnRequest::new("hi"), &NoopSink)
            .await
            .expect("turn should commit");

        assert_eq!(result.content, "你好");
        assert_eq!(f.hooks.skipped.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn exhausted_quota_fails_without_request() {
        let provider = Arc::new(ScriptedProvider::new(vec![fragments(&["unused"])]));
        let pool = Arc::new(
            CredentialPool::new(["gsk-a"])
                .expect("pool")
                .with_policy(QuotaPolicy {
                    max_calls_per_window: 1,
                    window: Duration::from_secs(60),
                }),
        );
        pool.acquire().expect("first use");
        let service = ChatService::builder(provider.clone(), pool)
            .build()
            .expect("service");

        let error = service
            .send_turn(TurnRequest::new("hi"), &NoopSink)
            .await
            .expect_err("quota should be exhausted");

        assert_eq!(error.kind, ChatErrorKind::QuotaExhausted);
        assert!(provider.streamed_tokens().is_empty());
    }

    #[tokio::test]
    async fn blank_text_and_unknown_conversation_are_rejected() {
        let f = fixture(ScriptedProvider::new(Vec::new()), &["gsk-a"], ChatPolicy::default());

        let blank = f
            .service
            .send_turn(TurnRequest::new("  \n"), &NoopSink)
            .await
            .expect_err("blank should fail");
        assert_eq!(blank.kind, ChatErrorKind::InvalidRequest);

        let missing = f
            .service
            .send_turn(TurnRequest::new("hi").in_conversation("conv-missing"), &NoopSink)
            .await
            .expect_err("unknown conversation should fail");
        assert_eq!(missing.kind, ChatErrorKind::ConversationNotFound);
        assert!(f.provider.streamed_tokens().is_empty());
        assert_eq!(f.pool.available().expect("available"), 1);
    }

    #[tokio::test]
    async fn empty_reply_commits_only_the_user_message() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Events(Vec::new())]),
            &["gsk-a"],
            ChatPolicy::default(),
        );

        let result = f
            .service
            .send_turn(TurnRequest::new("hi"), &NoopSink)
            .await
            .expect("turn should commit");

        let saved = f
            .store
            .get(&result.conversation_id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(saved.messages.len(), 1);
        assert_eq!(saved.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn request_timeout_fails_the_turn() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Hang]),
            &["gsk-a"],
            ChatPolicy::default().with_request_timeout(Duration::from_millis(50)),
        );
        let sink = RecordingSink::default();

        let error = f
            .service
            .send_turn(TurnRequest::new("hi"), &sink)
            .await
            .expect_err("turn should time out");

        assert_eq!(error.kind, ChatErrorKind::RequestFailed);
        assert_eq!(error.status, None);
        assert!(matches!(sink.ends()[..], [SessionEnd::Retracted { .. }]));
        assert!(f.store.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn aborted_turn_is_cancelled_and_retracted() {
        let f = fixture(
            ScriptedProvider::new(vec![Script::Hang]),
            &["gsk-a"],
            ChatPolicy::default(),
        );
        let sink = Arc::new(RecordingSink::default());

        let (turn, handle) = f.service.abortable_turn(TurnRequest::new("hi"), sink.clone());
        let (outcome, ()) = tokio::join!(turn, async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.abort();
        });

        let error = outcome.expect_err("turn should be cancelled");
        assert_eq!(error.kind, ChatErrorKind::Cancelled);
        assert!(matches!(
            sink.ends()[..],
            [SessionEnd::Retracted {
                error: ChatError {
                    kind: ChatErrorKind::Cancelled,
                    ..
                }
            }]
        ));
        assert!(f.store.list().await.expect("list").is_empty());
    }

    #[test]
    fn policy_validation_rejects_bad_settings() {
        assert!(ChatPolicy::default().validate().is_ok());
        assert!(ChatPolicy::default().with_model(" ").validate().is_err());
        assert!(ChatPolicy::default().with_temperature(3.0).validate().is_err());
        assert!(
            ChatPolicy::default()
                .with_request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
