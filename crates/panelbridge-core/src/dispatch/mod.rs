//! Request dispatcher.
//!
//! Receives normalized chat requests from the panel, validates any
//! attachment against the selected model, hands the request to the
//! matching provider adapter, and relays outcome events back to the
//! panel channel in arrival order.
//!
//! One request is in flight at a time; a second submission while busy is
//! rejected with a failure reply and leaves the running request alone.
//! The dispatcher never synthesizes a terminal success — it forwards the
//! adapter's terminal, or reports its own pre-adapter rejection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::{MediaKind, ModelCatalog, ProviderKind};
use crate::error::BridgeError;
use crate::media::{self, MediaAttachment};
use crate::provider::{ChatAdapter, ChatOutcome};
use crate::relay::events::{PanelCommand, PanelReply};
use crate::relay::PanelChannel;

/// A normalized chat request. Constructed fresh per panel submission,
/// never persisted; the attachment lives here rather than in any
/// process-wide state, so sessions stay independent.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub provider: ProviderKind,
    pub model_key: Option<String>,
    pub media: Option<MediaAttachment>,
}

/// Adapter table: one implementation per provider kind. Selection is an
/// exhaustive match, so adding a provider forces a row here.
pub struct AdapterSet {
    pub local: Arc<dyn ChatAdapter>,
    pub multimodal: Arc<dyn ChatAdapter>,
    pub host: Arc<dyn ChatAdapter>,
}

impl AdapterSet {
    fn select(&self, provider: ProviderKind) -> &Arc<dyn ChatAdapter> {
        match provider {
            ProviderKind::LocalModel => &self.local,
            ProviderKind::HostedMultimodal => &self.multimodal,
            ProviderKind::HostModel => &self.host,
        }
    }
}

/// Fallbacks applied when the panel omits the provider or model key.
#[derive(Debug, Clone)]
pub struct DispatchDefaults {
    pub provider: ProviderKind,
    pub model_key: Option<String>,
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            provider: ProviderKind::LocalModel,
            model_key: None,
        }
    }
}

pub struct Dispatcher {
    catalog: Arc<ModelCatalog>,
    adapters: AdapterSet,
    channel: Arc<dyn PanelChannel>,
    defaults: DispatchDefaults,
    busy: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        adapters: AdapterSet,
        channel: Arc<dyn PanelChannel>,
        defaults: DispatchDefaults,
    ) -> Self {
        Self {
            catalog,
            adapters,
            channel,
            defaults,
            busy: AtomicBool::new(false),
        }
    }

    /// Handle one raw panel message. Non-`chat` commands are ignored;
    /// tag parsing failures are relayed as failures without touching an
    /// adapter.
    pub async fn handle_message(&self, cmd: PanelCommand, cancel: CancellationToken) {
        if cmd.command != "chat" {
            debug!(command = %cmd.command, "ignoring unrecognized panel command");
            return;
        }

        let provider = match cmd.model.as_deref() {
            None => self.defaults.provider,
            Some(tag) => match ProviderKind::parse_tag(tag) {
                Some(p) => p,
                None => {
                    self.relay_failure(BridgeError::UnknownProvider(tag.to_string()).to_string())
                        .await;
                    return;
                }
            },
        };

        let media = match media_from_command(&cmd) {
            Ok(m) => m,
            Err(e) => {
                self.relay_failure(e.to_string()).await;
                return;
            }
        };

        let request = ChatRequest {
            prompt: cmd.text,
            provider,
            model_key: cmd.model_key.or_else(|| self.defaults.model_key.clone()),
            media,
        };
        self.dispatch(request, cancel).await;
    }

    /// Run one normalized request through validation, the adapter, and
    /// the relay. Rejects with a failure reply when already busy.
    pub async fn dispatch(&self, request: ChatRequest, cancel: CancellationToken) {
        if self.busy.swap(true, Ordering::SeqCst) {
            warn!("rejecting chat request while another is in flight");
            self.relay_failure(
                "a request is already in flight, try again when it completes".into(),
            )
            .await;
            return;
        }

        self.run(request, cancel).await;
        self.busy.store(false, Ordering::SeqCst);
    }

    async fn run(&self, request: ChatRequest, cancel: CancellationToken) {
        debug!(provider = %request.provider, has_media = request.media.is_some(), "dispatching chat request");

        let descriptor = match self
            .catalog
            .lookup(request.provider, request.model_key.as_deref())
        {
            Ok(d) => d,
            Err(e) => return self.relay_failure(e.to_string()).await,
        };

        if let Some(media) = &request.media {
            if let Err(e) = media::validate(media, descriptor) {
                return self.relay_failure(e.to_string()).await;
            }
        }

        let media_type = request.media.as_ref().map(|m| m.kind.tag().to_string());
        let adapter = self.adapters.select(request.provider);
        let mut outcomes = adapter
            .send(&request.prompt, request.media.as_ref(), descriptor, cancel)
            .await;

        while let Some(outcome) = outcomes.next().await {
            let terminal = outcome.is_terminal();
            self.relay(outcome, media_type.clone()).await;
            if terminal {
                // At most one terminal per request; drop anything after.
                break;
            }
        }
    }

    async fn relay(&self, outcome: ChatOutcome, media_type: Option<String>) {
        let reply = match outcome {
            ChatOutcome::Partial(text) | ChatOutcome::Final(text) => {
                PanelReply::chat_response(text, media_type)
            }
            ChatOutcome::Failure(message) => PanelReply::error(message),
        };
        if self.channel.post(reply).await.is_err() {
            debug!("panel channel disposed, dropping outcome");
        }
    }

    async fn relay_failure(&self, message: String) {
        self.relay(ChatOutcome::Failure(message), None).await;
    }
}

/// Build the request-scoped attachment from the raw panel fields.
fn media_from_command(cmd: &PanelCommand) -> Result<Option<MediaAttachment>, BridgeError> {
    let Some(data_url) = cmd.media_data.clone() else {
        return Ok(None);
    };

    // `mediaType` may be a bare kind tag or a full MIME type.
    let type_tag = cmd.media_type.as_deref().ok_or_else(|| {
        BridgeError::MalformedMediaEncoding("attachment is missing its media type".into())
    })?;
    let kind_tag = type_tag.split('/').next().unwrap_or(type_tag);
    let kind = MediaKind::parse_tag(kind_tag).ok_or_else(|| {
        BridgeError::MalformedMediaEncoding(format!("unrecognized media type `{type_tag}`"))
    })?;

    Ok(Some(MediaAttachment { data_url, kind }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::provider::OutcomeStream;
    use crate::relay::ChannelClosed;

    // ── Test doubles ────────────────────────────────────────────────

    struct CapturingPanel {
        replies: Mutex<Vec<PanelReply>>,
    }

    impl CapturingPanel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(Vec::new()),
            })
        }

        fn replies(&self) -> Vec<PanelReply> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PanelChannel for CapturingPanel {
        async fn post(&self, reply: PanelReply) -> Result<(), ChannelClosed> {
            self.replies.lock().unwrap().push(reply);
            Ok(())
        }
    }

    struct DisposedPanel;

    #[async_trait]
    impl PanelChannel for DisposedPanel {
        async fn post(&self, _reply: PanelReply) -> Result<(), ChannelClosed> {
            Err(ChannelClosed)
        }
    }

    /// Deterministic adapter that replays a fixed outcome script.
    struct ScriptedAdapter {
        script: Vec<ChatOutcome>,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<ChatOutcome>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatAdapter for ScriptedAdapter {
        async fn send(
            &self,
            _prompt: &str,
            _media: Option<&MediaAttachment>,
            _descriptor: &crate::catalog::ModelDescriptor,
            _cancel: CancellationToken,
        ) -> OutcomeStream {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(futures::stream::iter(self.script.clone()))
        }
    }

    /// Adapter whose terminal waits for an external signal, for testing
    /// the busy policy.
    struct PendingAdapter {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl ChatAdapter for PendingAdapter {
        async fn send(
            &self,
            _prompt: &str,
            _media: Option<&MediaAttachment>,
            _descriptor: &crate::catalog::ModelDescriptor,
            _cancel: CancellationToken,
        ) -> OutcomeStream {
            let gate = Arc::clone(&self.gate);
            Box::pin(async_stream::stream! {
                gate.notified().await;
                yield ChatOutcome::Final("ok".into());
            })
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn dispatcher(
        local: Arc<dyn ChatAdapter>,
        multimodal: Arc<dyn ChatAdapter>,
        host: Arc<dyn ChatAdapter>,
        channel: Arc<dyn PanelChannel>,
    ) -> Dispatcher {
        Dispatcher::new(
            Arc::new(ModelCatalog::builtin()),
            AdapterSet {
                local,
                multimodal,
                host,
            },
            channel,
            DispatchDefaults::default(),
        )
    }

    fn request(provider: ProviderKind) -> ChatRequest {
        ChatRequest {
            prompt: "hello".into(),
            provider,
            model_key: None,
            media: None,
        }
    }

    fn final_only(text: &str) -> Vec<ChatOutcome> {
        vec![ChatOutcome::Final(text.into())]
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_routes_to_matching_adapter_only() {
        let local = ScriptedAdapter::new(final_only("from local"));
        let multimodal = ScriptedAdapter::new(final_only("from gemini"));
        let host = ScriptedAdapter::new(final_only("from host"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local.clone(),
            multimodal.clone(),
            host.clone(),
            panel.clone(),
        );

        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;

        assert_eq!(local.calls(), 1);
        assert_eq!(multimodal.calls(), 0);
        assert_eq!(host.calls(), 0);
        assert_eq!(
            panel.replies(),
            vec![PanelReply::chat_response("from local", None)]
        );
    }

    #[tokio::test]
    async fn test_unsupported_media_kind_never_reaches_adapter() {
        let local = ScriptedAdapter::new(final_only("unused"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local.clone(),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let mut req = request(ProviderKind::LocalModel);
        req.media = Some(MediaAttachment {
            data_url: "data:image/png;base64,AAAA".into(),
            kind: MediaKind::Image,
        });
        d.dispatch(req, CancellationToken::new()).await;

        assert_eq!(local.calls(), 0);
        let replies = panel.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].command, "error");
        assert!(replies[0].text.contains("does not accept image"));
    }

    #[tokio::test]
    async fn test_partials_relayed_in_order_then_terminal() {
        let local = ScriptedAdapter::new(vec![
            ChatOutcome::Partial("Hel".into()),
            ChatOutcome::Partial("Hello".into()),
            ChatOutcome::Final("Hello".into()),
        ]);
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local,
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;

        assert_eq!(
            panel.replies(),
            vec![
                PanelReply::chat_response("Hel", None),
                PanelReply::chat_response("Hello", None),
                PanelReply::chat_response("Hello", None),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_relayed_after_terminal() {
        let local = ScriptedAdapter::new(vec![
            ChatOutcome::Final("done".into()),
            ChatOutcome::Partial("late".into()),
        ]);
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local,
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;

        assert_eq!(panel.replies(), vec![PanelReply::chat_response("done", None)]);
    }

    #[tokio::test]
    async fn test_unknown_model_key_is_relayed_failure() {
        let local = ScriptedAdapter::new(final_only("unused"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local.clone(),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let mut req = request(ProviderKind::LocalModel);
        req.model_key = Some("gpt-99".into());
        d.dispatch(req, CancellationToken::new()).await;

        assert_eq!(local.calls(), 0);
        let replies = panel.replies();
        assert_eq!(replies[0].command, "error");
        assert!(replies[0].text.contains("unknown model"));
    }

    #[tokio::test]
    async fn test_unknown_provider_tag_rejected_before_dispatch() {
        let local = ScriptedAdapter::new(final_only("unused"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local.clone(),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let cmd: PanelCommand =
            serde_json::from_str(r#"{"command":"chat","text":"hi","model":"claude"}"#).unwrap();
        d.handle_message(cmd, CancellationToken::new()).await;

        assert_eq!(local.calls(), 0);
        let replies = panel.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].command, "error");
        assert!(replies[0].text.contains("unknown provider `claude`"));
    }

    #[tokio::test]
    async fn test_unrecognized_command_ignored() {
        let panel = CapturingPanel::new();
        let d = dispatcher(
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let cmd: PanelCommand =
            serde_json::from_str(r#"{"command":"resize","text":"ignored"}"#).unwrap();
        d.handle_message(cmd, CancellationToken::new()).await;

        assert!(panel.replies().is_empty());
    }

    #[tokio::test]
    async fn test_omitted_provider_uses_default() {
        let local = ScriptedAdapter::new(final_only("default path"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local.clone(),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let cmd: PanelCommand =
            serde_json::from_str(r#"{"command":"chat","text":"hi"}"#).unwrap();
        d.handle_message(cmd, CancellationToken::new()).await;

        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn test_media_request_echoes_media_type() {
        let multimodal = ScriptedAdapter::new(final_only("a picture of a crab"));
        let panel = CapturingPanel::new();
        let d = dispatcher(
            ScriptedAdapter::new(vec![]),
            multimodal.clone(),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        let cmd: PanelCommand = serde_json::from_str(
            r#"{
                "command": "chat",
                "text": "what is this",
                "model": "gemini",
                "modelKey": "flash",
                "mediaData": "data:image/png;base64,AAAA",
                "mediaType": "image/png"
            }"#,
        )
        .unwrap();
        d.handle_message(cmd, CancellationToken::new()).await;

        assert_eq!(multimodal.calls(), 1);
        assert_eq!(
            panel.replies(),
            vec![PanelReply::chat_response(
                "a picture of a crab",
                Some("image".into())
            )]
        );
    }

    #[tokio::test]
    async fn test_disposed_channel_is_absorbed() {
        let local = ScriptedAdapter::new(vec![
            ChatOutcome::Partial("Hel".into()),
            ChatOutcome::Final("Hello".into()),
        ]);
        let d = dispatcher(
            local.clone(),
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            Arc::new(DisposedPanel),
        );

        // Must complete without panicking even though every post fails.
        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn test_second_request_rejected_while_busy() {
        let gate = Arc::new(Notify::new());
        let local = Arc::new(PendingAdapter {
            gate: Arc::clone(&gate),
        });
        let panel = CapturingPanel::new();
        let d = Arc::new(dispatcher(
            local,
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        ));

        let first = {
            let d = Arc::clone(&d);
            tokio::spawn(async move {
                d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
                    .await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // Second submission is turned away without disturbing the first.
        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;

        gate.notify_one();
        first.await.unwrap();

        let replies = panel.replies();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].command, "error");
        assert!(replies[0].text.contains("already in flight"));
        assert_eq!(replies[1], PanelReply::chat_response("ok", None));
    }

    #[tokio::test]
    async fn test_identical_requests_yield_identical_sequences() {
        let local = ScriptedAdapter::new(vec![
            ChatOutcome::Partial("Hel".into()),
            ChatOutcome::Final("Hello".into()),
        ]);
        let panel = CapturingPanel::new();
        let d = dispatcher(
            local,
            ScriptedAdapter::new(vec![]),
            ScriptedAdapter::new(vec![]),
            panel.clone(),
        );

        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;
        d.dispatch(request(ProviderKind::LocalModel), CancellationToken::new())
            .await;

        let replies = panel.replies();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[..2], replies[2..]);
    }

    #[test]
    fn test_media_from_command_requires_type() {
        let cmd: PanelCommand = serde_json::from_str(
            r#"{"command":"chat","mediaData":"data:image/png;base64,AAAA"}"#,
        )
        .unwrap();
        let err = media_from_command(&cmd).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedMediaEncoding(_)));
    }
}
