//! The `/verify` state machine.

use super::{BrokerClient, CallbackParams, CallbackSignal, EventBus, RpEvent, TokenExchanger};

/// Result of handling one broker callback. Exactly one event has been
/// emitted by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The broker or the token endpoint reported an error.
    GotError,
    /// The resolved token did not verify.
    InvalidToken,
    /// The token verified; carries the identity.
    Verified(String),
}

/// Resolve the token a callback carries and verify it.
///
/// Order of checks:
/// 1. `error` present: emit `gotError` and stop.
/// 2. `id_token` present: that is the token.
/// 3. `code` present: exchange it; an exchange failure emits `gotError`.
/// 4. otherwise the token is empty.
///
/// The resolved token is always passed to [`BrokerClient::verify`], even
/// when empty, so a missing token and a rejected token both end up as
/// `invalidToken`.
pub async fn verify_callback(
    params: CallbackParams,
    broker: &dyn BrokerClient,
    exchanger: &dyn TokenExchanger,
    events: &EventBus,
) -> VerifyOutcome {
    let token = match params.signal() {
        CallbackSignal::BrokerError { error, description } => {
            if events.emit(RpEvent::GotError(params)) == 0 {
                tracing::error!(%error, %description, "RP got an error from the broker");
            }
            return VerifyOutcome::GotError;
        }
        CallbackSignal::ImplicitToken(token) => {
            tracing::debug!("Callback carries an ID token");
            token
        }
        CallbackSignal::AuthorizationCode(code) => {
            tracing::debug!("Callback carries an authorization code, exchanging");
            match exchanger.exchange_code(&code, broker.redirect_uri()).await {
                Ok(grant) => grant.id_token,
                Err(err) => {
                    if events.emit(RpEvent::GotError(params)) == 0 {
                        tracing::error!(error = %err, "RP got an error from the token endpoint");
                    }
                    return VerifyOutcome::GotError;
                }
            }
        }
        CallbackSignal::Empty => String::new(),
    };

    match broker.verify(&token).await {
        Ok(identity) => {
            tracing::info!(%identity, "Token verified");
            events.emit(RpEvent::Verified(identity.clone()));
            VerifyOutcome::Verified(identity)
        }
        Err(err) => {
            if events.emit(RpEvent::InvalidToken(params)) == 0 {
                tracing::error!(error = %err, "RP failed to verify token");
            }
            VerifyOutcome::InvalidToken
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rp::{BrokerError, EventKind, ExchangeError, TokenGrant};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    const REDIRECT_URI: &str = "http://localhost:44180/verify";

    /// Broker that accepts a fixed set of tokens and records verify calls.
    #[derive(Default)]
    struct ScriptedBroker {
        identities: HashMap<String, String>,
        verified: Mutex<Vec<String>>,
    }

    impl ScriptedBroker {
        fn accepting(token: &str, identity: &str) -> Self {
            Self {
                identities: HashMap::from([(token.to_string(), identity.to_string())]),
                ..Default::default()
            }
        }

        fn verify_calls(&self) -> Vec<String> {
            self.verified.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrokerClient for ScriptedBroker {
        async fn authenticate(&self, _identifier: &str) -> crate::rp::Result<Url> {
            Ok(Url::parse("http://broker.test/auth").unwrap())
        }

        async fn verify(&self, token: &str) -> crate::rp::Result<String> {
            self.verified.lock().unwrap().push(token.to_string());
            if token.is_empty() {
                return Err(BrokerError::InvalidToken("empty token".to_string()));
            }
            self.identities
                .get(token)
                .cloned()
                .ok_or_else(|| BrokerError::InvalidToken("unknown token".to_string()))
        }

        fn redirect_uri(&self) -> &str {
            REDIRECT_URI
        }

        async fn destroy(&self) {}
    }

    /// Exchanger returning a canned result and recording calls.
    struct ScriptedExchanger {
        result: std::result::Result<TokenGrant, ExchangeError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedExchanger {
        fn granting(id_token: &str) -> Self {
            Self {
                result: Ok(TokenGrant {
                    id_token: id_token.to_string(),
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: &str) -> Self {
            Self {
                result: Err(ExchangeError::Endpoint {
                    error: error.to_string(),
                    description: String::new(),
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenExchanger for ScriptedExchanger {
        async fn exchange_code(
            &self,
            code: &str,
            redirect_uri: &str,
        ) -> std::result::Result<TokenGrant, ExchangeError> {
            self.calls
                .lock()
                .unwrap()
                .push((code.to_string(), redirect_uri.to_string()));
            self.result.clone()
        }
    }

    /// Collects every event emitted on the bus.
    fn record_all(bus: &EventBus) -> std::sync::Arc<Mutex<Vec<RpEvent>>> {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::GotError, EventKind::InvalidToken, EventKind::Verified] {
            let sink = seen.clone();
            bus.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
        }
        seen
    }

    fn params(pairs: &[(&str, &str)]) -> CallbackParams {
        CallbackParams::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn broker_error_emits_got_error_without_verifying() {
        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger::granting("unused");
        let bus = EventBus::new();
        let seen = record_all(&bus);
        let callback = params(&[("error", "access_denied")]);

        let outcome = verify_callback(callback.clone(), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert_eq!(*seen.lock().unwrap(), vec![RpEvent::GotError(callback)]);
        assert!(broker.verify_calls().is_empty());
        assert!(exchanger.calls().is_empty());
    }

    #[tokio::test]
    async fn broker_error_wins_over_token_and_code() {
        let broker = ScriptedBroker::accepting("t", "user@example.com");
        let exchanger = ScriptedExchanger::granting("t");
        let bus = EventBus::new();

        let outcome = verify_callback(
            params(&[("error", "server_error"), ("id_token", "t"), ("code", "c")]),
            &broker,
            &exchanger,
            &bus,
        )
        .await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert!(broker.verify_calls().is_empty());
        assert!(exchanger.calls().is_empty());
    }

    #[tokio::test]
    async fn implicit_token_is_verified_as_is() {
        let broker = ScriptedBroker::accepting("abc.def.ghi", "user@example.com");
        let exchanger = ScriptedExchanger::granting("unused");
        let bus = EventBus::new();
        let seen = record_all(&bus);

        let outcome =
            verify_callback(params(&[("id_token", "abc.def.ghi")]), &broker, &exchanger, &bus)
                .await;

        assert_eq!(
            outcome,
            VerifyOutcome::Verified("user@example.com".to_string())
        );
        assert_eq!(broker.verify_calls(), vec!["abc.def.ghi".to_string()]);
        assert!(exchanger.calls().is_empty());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RpEvent::Verified("user@example.com".to_string())]
        );
    }

    #[tokio::test]
    async fn code_is_exchanged_once_with_the_redirect_uri() {
        let broker = ScriptedBroker::accepting("xyz", "a@b.com");
        let exchanger = ScriptedExchanger::granting("xyz");
        let bus = EventBus::new();
        let seen = record_all(&bus);

        let outcome =
            verify_callback(params(&[("code", "AUTH123")]), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::Verified("a@b.com".to_string()));
        assert_eq!(
            exchanger.calls(),
            vec![("AUTH123".to_string(), REDIRECT_URI.to_string())]
        );
        assert_eq!(broker.verify_calls(), vec!["xyz".to_string()]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RpEvent::Verified("a@b.com".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_exchange_emits_got_error_without_verifying() {
        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger::failing("invalid_grant");
        let bus = EventBus::new();
        let seen = record_all(&bus);
        let callback = params(&[("code", "BAD")]);

        let outcome = verify_callback(callback.clone(), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert_eq!(exchanger.calls().len(), 1);
        assert!(broker.verify_calls().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![RpEvent::GotError(callback)]);
    }

    #[tokio::test]
    async fn transport_failure_is_a_got_error_too() {
        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger {
            result: Err(ExchangeError::Transport("connection refused".to_string())),
            calls: Mutex::new(Vec::new()),
        };
        let bus = EventBus::new();

        let outcome = verify_callback(params(&[("code", "C")]), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert!(broker.verify_calls().is_empty());
    }

    #[tokio::test]
    async fn exchange_without_id_token_verifies_empty_token() {
        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger::granting("");
        let bus = EventBus::new();
        let seen = record_all(&bus);
        let callback = params(&[("code", "AUTH123")]);

        let outcome = verify_callback(callback.clone(), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::InvalidToken);
        assert_eq!(broker.verify_calls(), vec![String::new()]);
        assert_eq!(*seen.lock().unwrap(), vec![RpEvent::InvalidToken(callback)]);
    }

    #[tokio::test]
    async fn no_signal_verifies_empty_token() {
        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger::granting("unused");
        let bus = EventBus::new();
        let seen = record_all(&bus);
        let callback = params(&[("state", "abc")]);

        let outcome = verify_callback(callback.clone(), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::InvalidToken);
        assert_eq!(broker.verify_calls(), vec![String::new()]);
        assert!(exchanger.calls().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![RpEvent::InvalidToken(callback)]);
    }

    #[tokio::test]
    async fn rejected_token_emits_invalid_token() {
        let broker = ScriptedBroker::accepting("good", "user@example.com");
        let exchanger = ScriptedExchanger::granting("unused");
        let bus = EventBus::new();
        let (_, mut rx) = bus.subscribe(EventKind::InvalidToken);

        let outcome =
            verify_callback(params(&[("id_token", "forged")]), &broker, &exchanger, &bus).await;

        assert_eq!(outcome, VerifyOutcome::InvalidToken);
        assert!(matches!(rx.recv().await, Some(RpEvent::InvalidToken(p)) if p.id_token == "forged"));
    }

    /// Writer that appends formatted log lines to a shared buffer.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Run one callback and return its outcome plus the error-level log
    /// lines it produced.
    async fn run_logged(params: CallbackParams, bus: &EventBus) -> (VerifyOutcome, String) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let broker = ScriptedBroker::default();
        let exchanger = ScriptedExchanger::failing("invalid_grant");
        let outcome = verify_callback(params, &broker, &exchanger, bus).await;

        (outcome, logs.contents())
    }

    #[tokio::test]
    async fn unheard_broker_error_is_logged() {
        let (outcome, logs) = run_logged(
            params(&[("error", "access_denied"), ("error_description", "user said no")]),
            &EventBus::new(),
        )
        .await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert!(logs.contains("RP got an error from the broker"), "{logs}");
        assert!(logs.contains("access_denied"), "{logs}");
        assert!(logs.contains("user said no"), "{logs}");
    }

    #[tokio::test]
    async fn unheard_exchange_failure_is_logged() {
        let (outcome, logs) = run_logged(params(&[("code", "BAD")]), &EventBus::new()).await;

        assert_eq!(outcome, VerifyOutcome::GotError);
        assert!(logs.contains("RP got an error from the token endpoint"), "{logs}");
        assert!(logs.contains("invalid_grant"), "{logs}");
    }

    #[tokio::test]
    async fn unheard_verification_failure_is_logged() {
        let (outcome, logs) = run_logged(params(&[]), &EventBus::new()).await;

        assert_eq!(outcome, VerifyOutcome::InvalidToken);
        assert!(logs.contains("RP failed to verify token"), "{logs}");
        assert!(logs.contains("empty token"), "{logs}");
    }

    #[tokio::test]
    async fn heard_failures_are_not_logged() {
        let bus = EventBus::new();
        bus.on(EventKind::GotError, |_| {});
        bus.on(EventKind::InvalidToken, |_| {});

        for callback in [
            params(&[("error", "access_denied")]),
            params(&[("code", "BAD")]),
            params(&[]),
        ] {
            let (outcome, logs) = run_logged(callback, &bus).await;
            assert!(!matches!(outcome, VerifyOutcome::Verified(_)));
            assert!(logs.is_empty(), "unexpected diagnostic: {logs}");
        }
    }

    #[tokio::test]
    async fn listener_for_other_kind_does_not_silence_diagnostic() {
        let bus = EventBus::new();
        bus.on(EventKind::Verified, |_| {});

        let (_, logs) = run_logged(params(&[("error", "access_denied")]), &bus).await;

        assert!(logs.contains("RP got an error from the broker"), "{logs}");
    }
}
