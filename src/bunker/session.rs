//! The bunker session: the one stateful object in the core.
//!
//! A session owns a single authorized [`Connection`], subscribes to
//! kind-24133 envelope events addressed to the bunker identity, and serves
//! requests strictly in arrival order. Each message is decrypted, parsed,
//! authorized, dispatched, and answered before the next one is pulled, so a
//! slow signer naturally backpressures the relay stream.
//!
//! Failure containment: every per-message error is logged and dropped with
//! that message. Unauthorized senders get nothing back, not even an error;
//! silence here is a security property. Only [`Bunker::close`] or the
//! transport ending stops the loop.

use std::sync::Arc;

use nostr::prelude::*;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::audit::AuditLog;
use crate::bunker::decrypt::decrypt;
use crate::bunker::request::{Method, RemoteRequest, RemoteResponse};
use crate::error::BunkerError;
use crate::relay::{RelayInbound, RelayPort};
use crate::signer::BunkerSigner;

/// The two signing identities behind a connection. `bunker` authenticates
/// and decrypts inbound traffic; `user` performs the requested operations
/// and signs/encrypts outbound responses. They may be the same key pair.
#[derive(Clone)]
pub struct SignerPair {
    pub user: Arc<dyn BunkerSigner>,
    pub bunker: Arc<dyn BunkerSigner>,
}

/// A single established authorization relationship: exactly one pubkey may
/// issue requests. Immutable once attached; replacing it means closing the
/// session and opening a new one.
#[derive(Clone)]
pub struct Connection {
    pub authorized_pubkey: PublicKey,
    pub signers: SignerPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed without a connection; nothing is subscribed.
    Idle,
    /// Connection attached, subscription active.
    Listening,
    /// Cancellation issued. Terminal.
    Closed,
}

/// Construction inputs for [`Bunker::open`].
pub struct BunkerOptions {
    pub relay: Arc<dyn RelayPort>,
    pub connection: Option<Connection>,
    pub audit: Arc<Mutex<AuditLog>>,
    /// Invoked exactly once, after the subscription has been established
    /// (or immediately when no connection is attached). Lets the embedder
    /// announce availability, e.g. surface the pairing URI.
    pub on_subscribed: Box<dyn FnOnce() + Send>,
}

/// Handle to a running bunker session.
pub struct Bunker {
    state: SessionState,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Bunker {
    /// Open a session. Subscribes when a connection is supplied, then fires
    /// the `on_subscribed` notification either way.
    pub async fn open(opts: BunkerOptions) -> Result<Self, BunkerError> {
        let BunkerOptions {
            relay,
            connection,
            audit,
            on_subscribed,
        } = opts;

        let (cancel, cancel_rx) = watch::channel(false);
        let mut state = SessionState::Idle;
        let mut task = None;

        if let Some(connection) = connection {
            let bunker_pubkey = connection.signers.bunker.public_key().await?;
            // Only envelope events from the authorized author, addressed to
            // this bunker, and only from now on: limit(0) requests no
            // historical backlog, so replayed old requests never reach us.
            let filter = Filter::new()
                .kind(Kind::NostrConnect)
                .author(connection.authorized_pubkey)
                .pubkey(bunker_pubkey)
                .limit(0);
            let inbox = relay.subscribe(vec![filter], cancel_rx.clone()).await?;

            let session = Session {
                relay,
                connection: Some(connection),
                audit,
            };
            task = Some(tokio::spawn(session.run(inbox, cancel_rx)));
            state = SessionState::Listening;
        }

        on_subscribed();

        Ok(Self {
            state,
            cancel,
            task,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stop the session. Idempotent, and a no-op beyond bookkeeping when
    /// the session never started listening. A message mid-processing may
    /// still complete; no new messages are pulled afterwards.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let _ = self.cancel.send(true);
        self.state = SessionState::Closed;
        tracing::debug!("bunker session closed");
    }

    /// Close and wait for the session task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Loop internals, moved onto the spawned task.
struct Session {
    relay: Arc<dyn RelayPort>,
    connection: Option<Connection>,
    audit: Arc<Mutex<AuditLog>>,
}

impl Session {
    async fn run(self, mut inbox: mpsc::Receiver<RelayInbound>, mut cancel: watch::Receiver<bool>) {
        let Some(connection) = self.connection.clone() else {
            return;
        };

        loop {
            if *cancel.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                inbound = inbox.recv() => match inbound {
                    Some(RelayInbound::Event(event)) => {
                        if let Err(err) = self.handle_event(*event, &connection).await {
                            match err {
                                BunkerError::Unauthorized => {
                                    tracing::debug!("dropped request from unauthorized sender");
                                }
                                BunkerError::ResponseUndeliverable => {
                                    tracing::debug!("no user signer attached, response dropped");
                                }
                                err => tracing::warn!("request dropped: {err}"),
                            }
                        }
                    }
                    Some(RelayInbound::Other) => {}
                    None => {
                        tracing::debug!("relay stream ended");
                        break;
                    }
                },
            }
        }
    }

    /// Full pipeline for one envelope event: decrypt, parse, authorize,
    /// dispatch, respond. Any error here condemns this message only.
    async fn handle_event(&self, event: Event, connection: &Connection) -> Result<(), BunkerError> {
        let plaintext =
            decrypt(connection.signers.bunker.as_ref(), &event.pubkey, &event.content).await?;
        let request = RemoteRequest::parse(&plaintext)?;

        // Fail closed, fail silent: an unauthorized sender must not learn
        // that a bunker is listening at this address.
        if event.pubkey != connection.authorized_pubkey {
            return Err(BunkerError::Unauthorized);
        }

        {
            let mut log = self.audit.lock().await;
            log.record(
                "request",
                &format!("method: {}, id: {}, from: {}", request.method, request.id, event.pubkey),
            );
        }

        let response = self.execute(&request, connection).await?;
        self.respond(&event.pubkey, response).await
    }

    /// Serve one request with the user identity.
    async fn execute(
        &self,
        request: &RemoteRequest,
        connection: &Connection,
    ) -> Result<RemoteResponse, BunkerError> {
        let user = connection.signers.user.as_ref();

        match request.method() {
            Method::SignEvent => {
                let unsigned: UnsignedEvent = serde_json::from_str(request.param(0)?)
                    .map_err(|e| BunkerError::MalformedRequest(format!("invalid event template: {e}")))?;
                let event = user.sign_event(unsigned).await?;
                Ok(RemoteResponse::ok(&request.id, event.as_json()))
            }
            Method::Ping => Ok(RemoteResponse::ok(&request.id, "pong")),
            Method::GetRelays => {
                let relays: Vec<String> = user
                    .relays()
                    .await
                    .unwrap_or_default()
                    .iter()
                    .map(|url| url.to_string())
                    .collect();
                Ok(RemoteResponse::ok(&request.id, serde_json::to_string(&relays)?))
            }
            Method::GetPublicKey => {
                let public_key = user.public_key().await?;
                Ok(RemoteResponse::ok(&request.id, public_key.to_hex()))
            }
            Method::Nip04Encrypt => {
                let (counterparty, text) = cipher_params(request)?;
                let cipher = user
                    .nip04()
                    .ok_or(BunkerError::CapabilityUnavailable("NIP-04"))?;
                Ok(RemoteResponse::ok(&request.id, cipher.encrypt(&counterparty, text).await?))
            }
            Method::Nip04Decrypt => {
                let (counterparty, ciphertext) = cipher_params(request)?;
                let cipher = user
                    .nip04()
                    .ok_or(BunkerError::CapabilityUnavailable("NIP-04"))?;
                Ok(RemoteResponse::ok(&request.id, cipher.decrypt(&counterparty, ciphertext).await?))
            }
            Method::Nip44Encrypt => {
                let (counterparty, text) = cipher_params(request)?;
                let cipher = user
                    .nip44()
                    .ok_or(BunkerError::CapabilityUnavailable("NIP-44"))?;
                Ok(RemoteResponse::ok(&request.id, cipher.encrypt(&counterparty, text).await?))
            }
            Method::Nip44Decrypt => {
                let (counterparty, ciphertext) = cipher_params(request)?;
                let cipher = user
                    .nip44()
                    .ok_or(BunkerError::CapabilityUnavailable("NIP-44"))?;
                Ok(RemoteResponse::ok(&request.id, cipher.decrypt(&counterparty, ciphertext).await?))
            }
            Method::Unknown(name) => Ok(RemoteResponse::err(
                &request.id,
                BunkerError::UnsupportedMethod(name).to_string(),
            )),
        }
    }

    /// Encrypt, sign, and publish a response to `recipient`.
    ///
    /// Responses always use NIP-04 regardless of the scheme the request
    /// arrived under; this asymmetry is protocol behavior, not a bug.
    async fn respond(
        &self,
        recipient: &PublicKey,
        response: RemoteResponse,
    ) -> Result<(), BunkerError> {
        let user = match &self.connection {
            Some(connection) => connection.signers.user.clone(),
            None => return Err(BunkerError::ResponseUndeliverable),
        };

        let cipher = user
            .nip04()
            .ok_or(BunkerError::CapabilityUnavailable("NIP-04"))?;
        let payload = serde_json::to_string(&response)?;
        let content = cipher.encrypt(recipient, &payload).await?;

        let unsigned = EventBuilder::new(Kind::NostrConnect, content)
            .tag(Tag::public_key(*recipient))
            .build(user.public_key().await?);
        let event = user.sign_event(unsigned).await?;

        self.relay.publish(event).await?;

        let mut log = self.audit.lock().await;
        log.record("response", &format!("id: {}, to: {}", response.id, recipient));
        Ok(())
    }
}

fn cipher_params(request: &RemoteRequest) -> Result<(PublicKey, &str), BunkerError> {
    let counterparty = PublicKey::from_hex(request.param(0)?)
        .map_err(|e| BunkerError::MalformedRequest(format!("invalid counterparty key: {e}")))?;
    Ok((counterparty, request.param(1)?))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use nostr::nips::{nip04, nip44};

    use super::*;
    use crate::signer::Nip04Cipher;

    struct MockRelay {
        published: Mutex<Vec<Event>>,
        inbox: StdMutex<Option<mpsc::Receiver<RelayInbound>>>,
    }

    impl MockRelay {
        fn with_inbox() -> (mpsc::Sender<RelayInbound>, Arc<Self>) {
            let (tx, rx) = mpsc::channel(32);
            let relay = Arc::new(Self {
                published: Mutex::new(Vec::new()),
                inbox: StdMutex::new(Some(rx)),
            });
            (tx, relay)
        }

        async fn published(&self) -> Vec<Event> {
            self.published.lock().await.clone()
        }
    }

    #[async_trait]
    impl RelayPort for MockRelay {
        async fn subscribe(
            &self,
            _filters: Vec<Filter>,
            _cancel: watch::Receiver<bool>,
        ) -> Result<mpsc::Receiver<RelayInbound>, BunkerError> {
            Ok(self
                .inbox
                .lock()
                .unwrap()
                .take()
                .expect("subscribed more than once"))
        }

        async fn publish(&self, event: Event) -> Result<(), BunkerError> {
            self.published.lock().await.push(event);
            Ok(())
        }
    }

    struct Harness {
        tx: mpsc::Sender<RelayInbound>,
        relay: Arc<MockRelay>,
        bunker: Bunker,
        client: Keys,
        user: Keys,
        bunker_keys: Keys,
    }

    async fn open_harness(user_signer: Option<Arc<dyn BunkerSigner>>) -> Harness {
        let client = Keys::generate();
        let user = Keys::generate();
        let bunker_keys = Keys::generate();
        let (tx, relay) = MockRelay::with_inbox();

        let connection = Connection {
            authorized_pubkey: client.public_key(),
            signers: SignerPair {
                user: user_signer.unwrap_or_else(|| Arc::new(user.clone())),
                bunker: Arc::new(bunker_keys.clone()),
            },
        };

        let bunker = Bunker::open(BunkerOptions {
            relay: relay.clone(),
            connection: Some(connection),
            audit: Arc::new(Mutex::new(AuditLog::disabled())),
            on_subscribed: Box::new(|| {}),
        })
        .await
        .unwrap();

        Harness {
            tx,
            relay,
            bunker,
            client,
            user,
            bunker_keys,
        }
    }

    fn legacy_request(client: &Keys, bunker_pubkey: &PublicKey, json: &str) -> Event {
        let content = nip04::encrypt(client.secret_key(), bunker_pubkey, json).unwrap();
        EventBuilder::new(Kind::NostrConnect, content)
            .tag(Tag::public_key(*bunker_pubkey))
            .sign_with_keys(client)
            .unwrap()
    }

    fn modern_request(client: &Keys, bunker_pubkey: &PublicKey, json: &str) -> Event {
        let content =
            nip44::encrypt(client.secret_key(), bunker_pubkey, json, nip44::Version::V2).unwrap();
        EventBuilder::new(Kind::NostrConnect, content)
            .tag(Tag::public_key(*bunker_pubkey))
            .sign_with_keys(client)
            .unwrap()
    }

    /// Decrypt a published response the way the requesting client would:
    /// NIP-04 against the user identity.
    fn open_response(client: &Keys, user_pubkey: &PublicKey, event: &Event) -> RemoteResponse {
        let plaintext = nip04::decrypt(client.secret_key(), user_pubkey, &event.content).unwrap();
        serde_json::from_str(&plaintext).unwrap()
    }

    async fn wait_for_published(relay: &MockRelay, count: usize) -> Vec<Event> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let published = relay.published().await;
                if published.len() >= count {
                    return published;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for published events")
    }

    async fn send(harness: &Harness, event: Event) {
        harness
            .tx
            .send(RelayInbound::Event(Box::new(event)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ping_gets_pong_encrypted_for_the_requester() {
        let h = open_harness(None).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"1","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.id, "1");
        assert_eq!(response.result, "pong");
        assert!(response.error.is_none());

        // The envelope is signed by the user identity and addressed back
        // to the requester.
        assert_eq!(published[0].kind, Kind::NostrConnect);
        assert_eq!(published[0].pubkey, h.user.public_key());
        assert!(published[0].verify().is_ok());
        let tagged: Vec<_> = published[0].tags.public_keys().copied().collect();
        assert_eq!(tagged, vec![h.client.public_key()]);
    }

    #[tokio::test]
    async fn modern_scheme_requests_are_accepted_and_answered_in_legacy() {
        let h = open_harness(None).await;

        let event = modern_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"44","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        // open_response decrypts with NIP-04; it would fail if the reply
        // mirrored the request scheme.
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.id, "44");
        assert_eq!(response.result, "pong");
    }

    #[tokio::test]
    async fn unknown_method_is_named_in_the_error_response() {
        let h = open_harness(None).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"2","method":"unknown_method","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.id, "2");
        assert_eq!(response.result, "");
        assert!(response.error.unwrap().contains("unknown_method"));
    }

    #[tokio::test]
    async fn get_public_key_reports_the_user_identity() {
        let h = open_harness(None).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"3","method":"get_public_key","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.result, h.user.public_key().to_hex());
    }

    #[tokio::test]
    async fn get_relays_serializes_an_empty_list_when_unsupported() {
        let h = open_harness(None).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"4","method":"get_relays","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.result, "[]");
    }

    #[tokio::test]
    async fn sign_event_returns_a_verifiable_event() {
        let h = open_harness(None).await;

        let unsigned = EventBuilder::text_note("signed remotely").build(h.user.public_key());
        let request = serde_json::json!({
            "id": "5",
            "method": "sign_event",
            "params": [serde_json::to_string(&unsigned).unwrap()],
        });
        let event = legacy_request(&h.client, &h.bunker_keys.public_key(), &request.to_string());
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        let signed: Event = serde_json::from_str(&response.result).unwrap();
        assert!(signed.verify().is_ok());
        assert_eq!(signed.pubkey, h.user.public_key());
        assert_eq!(signed.content, "signed remotely");
    }

    #[tokio::test]
    async fn nip04_encrypt_uses_the_user_identity() {
        let h = open_harness(None).await;
        let third_party = Keys::generate();

        let request = serde_json::json!({
            "id": "6",
            "method": "nip04_encrypt",
            "params": [third_party.public_key().to_hex(), "for your eyes only"],
        });
        let event = legacy_request(&h.client, &h.bunker_keys.public_key(), &request.to_string());
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        let plaintext = nip04::decrypt(
            third_party.secret_key(),
            &h.user.public_key(),
            &response.result,
        )
        .unwrap();
        assert_eq!(plaintext, "for your eyes only");
    }

    #[tokio::test]
    async fn nip44_round_trips_through_the_bunker() {
        let h = open_harness(None).await;
        let third_party = Keys::generate();

        let ciphertext = nip44::encrypt(
            third_party.secret_key(),
            &h.user.public_key(),
            "sealed",
            nip44::Version::V2,
        )
        .unwrap();
        let request = serde_json::json!({
            "id": "7",
            "method": "nip44_decrypt",
            "params": [third_party.public_key().to_hex(), ciphertext],
        });
        let event = legacy_request(&h.client, &h.bunker_keys.public_key(), &request.to_string());
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.result, "sealed");
    }

    #[tokio::test]
    async fn unauthorized_senders_never_get_a_response() {
        let h = open_harness(None).await;

        // Valid, well-encrypted requests from several random authors.
        for i in 0..5 {
            let intruder = Keys::generate();
            let event = legacy_request(
                &intruder,
                &h.bunker_keys.public_key(),
                &format!(r#"{{"id":"{i}","method":"ping","params":[]}}"#),
            );
            send(&h, event).await;
        }

        // A single authorized request after them; in-order processing means
        // its response arriving proves the others were dropped.
        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"last","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        assert_eq!(published.len(), 1);
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.id, "last");
    }

    #[tokio::test]
    async fn malformed_plaintext_is_discarded_and_the_loop_continues() {
        let h = open_harness(None).await;

        let garbage = legacy_request(&h.client, &h.bunker_keys.public_key(), "not json at all");
        send(&h, garbage).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"after","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        assert_eq!(published.len(), 1);
        let response = open_response(&h.client, &h.user.public_key(), &published[0]);
        assert_eq!(response.id, "after");
    }

    #[tokio::test]
    async fn undecryptable_content_is_discarded() {
        let h = open_harness(None).await;

        let junk = EventBuilder::new(Kind::NostrConnect, "junk ciphertext")
            .tag(Tag::public_key(h.bunker_keys.public_key()))
            .sign_with_keys(&h.client)
            .unwrap();
        send(&h, junk).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"ok","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        assert_eq!(published.len(), 1);
    }

    /// User identity without NIP-44; requests needing it fail silently for
    /// that message while the session keeps serving.
    struct LegacyOnly(Keys);

    #[async_trait]
    impl BunkerSigner for LegacyOnly {
        async fn public_key(&self) -> Result<PublicKey, BunkerError> {
            Ok(self.0.public_key())
        }

        async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, BunkerError> {
            unsigned
                .sign_with_keys(&self.0)
                .map_err(|e| BunkerError::Signer(e.to_string()))
        }

        fn nip04(&self) -> Option<&dyn Nip04Cipher> {
            Some(&self.0)
        }
    }

    #[tokio::test]
    async fn missing_capability_fails_the_request_without_crashing() {
        let user = Keys::generate();
        let signer: Arc<dyn BunkerSigner> = Arc::new(LegacyOnly(user.clone()));
        let h = open_harness(Some(signer)).await;
        let third_party = Keys::generate();

        let request = serde_json::json!({
            "id": "8",
            "method": "nip44_encrypt",
            "params": [third_party.public_key().to_hex(), "nope"],
        });
        let event = legacy_request(&h.client, &h.bunker_keys.public_key(), &request.to_string());
        send(&h, event).await;

        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"still-alive","method":"ping","params":[]}"#,
        );
        send(&h, event).await;

        let published = wait_for_published(&h.relay, 1).await;
        assert_eq!(published.len(), 1);
        let response = open_response(&h.client, &user.public_key(), &published[0]);
        assert_eq!(response.id, "still-alive");
    }

    #[tokio::test]
    async fn close_stops_pulling_even_with_messages_queued() {
        let mut h = open_harness(None).await;
        assert_eq!(h.bunker.state(), SessionState::Listening);

        h.bunker.close();
        assert_eq!(h.bunker.state(), SessionState::Closed);
        // Harmless to close twice.
        h.bunker.close();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let event = legacy_request(
            &h.client,
            &h.bunker_keys.public_key(),
            r#"{"id":"late","method":"ping","params":[]}"#,
        );
        // The loop may already have ended and dropped its receiver.
        let _ = h.tx.send(RelayInbound::Event(Box::new(event))).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(h.relay.published().await.is_empty());
    }

    #[tokio::test]
    async fn session_without_connection_stays_idle_and_close_is_safe() {
        let (_tx, relay) = MockRelay::with_inbox();
        let mut bunker = Bunker::open(BunkerOptions {
            relay,
            connection: None,
            audit: Arc::new(Mutex::new(AuditLog::disabled())),
            on_subscribed: Box::new(|| {}),
        })
        .await
        .unwrap();

        assert_eq!(bunker.state(), SessionState::Idle);
        bunker.close();
        assert_eq!(bunker.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn on_subscribed_fires_once_after_subscription() {
        let client = Keys::generate();
        let keys = Keys::generate();
        let (_tx, relay) = MockRelay::with_inbox();
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(1);

        let connection = Connection {
            authorized_pubkey: client.public_key(),
            signers: SignerPair {
                user: Arc::new(keys.clone()),
                bunker: Arc::new(keys.clone()),
            },
        };
        let _bunker = Bunker::open(BunkerOptions {
            relay,
            connection: Some(connection),
            audit: Arc::new(Mutex::new(AuditLog::disabled())),
            on_subscribed: Box::new(move || {
                notify_tx.try_send(()).unwrap();
            }),
        })
        .await
        .unwrap();

        notify_rx.recv().await.expect("subscribed notification");
    }

    #[tokio::test]
    async fn respond_without_user_signer_is_a_silent_no_op() {
        let (_tx, relay) = MockRelay::with_inbox();
        let session = Session {
            relay: relay.clone(),
            connection: None,
            audit: Arc::new(Mutex::new(AuditLog::disabled())),
        };

        let recipient = Keys::generate().public_key();
        let err = session
            .respond(&recipient, RemoteResponse::ok("1", "pong"))
            .await
            .unwrap_err();
        assert!(matches!(err, BunkerError::ResponseUndeliverable));
        assert!(relay.published().await.is_empty());
    }
}
