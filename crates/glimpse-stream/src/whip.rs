//! WHIP (WebRTC-HTTP Ingestion Protocol) resources, inverted: the server
//! subscribes and the browser is the source.
//!
//! A resource is one active peer connection bound to one session. The
//! negotiation is non-trickle: the answer returned to the client already
//! carries every candidate this server is willing to publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::StreamError;
use crate::pump::{self, DebuggerEndpoint, PumpOptions};

/// Inbound data channels with this label carry the screencast.
pub const DATA_CHANNEL_LABEL: &str = "screencast";

/// Public STUN hosts used for candidate discovery. No TURN.
const STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun.cloudflare.com:3478",
];

/// Upper bound on ICE gathering; the answer ships with whatever candidates
/// exist when it elapses.
const ICE_GATHERING_CAP: Duration = Duration::from_secs(3);

/// One active WebRTC ingestion against a session.
pub struct WhipResource {
    id: String,
    session_id: String,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: parking_lot::Mutex<Option<Arc<RTCDataChannel>>>,
    pump_started: AtomicBool,
    /// Gates the peer-connection close so it happens exactly once.
    close_lock: Mutex<bool>,
}

impl WhipResource {
    /// Opaque resource id, distinct from the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Id of the session this resource streams from.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The inbound screencast data channel, once the peer has opened it.
    pub fn data_channel(&self) -> Option<Arc<RTCDataChannel>> {
        self.data_channel.lock().clone()
    }

    /// Close the underlying peer connection. Idempotent.
    pub async fn close(&self) {
        let mut closed = self.close_lock.lock().await;
        if *closed {
            return;
        }
        *closed = true;
        if let Err(e) = self.peer_connection.close().await {
            tracing::debug!(resource_id = %self.id, error = %e, "peer connection close");
        }
    }
}

/// Process-wide table of active WHIP resources.
#[derive(Default)]
pub struct WhipRegistry {
    resources: DashMap<String, Arc<WhipResource>>,
}

impl WhipRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    /// Number of active resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are active.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Look up a resource by id.
    pub fn get(&self, id: &str) -> Option<Arc<WhipResource>> {
        self.resources.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Remove a resource. Returns the entry if it was present; removal is
    /// idempotent so the connection-state callback and an explicit DELETE
    /// can race freely.
    pub fn remove(&self, id: &str) -> Option<Arc<WhipResource>> {
        let removed = self.resources.remove(id).map(|(_, r)| r);
        if removed.is_some() {
            metrics::gauge!("whip_resources_active").decrement(1.0);
        }
        removed
    }

    /// Close and remove every resource. Used on server shutdown.
    pub async fn shutdown_all(&self) {
        let snapshot: Vec<Arc<WhipResource>> =
            self.resources.iter().map(|e| Arc::clone(e.value())).collect();
        self.resources.clear();
        for resource in snapshot {
            resource.close().await;
        }
    }

    fn insert(&self, resource: Arc<WhipResource>) {
        self.resources
            .insert(resource.id().to_string(), resource);
        metrics::gauge!("whip_resources_active").increment(1.0);
    }
}

/// Negotiate a new WHIP resource from an SDP offer.
///
/// Allocates a peer connection against the public STUN hosts, registers the
/// data-channel and connection-state callbacks, answers the offer, and
/// waits (bounded) for ICE gathering. On success the resource is already in
/// the registry and the returned SDP is the complete answer.
pub async fn create_resource(
    registry: &Arc<WhipRegistry>,
    endpoint: Arc<dyn DebuggerEndpoint>,
    session_id: &str,
    offer_sdp: String,
    pump_options: PumpOptions,
) -> Result<(Arc<WhipResource>, String), StreamError> {
    let mut media = MediaEngine::default();
    media.register_default_codecs()?;
    let api = APIBuilder::new().with_media_engine(media).build();

    let config = RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: STUN_SERVERS.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let peer_connection = Arc::new(api.new_peer_connection(config).await?);

    let resource = Arc::new(WhipResource {
        id: Uuid::now_v7().to_string(),
        session_id: session_id.to_string(),
        peer_connection: Arc::clone(&peer_connection),
        data_channel: parking_lot::Mutex::new(None),
        pump_started: AtomicBool::new(false),
        close_lock: Mutex::new(false),
    });
    let resource_id = resource.id().to_string();

    // Inbound data channel: a channel labelled `screencast` starts the pump
    // once it opens. Its close event is informational only — cleanup is
    // driven by connection state.
    {
        let resource_weak = Arc::downgrade(&resource);
        peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let resource_weak = resource_weak.clone();
            let endpoint = Arc::clone(&endpoint);
            let pump_options = pump_options.clone();
            Box::pin(async move {
                let label = channel.label().to_string();
                tracing::info!(label = %label, "data channel announced");
                if label != DATA_CHANNEL_LABEL {
                    return;
                }
                let Some(resource) = resource_weak.upgrade() else {
                    return;
                };
                *resource.data_channel.lock() = Some(Arc::clone(&channel));

                let open_channel = Arc::clone(&channel);
                let open_resource = Arc::downgrade(&resource);
                channel.on_open(Box::new(move || {
                    Box::pin(async move {
                        let Some(resource) = open_resource.upgrade() else {
                            return;
                        };
                        // Exactly one pump per (session, channel) pair.
                        if resource.pump_started.swap(true, Ordering::SeqCst) {
                            return;
                        }
                        tracing::info!(
                            resource_id = %resource.id,
                            session_id = %resource.session_id,
                            "screencast channel open, starting pump"
                        );
                        tokio::spawn(pump::run(endpoint, open_channel, pump_options));
                    })
                }));

                channel.on_close(Box::new(move || {
                    Box::pin(async move {
                        tracing::info!("screencast channel closed");
                    })
                }));
            })
        }));
    }

    // Terminal connection states purge the registry entry. `disconnected`
    // is transient and never triggers removal.
    {
        let registry = Arc::clone(registry);
        let resource_id = resource_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let registry = Arc::clone(&registry);
                let resource_id = resource_id.clone();
                Box::pin(async move {
                    tracing::info!(resource_id = %resource_id, state = %state, "connection state changed");
                    if matches!(
                        state,
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
                    ) && registry.remove(&resource_id).is_some()
                    {
                        tracing::info!(resource_id = %resource_id, "whip resource purged");
                    }
                })
            },
        ));
    }

    let answer_sdp = match negotiate(&peer_connection, offer_sdp, &resource_id).await {
        Ok(sdp) => sdp,
        Err(e) => {
            let _ = peer_connection.close().await;
            return Err(e);
        }
    };

    registry.insert(Arc::clone(&resource));
    tracing::info!(
        resource_id = %resource_id,
        session_id = %session_id,
        "whip resource created"
    );
    Ok((resource, answer_sdp))
}

/// Answer the offer and gather candidates, bounded by the gathering cap.
async fn negotiate(
    peer_connection: &Arc<RTCPeerConnection>,
    offer_sdp: String,
    resource_id: &str,
) -> Result<String, StreamError> {
    let offer = RTCSessionDescription::offer(offer_sdp)?;
    peer_connection.set_remote_description(offer).await?;

    let answer = peer_connection.create_answer(None).await?;
    let mut gathering_done = peer_connection.gathering_complete_promise().await;
    peer_connection.set_local_description(answer).await?;

    if tokio::time::timeout(ICE_GATHERING_CAP, gathering_done.recv())
        .await
        .is_err()
    {
        tracing::info!(resource_id = %resource_id, "ice gathering capped, proceeding");
    }

    peer_connection
        .local_description()
        .await
        .map(|d| d.sdp)
        .ok_or_else(|| StreamError::Negotiation {
            context: "no local description after gathering".into(),
        })
}
