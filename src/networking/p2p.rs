
#[allow(missing_docs)]
// Copyright (c) 2026 Space Data Network
// Licensed under the Apache License, Version 2.0

// P2P subsystem (libp2p): gossip overlay + profile-exchange streams.

// The swarm loop is the only owner of the behaviour set. Everything else
// talks to it over channels:
// - Outbound: router OutboundMessage -> gossipsub publish on derived topic
// - Inbound: gossipsub message -> connection gate -> router.handle_inbound
// - Profiles: request-response protocol served from the registry; verified
//   responses upsert the registry (auto-insert => Standard trust)
// - Topics: gossipsub subscriptions follow the TopicMatcher as the active
//   subscription set changes

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use libp2p::{
    core::upgrade,
    gossipsub::{self, IdentTopic, MessageAuthenticity},
    identify, identity, noise, ping, request_response,
    swarm::{NetworkBehaviour, Swarm, SwarmEvent},
    tcp, yamux, Multiaddr, PeerId, StreamProtocol, Transport,
};

use libp2p::futures::StreamExt;
use libp2p::swarm::Config as SwarmConfig;

use crate::core::registry::{ConnectionGate, TrustRegistry, Verdict};
use crate::core::routing::{OutboundMessage, Router, TopicMatcher};
use crate::core::subscription::SubscriptionManager;
use crate::monitoring::metrics::Metrics;
use crate::networking::profile::{
    verify_profile, ProfileCodec, ProfileRequest, ProfileResponse, EXCHANGE_BUDGET, PROTOCOL_NAME,
    STATUS_OK,
};

/// Events emitted by the P2P node.
#[derive(Clone, Debug)]
pub enum P2pEvent {
    /// Peer connected.
    PeerConnected(String),
    /// Peer disconnected.
    PeerDisconnected(String),
}

/// Receiver of P2P events.
pub type EventRx = mpsc::Receiver<P2pEvent>;

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("io")]
    Io,
    #[error("config")]
    Config,
}

/// Runtime configuration for the P2P subsystem.
#[derive(Clone, Debug)]
pub struct P2pConfig {
    /// Listen address as string (e.g. "/ip4/0.0.0.0/tcp/4001").
    pub listen_addr: String,
    /// Bootstrap peers.
    pub bootstrap: Vec<String>,
    /// Protocol version advertised over identify.
    pub agent_version: String,
}

/// Shared collaborators wired into the swarm loop.
pub struct P2pDeps {
    /// Transport keypair (from the derived identity).
    pub keypair: identity::Keypair,
    /// This node's signed profile blob.
    pub own_profile: Vec<u8>,
    /// Connection gate consulted on accept and dial.
    pub gate: Arc<ConnectionGate>,
    /// Trusted peer registry.
    pub registry: Arc<TrustRegistry>,
    /// Router fed with inbound overlay messages.
    pub router: Arc<Router>,
    /// Subscription manager driving the topic set.
    pub manager: SubscriptionManager,
    /// Router-to-overlay channel.
    pub outbound_rx: mpsc::Receiver<OutboundMessage>,
    /// Metrics container.
    pub metrics: Arc<Metrics>,
}

#[derive(Debug)]
enum BehaviourEvent {
    Gossipsub(gossipsub::Event),
    Identify(()),
    Ping(()),
    Profiles(request_response::Event<ProfileRequest, ProfileResponse>),
}
impl From<gossipsub::Event> for BehaviourEvent {
    fn from(e: gossipsub::Event) -> Self {
        Self::Gossipsub(e)
    }
}
impl From<identify::Event> for BehaviourEvent {
    fn from(_e: identify::Event) -> Self {
        Self::Identify(())
    }
}
impl From<ping::Event> for BehaviourEvent {
    fn from(_e: ping::Event) -> Self {
        Self::Ping(())
    }
}
impl From<request_response::Event<ProfileRequest, ProfileResponse>> for BehaviourEvent {
    fn from(e: request_response::Event<ProfileRequest, ProfileResponse>) -> Self {
        Self::Profiles(e)
    }
}

#[derive(NetworkBehaviour)]
#[behaviour(to_swarm = "BehaviourEvent")]
struct Behaviour {
    gossipsub: gossipsub::Behaviour,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
    profiles: request_response::Behaviour<ProfileCodec>,
}

/// Spawn the P2P task.
pub fn spawn_p2p(
    cfg: P2pConfig,
    mut deps: P2pDeps,
) -> Result<(EventRx, tokio::task::JoinHandle<()>), P2pError> {
    let local_peer_id = PeerId::from(deps.keypair.public());
    let (ev_tx, ev_rx) = mpsc::channel::<P2pEvent>(128);

    let listen_addr = cfg.listen_addr.clone();
    let bootstrap = cfg.bootstrap.clone();
    let agent_version = cfg.agent_version.clone();

    let join = tokio::spawn(async move {
        // --- Transport (TCP + Noise + Yamux) ---
        let noise_keys = match noise::Config::new(&deps.keypair) {
            Ok(v) => v,
            Err(_) => {
                warn!("failed to build noise config");
                return;
            }
        };

        let transport = tcp::tokio::Transport::new(tcp::Config::default().nodelay(true))
            .upgrade(upgrade::Version::V1)
            .authenticate(noise_keys)
            .multiplex(yamux::Config::default())
            .boxed();

        // --- Gossipsub ---
        let gcfg = gossipsub::ConfigBuilder::default()
            .validation_mode(gossipsub::ValidationMode::Permissive)
            .heartbeat_interval(Duration::from_secs(1))
            .build()
            .unwrap_or_else(|_| gossipsub::Config::default());

        let gossipsub = match gossipsub::Behaviour::new(
            MessageAuthenticity::Signed(deps.keypair.clone()),
            gcfg,
        ) {
            Ok(v) => v,
            Err(_) => {
                warn!("failed to create gossipsub behaviour");
                return;
            }
        };

        let identify = identify::Behaviour::new(
            identify::Config::new(agent_version, deps.keypair.public()),
        );

        let ping = ping::Behaviour::new(
            ping::Config::new()
                .with_interval(Duration::from_secs(10))
                .with_timeout(Duration::from_secs(20)),
        );

        let profiles = request_response::Behaviour::with_codec(
            ProfileCodec,
            std::iter::once((
                StreamProtocol::new(PROTOCOL_NAME),
                request_response::ProtocolSupport::Full,
            )),
            request_response::Config::default().with_request_timeout(EXCHANGE_BUDGET),
        );

        let behaviour = Behaviour {
            gossipsub,
            identify,
            ping,
            profiles,
        };

        let mut swarm = Swarm::new(
            transport,
            behaviour,
            local_peer_id,
            SwarmConfig::with_tokio_executor(),
        );

        // Listen
        let listen: Multiaddr = match listen_addr.parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(addr = %listen_addr, "bad listen_addr");
                return;
            }
        };
        if let Err(e) = swarm.listen_on(listen) {
            warn!(err = ?e, "listen_on failed");
            return;
        }

        // Bootstrap
        for b in bootstrap.iter().map(|x| x.trim()).filter(|x| !x.is_empty()) {
            match b.parse::<Multiaddr>() {
                Ok(ma) => {
                    if let Err(e) = swarm.dial(ma.clone()) {
                        warn!(boot = %b, err = ?e, "dial bootstrap failed");
                    } else {
                        info!(boot = %b, "dialing bootstrap");
                    }
                }
                Err(_) => warn!(boot = %b, "bad bootstrap addr; skipping"),
            }
        }

        info!(%local_peer_id, "p2p loop started");
        deps.metrics.p2p_peers.set(0);

        // Initial topic set, refreshed as subscriptions change.
        let own_b58 = local_peer_id.to_base58();
        let mut matcher = TopicMatcher::default();
        refresh_topics(&mut swarm, &mut matcher, &own_b58, &deps.manager);
        let mut topic_tick = tokio::time::interval(Duration::from_secs(5));

        loop {
            tokio::select! {
                maybe_msg = deps.outbound_rx.recv() => {
                    match maybe_msg {
                        Some(OutboundMessage { topic, data }) => {
                            let topic = IdentTopic::new(topic);
                            if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic, data) {
                                debug!(err = ?e, "gossipsub publish failed");
                            }
                        }
                        None => {
                            warn!("outbound channel closed; stopping p2p task");
                            break;
                        }
                    }
                }

                _ = topic_tick.tick() => {
                    refresh_topics(&mut swarm, &mut matcher, &own_b58, &deps.manager);
                }

                ev = swarm.select_next_some() => {
                    match ev {
                        SwarmEvent::NewListenAddr { address, .. } => {
                            info!(addr = %address, "listening");
                        }

                        SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                            let peer_b58 = peer_id.to_base58();
                            if deps.gate.check(&peer_b58) == Verdict::Deny {
                                warn!(peer = %peer_b58, "gate denied connection; disconnecting");
                                deps.metrics.gate_denied_total.inc();
                                let _ = swarm.disconnect_peer_id(peer_id);
                                continue;
                            }
                            deps.metrics.p2p_peers.inc();
                            if let Err(e) = deps.registry.record_connection(&peer_b58) {
                                warn!(err = ?e, "recording connection failed");
                            }
                            // Kick off the profile handshake.
                            swarm.behaviour_mut().profiles.send_request(&peer_id, ProfileRequest::Own);
                            let _ = ev_tx.send(P2pEvent::PeerConnected(peer_b58.clone())).await;
                            info!(peer = %peer_b58, "peer connected");
                        }

                        SwarmEvent::ConnectionClosed { peer_id, .. } => {
                            deps.metrics.p2p_peers.dec();
                            let peer_b58 = peer_id.to_base58();
                            let _ = ev_tx.send(P2pEvent::PeerDisconnected(peer_b58.clone())).await;
                            info!(peer = %peer_b58, "peer disconnected");
                        }

                        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Message { propagation_source, message, .. })) => {
                            let sender_b58 = propagation_source.to_base58();
                            if deps.gate.check(&sender_b58) == Verdict::Deny {
                                debug!(peer = %sender_b58, "message from denied peer; dropping");
                                deps.metrics.gate_denied_total.inc();
                                continue;
                            }
                            if !matcher.matches(message.topic.as_str()) {
                                continue;
                            }
                            if let Err(e) = deps.registry.record_message(&sender_b58, message.data.len() as u64, 0) {
                                warn!(err = ?e, "recording message failed");
                            }
                            deps.router.handle_inbound(&sender_b58, &message.data).await;
                        }

                        SwarmEvent::Behaviour(BehaviourEvent::Profiles(event)) => {
                            handle_profile_event(&mut swarm, &deps, &own_b58, event);
                        }

                        SwarmEvent::Behaviour(BehaviourEvent::Identify(_)) => {}
                        SwarmEvent::Behaviour(BehaviourEvent::Ping(_)) => {}

                        _ => {}
                    }
                }
            }
        }
    });

    Ok((ev_rx, join))
}

fn refresh_topics(
    swarm: &mut Swarm<Behaviour>,
    matcher: &mut TopicMatcher,
    own_b58: &str,
    manager: &SubscriptionManager,
) {
    let schemas = manager.active_schemas();
    let next = TopicMatcher::build(own_b58, schemas.iter().map(String::as_str));
    let (added, removed) = next.diff(matcher);
    for topic in added {
        if let Err(e) = swarm.behaviour_mut().gossipsub.subscribe(&IdentTopic::new(topic.clone())) {
            warn!(topic = %topic, err = ?e, "subscribe failed");
        } else {
            debug!(topic = %topic, "subscribed");
        }
    }
    for topic in removed {
        let _ = swarm.behaviour_mut().gossipsub.unsubscribe(&IdentTopic::new(topic.clone()));
        debug!(topic = %topic, "unsubscribed");
    }
    *matcher = next;
}

fn handle_profile_event(
    swarm: &mut Swarm<Behaviour>,
    deps: &P2pDeps,
    own_b58: &str,
    event: request_response::Event<ProfileRequest, ProfileResponse>,
) {
    match event {
        request_response::Event::Message { peer, message } => match message {
            request_response::Message::Request { request, channel, .. } => {
                let response = match request {
                    ProfileRequest::Own => ProfileResponse::ok(deps.own_profile.clone()),
                    ProfileRequest::Peer(id) if id == own_b58 => {
                        ProfileResponse::ok(deps.own_profile.clone())
                    }
                    ProfileRequest::Peer(id) => match deps.registry.profile_of(&id) {
                        Some(blob) => ProfileResponse::ok(blob),
                        None => ProfileResponse::not_found(),
                    },
                };
                if swarm.behaviour_mut().profiles.send_response(channel, response).is_err() {
                    debug!(peer = %peer, "profile response channel closed");
                    deps.metrics.profile_errors_total.inc();
                } else {
                    deps.metrics.profile_served_total.inc();
                }
            }
            request_response::Message::Response { response, .. } => {
                if response.status != STATUS_OK {
                    debug!(peer = %peer, status = response.status, "profile not available");
                    return;
                }
                match verify_profile(&response.data) {
                    Ok(profile) => {
                        // Only the authenticated stream peer may install a
                        // profile for itself.
                        if profile.peer_id != peer.to_base58() {
                            warn!(peer = %peer, subject = %profile.peer_id, "profile subject mismatch; dropping");
                            deps.metrics.profile_errors_total.inc();
                            return;
                        }
                        if let Err(e) = deps.registry.upsert_from_profile(
                            &profile.peer_id,
                            &profile.display_name,
                            &profile.organization,
                            &profile.addresses,
                            response.data.clone(),
                        ) {
                            warn!(err = ?e, "profile upsert failed");
                        } else {
                            debug!(peer = %peer, "profile stored");
                        }
                    }
                    Err(e) => {
                        debug!(peer = %peer, err = ?e, "profile verification failed");
                        deps.metrics.profile_errors_total.inc();
                    }
                }
            }
        },
        request_response::Event::OutboundFailure { peer, error, .. } => {
            debug!(peer = %peer, err = ?error, "profile request failed");
            deps.metrics.profile_errors_total.inc();
        }
        request_response::Event::InboundFailure { peer, error, .. } => {
            debug!(peer = %peer, err = ?error, "profile serve failed");
            deps.metrics.profile_errors_total.inc();
        }
        request_response::Event::ResponseSent { .. } => {}
    }
}
