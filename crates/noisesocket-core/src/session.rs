//! Session state machine (spec §4.5) and the lifecycle/call-order
//! bookkeeping that the handshake and transport framing layers (§4.4,
//! §4.2) consult on every public operation.
//!
//! This module owns no I/O — it tracks *whether* an operation is legal
//! right now and what it should do to the Noise handshake state. The
//! actual packet reads/writes live in [`crate::handshake`] and
//! [`crate::transport`]; the public surface lives in [`crate::socket`].

use crate::error::{NoiseSocketError, Result};
use crate::prologue::{InitTag, PrologueAccumulator};
use crate::protocol::{Protocol, ProtocolConfig};

/// Which side of the byte stream this session is. Fixed at construction,
/// never changes — distinct from the Noise-level initiator/responder
/// role, which *can* flip across a reinitialization (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Client,
    Server,
}

/// The four-step call-order cycle from spec §4.3, phase-shifted by stream
/// role. Client cycles `[WriteNeg, WriteHs, ReadNeg, ReadHs]`; server
/// cycles the same sequence starting two steps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOp {
    WriteNeg,
    WriteHs,
    ReadNeg,
    ReadHs,
}

const CYCLE: [HandshakeOp; 4] = [
    HandshakeOp::WriteNeg,
    HandshakeOp::WriteHs,
    HandshakeOp::ReadNeg,
    HandshakeOp::ReadHs,
];

/// Overall session lifecycle (spec §3's "Lifecycle state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Handshake in progress (covers Initial and the post-Accept/Switch/
    /// Retry sub-states — they differ only in `init_tag` and in whether
    /// `reinitialized` has been consumed).
    Negotiating,
    /// The transport handle exists; no further handshake operations.
    HandshakeComplete,
    /// Disposed. No further operations of any kind.
    Closed,
}

/// Which reinitialization operation is legal for a given `(stream_role,
/// resulting Noise role)` pair (spec §4.5 role matrix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinitOp {
    Accept,
    Switch,
    Retry,
}

pub struct Session {
    stream_role: StreamRole,
    turn_index: u8,
    phase: Phase,
    reinitialized: bool,

    protocol: Option<Protocol>,
    config: Option<ProtocolConfig>,
    init_tag: InitTag,

    handshake_state: Option<snow::HandshakeState>,
    transport: Option<snow::TransportState>,
    is_next_message_encrypted: bool,
    prologue: PrologueAccumulator,
    handshake_hash: Option<Vec<u8>>,
    remote_static: Option<Vec<u8>>,
}

impl Session {
    /// Construct a client (initiator) session. The client has already
    /// committed to a protocol; it never calls Accept.
    pub fn new_client(protocol: Protocol, config: ProtocolConfig) -> Result<Self> {
        if !config.is_initiator() {
            return Err(NoiseSocketError::InvalidArgument(
                "client session requires an initiator ProtocolConfig".into(),
            ));
        }
        let is_next_message_encrypted = initial_encrypted_flag(&protocol);
        Ok(Self {
            stream_role: StreamRole::Client,
            turn_index: 0,
            phase: Phase::Negotiating,
            reinitialized: false,
            protocol: Some(protocol),
            config: Some(config),
            init_tag: InitTag::Initial,
            handshake_state: None,
            transport: None,
            is_next_message_encrypted,
            prologue: PrologueAccumulator::new(),
            handshake_hash: None,
            remote_static: None,
        })
    }

    /// Construct a server (responder) session with no protocol chosen
    /// yet — the application decides after reading the first negotiation
    /// data, via `accept`/`switch`/`retry`.
    pub fn new_server() -> Self {
        Self {
            stream_role: StreamRole::Server,
            turn_index: 2, // server's cycle starts at ReadNeg
            phase: Phase::Negotiating,
            reinitialized: false,
            protocol: None,
            config: None,
            init_tag: InitTag::Initial,
            handshake_state: None,
            transport: None,
            is_next_message_encrypted: false,
            prologue: PrologueAccumulator::new(),
            handshake_hash: None,
            remote_static: None,
        }
    }

    pub fn stream_role(&self) -> StreamRole {
        self.stream_role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_handshake_finished(&self) -> bool {
        matches!(self.phase, Phase::HandshakeComplete)
    }

    pub fn is_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    pub fn handshake_hash(&self) -> Result<&[u8]> {
        self.handshake_hash.as_deref().ok_or_else(|| {
            NoiseSocketError::OutOfOrder(
                "handshake_hash is only readable once the transport handle exists".into(),
            )
        })
    }

    pub fn remote_static(&self) -> Option<&[u8]> {
        self.remote_static.as_deref()
    }

    pub fn protocol(&self) -> Option<&Protocol> {
        self.protocol.as_ref()
    }

    // ── Reinitialization (spec §4.5) ────────────────────────────────────

    /// Apply Accept/Switch/Retry. At most one may succeed per session.
    pub fn reinitialize(&mut self, op: ReinitOp, protocol: Protocol, config: ProtocolConfig) -> Result<()> {
        if !matches!(self.phase, Phase::Negotiating) {
            return Err(NoiseSocketError::OutOfOrder(
                "accept/switch/retry may only be called during the handshake phase".into(),
            ));
        }
        if self.reinitialized {
            return Err(NoiseSocketError::OutOfOrder(
                "accept/switch/retry may be called at most once per session".into(),
            ));
        }

        let required_initiator = match (op, self.stream_role) {
            (ReinitOp::Accept, StreamRole::Server) => false,
            (ReinitOp::Switch, StreamRole::Client) => false,
            (ReinitOp::Switch, StreamRole::Server) => true,
            (ReinitOp::Retry, StreamRole::Client) => true,
            (ReinitOp::Retry, StreamRole::Server) => false,
            _ => {
                return Err(NoiseSocketError::OutOfOrder(format!(
                    "{op:?} may not be called by the {role:?} side",
                    role = self.stream_role
                )))
            }
        };
        if config.is_initiator() != required_initiator {
            return Err(NoiseSocketError::OutOfOrder(format!(
                "{op:?} on the {role:?} side requires a ProtocolConfig with is_initiator()={required_initiator}",
                role = self.stream_role
            )));
        }

        // Step 3: discard any previously (speculatively) created handshake state.
        self.handshake_state = None;
        // The discarded attempt's own negotiation data and noise message
        // (queued in `pending` while the accumulator was frozen for that
        // attempt's build) rejoin the transcript so the replacement
        // attempt's prologue sees the full accumulation count §4.3 requires.
        self.prologue.rearm();

        self.is_next_message_encrypted = initial_encrypted_flag(&protocol);
        self.protocol = Some(protocol);
        self.config = Some(config);
        self.init_tag = match op {
            ReinitOp::Accept => InitTag::Initial,
            ReinitOp::Switch => InitTag::Switch,
            ReinitOp::Retry => InitTag::Retry,
        };
        self.reinitialized = true;
        Ok(())
    }

    // ── Call-order enforcement (spec §4.3) ──────────────────────────────

    pub(crate) fn expect(&self, op: HandshakeOp) -> Result<()> {
        if !matches!(self.phase, Phase::Negotiating) {
            return Err(NoiseSocketError::OutOfOrder(format!(
                "{op:?} is a handshake operation but the session is not negotiating"
            )));
        }
        let expected = CYCLE[(self.turn_index as usize) % 4];
        if expected != op {
            return Err(NoiseSocketError::OutOfOrder(format!(
                "expected {expected:?} next, got {op:?}"
            )));
        }
        Ok(())
    }

    pub(crate) fn advance(&mut self, steps: u8) {
        self.turn_index = (self.turn_index + steps) % 4;
    }

    // ── Handshake state / prologue access for the framing layer ────────

    pub(crate) fn protocol_config(&self) -> Result<(&Protocol, &ProtocolConfig)> {
        match (&self.protocol, &self.config) {
            (Some(p), Some(c)) => Ok((p, c)),
            _ => Err(NoiseSocketError::OutOfOrder(
                "no protocol has been chosen yet — the server must call accept/switch/retry first".into(),
            )),
        }
    }

    pub(crate) fn prologue_mut(&mut self) -> &mut PrologueAccumulator {
        &mut self.prologue
    }

    pub(crate) fn init_tag(&self) -> InitTag {
        self.init_tag
    }

    pub(crate) fn has_handshake_state(&self) -> bool {
        self.handshake_state.is_some()
    }

    pub(crate) fn handshake_state_mut(&mut self) -> Result<&mut snow::HandshakeState> {
        self.handshake_state.as_mut().ok_or_else(|| {
            NoiseSocketError::OutOfOrder("handshake state has not been constructed yet".into())
        })
    }

    pub(crate) fn set_handshake_state(&mut self, state: snow::HandshakeState) {
        self.handshake_state = Some(state);
    }

    pub(crate) fn is_next_message_encrypted(&self) -> bool {
        self.is_next_message_encrypted
    }

    pub(crate) fn mark_real_message_exchanged(&mut self) {
        self.is_next_message_encrypted = true;
    }

    /// Complete the handshake: capture the hash, drop the handshake
    /// state, install the transport. Called by the framing layer the
    /// instant `snow` reports the handshake finished.
    pub(crate) fn complete_handshake(&mut self, transport: snow::TransportState, hash: Vec<u8>, remote_static: Option<Vec<u8>>) {
        self.handshake_hash = Some(hash);
        self.remote_static = remote_static;
        self.transport = Some(transport);
        self.handshake_state = None;
        self.phase = Phase::HandshakeComplete;
    }

    /// If the handshake state reports finished, consume it and install the
    /// transport handle. A no-op if the handshake is still in progress or
    /// there is no handshake state (shouldn't happen if called right after
    /// a handshake write/read, but harmless either way).
    pub(crate) fn finish_handshake_if_ready(&mut self) -> Result<()> {
        let finished = match &self.handshake_state {
            Some(state) => state.is_handshake_finished(),
            None => false,
        };
        if !finished {
            return Ok(());
        }
        let state = self.handshake_state.take().expect("checked Some above");
        let hash = state.get_handshake_hash().to_vec();
        let remote_static = state.get_remote_static().map(|s| s.to_vec());
        let transport = state.into_transport_mode()?;
        self.complete_handshake(transport, hash, remote_static);
        Ok(())
    }

    pub(crate) fn transport_mut(&mut self) -> Result<&mut snow::TransportState> {
        if !matches!(self.phase, Phase::HandshakeComplete) {
            return Err(NoiseSocketError::OutOfOrder(
                "transport operations require a completed handshake".into(),
            ));
        }
        self.transport.as_mut().ok_or_else(|| {
            NoiseSocketError::OutOfOrder("transport handle does not exist".into())
        })
    }

    pub(crate) fn ensure_negotiating(&self) -> Result<()> {
        match self.phase {
            Phase::Negotiating => Ok(()),
            Phase::HandshakeComplete => Err(NoiseSocketError::OutOfOrder(
                "handshake already complete — no further handshake operations".into(),
            )),
            Phase::Closed => Err(NoiseSocketError::Disposed),
        }
    }

    pub fn dispose(&mut self) {
        self.handshake_state = None;
        self.transport = None;
        self.phase = Phase::Closed;
    }
}

fn initial_encrypted_flag(protocol: &Protocol) -> bool {
    protocol.has_psk_modifier() || protocol.first_message_has_dh_token()
}
