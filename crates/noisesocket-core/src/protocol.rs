//! Protocol identifier and protocol configuration (spec §3).
//!
//! `Protocol` is an immutable handle on a concrete Noise protocol string
//! (`Noise_XX_25519_AESGCM_BLAKE2b`). `ProtocolConfig` carries everything
//! needed to instantiate a [`snow::HandshakeState`] for one handshake
//! instance: role, keys, PSKs, and the application-supplied prologue that
//! is appended after NoiseSocket's own internal prologue (spec §4.3).

use snow::Builder;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{NoiseSocketError, Result};

/// A concrete Noise protocol: handshake pattern + DH + cipher + hash,
/// with optional modifiers (`fallback`, `psk0`..`psk3`).
///
/// Holds the canonical ASCII name (e.g. `Noise_XX_25519_AESGCM_BLAKE2b`)
/// used by `snow` to build handshake states and by test vectors — this
/// layer never puts the name itself on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    name: String,
    params: snow::params::NoiseParams,
}

impl Protocol {
    /// Parse a canonical Noise protocol name.
    ///
    /// Rejects one-way handshake patterns (`N`, `K`, `X`, with or without
    /// PSK modifiers) with [`NoiseSocketError::InvalidArgument`] — spec §9
    /// explicitly allows implementations to refuse them at construction
    /// rather than carry direction restrictions through every call.
    pub fn parse(name: &str) -> Result<Self> {
        let params: snow::params::NoiseParams = name
            .parse()
            .map_err(|_| NoiseSocketError::InvalidArgument(format!("unparseable protocol name {name:?}")))?;

        let pattern_token = pattern_token(name).ok_or_else(|| {
            NoiseSocketError::InvalidArgument(format!("malformed protocol name {name:?}"))
        })?;

        if is_oneway_pattern(pattern_token) {
            return Err(NoiseSocketError::InvalidArgument(format!(
                "one-way handshake pattern {pattern_token:?} is not supported by this NoiseSocket layer"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// The canonical ASCII protocol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the pattern carries a `psk0..psk3` modifier.
    pub fn has_psk_modifier(&self) -> bool {
        pattern_token(&self.name)
            .map(|tok| tok.contains("psk"))
            .unwrap_or(false)
    }

    /// Whether the pattern's *first* transmitted message contains a DH
    /// token (`ee`, `es`, `se`, or `ss`) — i.e. whether a symmetric key is
    /// already mixed in before the first payload is placed.
    ///
    /// True exactly when the responder's static key is known to the
    /// initiator ahead of time (the pattern's second letter is `K`):
    /// `NK`, `XK`, `KK`, `IK`, and their deferred/PSK variants.
    ///
    /// `fallback` patterns are evaluated against their base pattern; the
    /// fallback pre-message (the reused ephemeral from the handshake being
    /// fallen back from) does not itself add a DH token to the first
    /// newly-written message.
    pub fn first_message_has_dh_token(&self) -> bool {
        pattern_token(&self.name)
            .map(|tok| {
                let base = strip_modifiers(tok);
                base.len() >= 2 && base.as_bytes()[1] == b'K'
            })
            .unwrap_or(false)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Extract the `<pattern+modifiers>` token from `Noise_<pattern>_<dh>_<cipher>_<hash>`.
fn pattern_token(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("Noise_")?;
    rest.split('_').next()
}

/// Strip known modifier suffixes (`fallback`, `psk0`..`psk9`, possibly
/// chained) to recover the bare pattern letters.
fn strip_modifiers(token: &str) -> String {
    let mut base = token.to_string();
    loop {
        if let Some(stripped) = base.strip_suffix("fallback") {
            base = stripped.to_string();
            continue;
        }
        if base.len() >= 4 && &base[base.len() - 4..base.len() - 1] == "psk" {
            base.truncate(base.len() - 4);
            continue;
        }
        break;
    }
    base
}

fn is_oneway_pattern(token: &str) -> bool {
    matches!(strip_modifiers(token).as_str(), "N" | "K" | "X")
}

/// Role and keying material for one handshake instance.
///
/// Immutable once a handshake begins. Key material is zeroized on drop.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct ProtocolConfig {
    #[zeroize(skip)]
    initiator: bool,
    /// Application-level prologue, appended after NoiseSocket's own
    /// internal prologue (spec §4.3).
    application_prologue: Vec<u8>,
    local_static_private: Option<Vec<u8>>,
    remote_static_public: Option<Vec<u8>>,
    /// `(location, key)` pairs, in the order they should be fed to the
    /// builder — `location` matches snow's psk-location convention (0 =
    /// mixed in before the first message, n = mixed in after message n-1).
    psks: Vec<(u8, Vec<u8>)>,
}

impl std::fmt::Debug for ProtocolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolConfig")
            .field("initiator", &self.initiator)
            .field("application_prologue_len", &self.application_prologue.len())
            .field("has_local_static", &self.local_static_private.is_some())
            .field("has_remote_static", &self.remote_static_public.is_some())
            .field("psk_count", &self.psks.len())
            .finish()
    }
}

impl ProtocolConfig {
    pub fn new(initiator: bool) -> Self {
        Self {
            initiator,
            ..Default::default()
        }
    }

    pub fn with_application_prologue(mut self, prologue: impl Into<Vec<u8>>) -> Self {
        self.application_prologue = prologue.into();
        self
    }

    pub fn with_local_static_private(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.local_static_private = Some(key.into());
        self
    }

    pub fn with_remote_static_public(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.remote_static_public = Some(key.into());
        self
    }

    pub fn with_psk(mut self, location: u8, key: impl Into<Vec<u8>>) -> Self {
        self.psks.push((location, key.into()));
        self
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn application_prologue(&self) -> &[u8] {
        &self.application_prologue
    }

    pub fn remote_static_public(&self) -> Option<&[u8]> {
        self.remote_static_public.as_deref()
    }

    /// Build the `snow::HandshakeState` for this configuration against an
    /// already-computed prologue (the NoiseSocket-internal prologue, with
    /// the application prologue already appended by the caller).
    pub fn build_handshake_state(
        &self,
        protocol: &Protocol,
        prologue: &[u8],
    ) -> Result<snow::HandshakeState> {
        let mut builder = Builder::new(protocol.params.clone()).prologue(prologue);

        if let Some(key) = &self.local_static_private {
            builder = builder.local_private_key(key);
        }
        if let Some(key) = &self.remote_static_public {
            builder = builder.remote_public_key(key);
        }
        for (location, key) in &self.psks {
            builder = builder.psk(*location, key);
        }

        if self.initiator {
            builder.build_initiator().map_err(NoiseSocketError::Crypto)
        } else {
            builder.build_responder().map_err(NoiseSocketError::Crypto)
        }
    }
}
