//! Network mode classification.
//!
//! A `--network` request is a list of tokens. Each token is `none`, `host`,
//! `container:<id|name>` or the name of a managed (CNI) network, and a request
//! may only contain one kind of token.

use std::fmt;

use bock_common::{BockError, BockResult};

/// Network used when the request names none.
pub const DEFAULT_NETWORK: &str = "bridge";

/// Prefix of the peer-shared token form.
pub const CONTAINER_PREFIX: &str = "container:";

/// The networking mode of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// Private network namespace with loopback only.
    Isolated,
    /// Share the host's network namespace.
    HostShared,
    /// Attach to one or more managed networks, by name.
    Managed(Vec<String>),
    /// Join the network namespace of another container, by reference.
    PeerShared(String),
}

/// The kind of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    None,
    Host,
    Container,
    Managed,
}

impl TokenKind {
    fn of(token: &str) -> Self {
        match token {
            "none" => Self::None,
            "host" => Self::Host,
            t if t.starts_with(CONTAINER_PREFIX) => Self::Container,
            _ => Self::Managed,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Host => write!(f, "host"),
            Self::Container => write!(f, "container"),
            Self::Managed => write!(f, "cni"),
        }
    }
}

/// Classify a list of network tokens into exactly one [`NetworkMode`].
///
/// # Errors
///
/// Returns [`BockError::InvalidNetwork`] when the list mixes token kinds,
/// holds more than one `container:` token, or a `container:` token has an
/// empty or malformed reference.
pub fn classify(tokens: &[String]) -> BockResult<NetworkMode> {
    let Some(first) = tokens.first() else {
        return Ok(NetworkMode::Managed(vec![DEFAULT_NETWORK.to_string()]));
    };

    let kind = TokenKind::of(first);
    if let Some(other) = tokens.iter().map(|t| TokenKind::of(t)).find(|k| *k != kind) {
        return Err(BockError::invalid_network(format!(
            "mixed network types: {kind} and {other} ({})",
            tokens.join(",")
        )));
    }

    match kind {
        TokenKind::None => Ok(NetworkMode::Isolated),
        TokenKind::Host => Ok(NetworkMode::HostShared),
        TokenKind::Container => {
            if tokens.len() > 1 {
                return Err(BockError::invalid_network(
                    "only one network allowed using '--network=container:<container>'",
                ));
            }
            parse_container_ref(first).map(NetworkMode::PeerShared)
        }
        TokenKind::Managed => Ok(NetworkMode::Managed(tokens.to_vec())),
    }
}

fn parse_container_ref(token: &str) -> BockResult<String> {
    match token.strip_prefix(CONTAINER_PREFIX) {
        Some(reference) if !reference.is_empty() && !reference.contains(':') => {
            Ok(reference.to_string())
        }
        _ => Err(BockError::invalid_network(format!(
            "{token}, should be \"container:<id|name>\""
        ))),
    }
}

/// Canonical token recorded for a container sharing `id`'s network.
#[must_use]
pub fn container_token(id: &str) -> String {
    format!("{CONTAINER_PREFIX}{id}")
}
