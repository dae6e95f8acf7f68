// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};

/// URI scheme for in-process addresses.
pub const PROTOCOL_LOCAL: &str = "movie";

/// URI scheme for addresses reachable over TCP.
pub const PROTOCOL_REMOTE: &str = "movie.tcp";

/// Transport protocol of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// In-process only (`movie://`).
    Local,
    /// Reachable over TCP (`movie.tcp://`).
    Tcp,
}

impl Protocol {
    /// The URI scheme for this protocol.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Local => PROTOCOL_LOCAL,
            Self::Tcp => PROTOCOL_REMOTE,
        }
    }
}

/// Host/port pair of a remote address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Identity of one actor system.
///
/// A triple of protocol, system name, and (for remote addresses) an
/// endpoint. The endpoint is present iff the protocol is
/// [`Protocol::Tcp`]; the constructors enforce this.
///
/// # Example
/// ```rust
/// use movie_rt::path::Address;
///
/// let local = Address::local("server").unwrap();
/// assert_eq!(local.to_string(), "movie://server");
///
/// let remote = Address::tcp("server", "127.0.0.1", 9001).unwrap();
/// assert_eq!(remote.to_string(), "movie.tcp://server@127.0.0.1:9001");
/// assert_eq!(Address::parse(&remote.to_string()).unwrap(), remote);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    protocol: Protocol,
    system: String,
    endpoint: Option<Endpoint>,
}

impl Address {
    /// Create a local address.
    pub fn local(system: impl Into<String>) -> RtResult<Self> {
        let system = system.into();
        validate_name(&system, "system name")?;
        Ok(Self {
            protocol: Protocol::Local,
            system,
            endpoint: None,
        })
    }

    /// Create a remote (TCP) address.
    pub fn tcp(system: impl Into<String>, host: impl Into<String>, port: u16) -> RtResult<Self> {
        let system = system.into();
        let host = host.into();
        validate_name(&system, "system name")?;
        validate_name(&host, "host")?;
        Ok(Self {
            protocol: Protocol::Tcp,
            system,
            endpoint: Some(Endpoint { host, port }),
        })
    }

    /// Parse the canonical string form.
    ///
    /// Accepts `movie://name` and `movie.tcp://name@host:port`.
    pub fn parse(input: &str) -> RtResult<Self> {
        let (protocol, rest) = split_scheme(input)?;
        if rest.contains('/') {
            return Err(RuntimeError::BadPath(format!(
                "address must not contain path segments: {input}"
            )));
        }
        Self::parse_authority(protocol, rest, input)
    }

    pub(crate) fn parse_authority(protocol: Protocol, rest: &str, input: &str) -> RtResult<Self> {
        match protocol {
            Protocol::Local => {
                if rest.contains('@') {
                    return Err(RuntimeError::BadPath(format!(
                        "local address must not carry an endpoint: {input}"
                    )));
                }
                Self::local(rest)
            }
            Protocol::Tcp => {
                let (system, endpoint) = rest.split_once('@').ok_or_else(|| {
                    RuntimeError::BadPath(format!("remote address requires @host:port: {input}"))
                })?;
                let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| {
                    RuntimeError::BadPath(format!("malformed endpoint in: {input}"))
                })?;
                let port: u16 = port.parse().map_err(|_| {
                    RuntimeError::BadPath(format!("malformed port in: {input}"))
                })?;
                Self::tcp(system, host, port)
            }
        }
    }

    /// The transport protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The system name.
    pub fn system(&self) -> &str {
        &self.system
    }

    /// The endpoint, present iff the address is remote.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Whether the address is reachable over TCP.
    pub fn is_remote(&self) -> bool {
        self.protocol == Protocol::Tcp
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(ep) => write!(f, "{}://{}@{}", self.protocol.scheme(), self.system, ep),
            None => write!(f, "{}://{}", self.protocol.scheme(), self.system),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

/// Split `movie://rest` / `movie.tcp://rest` into protocol and remainder.
pub(crate) fn split_scheme(input: &str) -> RtResult<(Protocol, &str)> {
    if let Some(rest) = input.strip_prefix("movie.tcp://") {
        Ok((Protocol::Tcp, rest))
    } else if let Some(rest) = input.strip_prefix("movie://") {
        Ok((Protocol::Local, rest))
    } else {
        Err(RuntimeError::BadPath(format!(
            "expected movie:// or movie.tcp:// scheme: {input}"
        )))
    }
}

/// Names must be non-empty and free of separators and control characters.
pub(crate) fn validate_name(name: &str, what: &str) -> RtResult<()> {
    if name.is_empty() {
        return Err(RuntimeError::BadPath(format!("empty {what}")));
    }
    if name
        .chars()
        .any(|c| c.is_control() || c == '/' || c == '@' || c == ':')
    {
        return Err(RuntimeError::BadPath(format!(
            "invalid character in {what}: {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_local_round_trip() {
        let addr = Address::local("orchestrator").unwrap();
        let formatted = addr.to_string();
        assert_eq!(formatted, "movie://orchestrator");
        assert_eq!(Address::parse(&formatted).unwrap(), addr);
    }

    #[test]
    fn test_remote_round_trip() {
        let addr = Address::tcp("shard-2", "10.0.0.7", 4040).unwrap();
        let formatted = addr.to_string();
        assert_eq!(formatted, "movie.tcp://shard-2@10.0.0.7:4040");
        assert_eq!(Address::parse(&formatted).unwrap(), addr);
    }

    #[test]
    fn test_endpoint_iff_remote() {
        let local = Address::local("a").unwrap();
        assert!(local.endpoint().is_none());
        assert!(!local.is_remote());

        let remote = Address::tcp("a", "localhost", 1).unwrap();
        assert!(remote.endpoint().is_some());
        assert!(remote.is_remote());
    }

    #[test]
    fn test_empty_system_rejected() {
        assert!(matches!(
            Address::parse("movie://"),
            Err(RuntimeError::BadPath(_))
        ));
        assert!(matches!(
            Address::local(""),
            Err(RuntimeError::BadPath(_))
        ));
    }

    #[test]
    fn test_malformed_endpoint_rejected() {
        assert!(Address::parse("movie.tcp://sys").is_err());
        assert!(Address::parse("movie.tcp://sys@host").is_err());
        assert!(Address::parse("movie.tcp://sys@host:notaport").is_err());
        assert!(Address::parse("movie.tcp://sys@host:99999").is_err());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(Address::parse("http://sys").is_err());
        assert!(Address::parse("movies://sys").is_err());
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(Address::local("bad\u{1}name").is_err());
        assert!(Address::tcp("sys", "bad\thost", 1).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Address::tcp("sys", "127.0.0.1", 9001).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"movie.tcp://sys@127.0.0.1:9001\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
