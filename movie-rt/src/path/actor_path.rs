// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

// Layer 2: Third-party crate imports
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Layer 3: Internal module imports
use super::address::{split_scheme, validate_name, Address};
use crate::error::{RtResult, RuntimeError};

/// Position of one actor inside a system's spawn tree.
///
/// An address plus an ordered sequence of path elements. The root guardian
/// has zero segments; its well-known children are `/user` and `/system`.
///
/// Equality is element-wise over (address, segments); hashing uses the
/// canonical string form.
///
/// # Example
/// ```rust
/// use movie_rt::path::{ActorPath, Address};
///
/// let addr = Address::local("server").unwrap();
/// let path = ActorPath::root(addr).child("user").unwrap().child("echo").unwrap();
/// assert_eq!(path.to_string(), "movie://server/user/echo");
/// assert_eq!(ActorPath::parse(&path.to_string()).unwrap(), path);
/// assert_eq!(path.name(), "echo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorPath {
    address: Address,
    segments: Vec<String>,
}

impl ActorPath {
    /// The root path of a system (zero segments).
    pub fn root(address: Address) -> Self {
        Self {
            address,
            segments: Vec::new(),
        }
    }

    /// Assemble from pre-validated parts (kernel internals).
    pub(crate) fn from_parts(address: Address, segments: Vec<String>) -> Self {
        Self { address, segments }
    }

    /// Parse a full URI form (`movie[.tcp]://name[@host:port][/a/b]`).
    pub fn parse(input: &str) -> RtResult<Self> {
        let (protocol, rest) = split_scheme(input)?;
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let address = Address::parse_authority(protocol, authority, input)?;
        let segments = parse_segments(path)?;
        Ok(Self { address, segments })
    }

    /// Resolve a path string against a context address.
    ///
    /// Accepts three shapes: a full URI (the address in the string wins),
    /// an absolute local path (`/user/x`), and a relative local path
    /// (`user/x`, anchored at the root like its absolute twin).
    pub fn resolve(input: &str, context: &Address) -> RtResult<Self> {
        if input.starts_with("movie://") || input.starts_with("movie.tcp://") {
            return Self::parse(input);
        }
        let absolute;
        let path = if input.starts_with('/') {
            input
        } else {
            absolute = format!("/{input}");
            &absolute
        };
        let segments = parse_segments(path)?;
        Ok(Self {
            address: context.clone(),
            segments,
        })
    }

    /// Append one element, yielding the path of a child.
    pub fn child(&self, name: &str) -> RtResult<Self> {
        validate_name(name, "path element")?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self {
            address: self.address.clone(),
            segments,
        })
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            address: self.address.clone(),
            segments,
        })
    }

    /// The last path element, or `""` for the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The system address this path belongs to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The ordered path elements.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The same position under a different address.
    ///
    /// Used when remoting is enabled and the system address switches from
    /// local to remote form.
    pub fn with_address(&self, address: Address) -> Self {
        Self {
            address,
            segments: self.segments.clone(),
        }
    }

    /// The segments-only form: `/` for the root, `/user/echo` otherwise.
    ///
    /// This is the key format of the path registry, which is local to one
    /// system and therefore drops the address.
    pub fn path_str(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            let mut out = String::new();
            for seg in &self.segments {
                out.push('/');
                out.push_str(seg);
            }
            out
        }
    }
}

impl Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

// Hashing uses the string form; equality stays element-wise. The two agree
// because formatting is canonical.
impl Hash for ActorPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Serialize for ActorPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActorPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

fn parse_segments(path: &str) -> RtResult<Vec<String>> {
    if path.is_empty() || path == "/" {
        return Ok(Vec::new());
    }
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed
        .split('/')
        .map(|seg| {
            validate_name(seg, "path element")?;
            Ok(seg.to_string())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn addr() -> Address {
        Address::local("testsys").unwrap()
    }

    #[test]
    fn test_root_has_zero_segments() {
        let root = ActorPath::root(addr());
        assert!(root.segments().is_empty());
        assert_eq!(root.name(), "");
        assert_eq!(root.path_str(), "/");
        assert_eq!(root.to_string(), "movie://testsys");
    }

    #[test]
    fn test_full_uri_round_trip() {
        for s in [
            "movie://testsys",
            "movie://testsys/user",
            "movie://testsys/user/a/b",
            "movie.tcp://testsys@127.0.0.1:9001/user/echo",
        ] {
            let parsed = ActorPath::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
            assert_eq!(ActorPath::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_resolve_absolute_and_relative() {
        let ctx = addr();
        let abs = ActorPath::resolve("/user/x", &ctx).unwrap();
        let rel = ActorPath::resolve("user/x", &ctx).unwrap();
        assert_eq!(abs, rel);
        assert_eq!(abs.to_string(), "movie://testsys/user/x");
    }

    #[test]
    fn test_resolve_full_uri_keeps_its_address() {
        let ctx = addr();
        let p = ActorPath::resolve("movie.tcp://other@h:1/user/y", &ctx).unwrap();
        assert_eq!(p.address().system(), "other");
    }

    #[test]
    fn test_child_and_parent() {
        let root = ActorPath::root(addr());
        let user = root.child("user").unwrap();
        let worker = user.child("worker-1").unwrap();

        assert_eq!(worker.name(), "worker-1");
        assert_eq!(worker.parent().unwrap(), user);
        assert_eq!(user.parent().unwrap(), root);
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_path_str() {
        let p = ActorPath::root(addr())
            .child("user")
            .unwrap()
            .child("echo")
            .unwrap();
        assert_eq!(p.path_str(), "/user/echo");
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(ActorPath::parse("movie://sys//a").is_err());
        let ctx = addr();
        assert!(ActorPath::resolve("/user//x", &ctx).is_err());
    }

    #[test]
    fn test_control_character_rejected() {
        assert!(ActorPath::parse("movie://sys/user/\u{7}bell").is_err());
    }

    #[test]
    fn test_equality_is_element_wise() {
        let a = ActorPath::parse("movie://sys/user/a").unwrap();
        let b = ActorPath::parse("movie://sys/user/a").unwrap();
        let c = ActorPath::parse("movie://sys/user/b").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_uses_string_form() {
        let a = ActorPath::parse("movie://sys/user/a").unwrap();
        let b = ActorPath::parse("movie://sys/user/a").unwrap();

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_with_address_rebases() {
        let p = ActorPath::parse("movie://sys/user/a").unwrap();
        let remote = Address::tcp("sys", "127.0.0.1", 9001).unwrap();
        let rebased = p.with_address(remote);
        assert_eq!(
            rebased.to_string(),
            "movie.tcp://sys@127.0.0.1:9001/user/a"
        );
        assert_eq!(rebased.path_str(), "/user/a");
    }

    #[test]
    fn test_serde_round_trip() {
        let p = ActorPath::parse("movie.tcp://sys@127.0.0.1:9001/user/a").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: ActorPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
