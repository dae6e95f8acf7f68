// Layer 1: Standard library imports
use std::fmt::Debug;

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
// (none)

/// Core message trait with compile-time type identification.
///
/// # Zero-Cost Abstraction
/// Uses a const `MESSAGE_TYPE` instead of runtime reflection. The constant
/// doubles as the wire tag: it is the key under which the type is entered
/// in the [message registry](crate::message::MessageRegistry), so two
/// peers exchanging a type must agree on it.
///
/// # Example
/// ```rust
/// use movie_rt::message::Message;
///
/// #[derive(Debug, Clone)]
/// struct RankQuery {
///     title: String,
/// }
///
/// impl Message for RankQuery {
///     const MESSAGE_TYPE: &'static str = "RankQuery";
/// }
/// ```
pub trait Message: Send + Sync + Clone + Debug + 'static {
    /// Unique message type identifier (compile-time constant).
    ///
    /// Identifies the type on the wire and in log output without runtime
    /// reflection.
    const MESSAGE_TYPE: &'static str;
}

// Plain strings are a common reply type for asks.
impl Message for String {
    const MESSAGE_TYPE: &'static str = "string";
}

impl Message for () {
    const MESSAGE_TYPE: &'static str = "unit";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    #[allow(dead_code)]
    struct TestMessage {
        content: String,
    }

    impl Message for TestMessage {
        const MESSAGE_TYPE: &'static str = "test_message";
    }

    #[test]
    fn test_message_type_constant() {
        assert_eq!(TestMessage::MESSAGE_TYPE, "test_message");
        assert_eq!(String::MESSAGE_TYPE, "string");
        assert_eq!(<()>::MESSAGE_TYPE, "unit");
    }
}
