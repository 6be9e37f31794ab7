//! Error types for promises
//!
//! A promise can fail in two ways. A *typed rejection* carries a value of the
//! promise's own value type and is meant for expected, domain-level failures.
//! Everything else is an opaque [`Error`]: a cheaply clonable, type-erased
//! token that can still be inspected with [`Error::downcast_ref`].
//!
//! Callables and callbacks report their result as an [`Outcome`], so choosing
//! between the two channels is a tag check rather than a guess.

use std::any::{type_name, Any};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error as ThisError;

/// Failures raised by the library itself
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum PromiseError {
    #[error("promise is not settled yet")]
    NotReady,

    #[error("{0} unhandled control path")]
    UnhandledPath(&'static str),

    #[error("promise collection is empty")]
    EmptyCollection,

    #[error("promise handle was already consumed")]
    Invalid,

    #[error("promise was dropped before it settled")]
    Abandoned,

    #[error("failed to start worker: {0}")]
    Spawn(String),
}

/// One failure per input of an aggregate, in original input order
#[derive(ThisError, Debug, Clone)]
#[error("aggregate error - {} inner errors", .errors.len())]
pub struct AggregateError {
    errors: Vec<Error>,
}

impl AggregateError {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    /// The inner errors, positionally matching the aggregated inputs
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

/// Opaque, type-erased failure
///
/// `Error` deliberately does not implement [`std::error::Error`], so that any
/// standard error converts into it through `?`.
#[derive(Clone)]
pub struct Error {
    inner: Arc<ErrorKind>,
}

/// Standard error that can still be downcast to its concrete type
trait Source: std::error::Error + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<E> Source for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

enum ErrorKind {
    Source(Box<dyn Source>),
    Message(String),
    Panic(String),
    Value {
        type_name: &'static str,
        value: Box<dyn Any + Send + Sync>,
    },
}

impl Error {
    /// Wrap a standard error
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_kind(ErrorKind::Source(Box::new(error)))
    }

    /// Create an error that only carries a message
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::from_kind(ErrorKind::Message(message.to_string()))
    }

    /// Create an error from an arbitrary value, typically a typed rejection
    /// that has to leave its own value channel.
    pub fn from_value<V>(value: V) -> Self
    where
        V: Any + Send + Sync,
    {
        Self::from_kind(ErrorKind::Value {
            type_name: type_name::<V>(),
            value: Box::new(value),
        })
    }

    /// Capture the payload of a caught panic
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        };
        Self::from_kind(ErrorKind::Panic(message))
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            inner: Arc::new(kind),
        }
    }

    /// Borrow the carried value or wrapped error as `E`
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        match &*self.inner {
            ErrorKind::Value { value, .. } => value.downcast_ref::<E>(),
            ErrorKind::Source(source) => {
                <dyn Source as Source>::as_any(&**source).downcast_ref::<E>()
            }
            ErrorKind::Message(_) | ErrorKind::Panic(_) => None,
        }
    }

    pub fn is<E: Any>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// True when the error was captured from a panic
    pub fn is_panic(&self) -> bool {
        matches!(&*self.inner, ErrorKind::Panic(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorKind::Source(source) => write!(f, "{}", source),
            ErrorKind::Message(message) => f.write_str(message),
            ErrorKind::Panic(message) => write!(f, "panicked: {}", message),
            ErrorKind::Value { type_name, .. } => {
                write!(f, "rejected with a value of type `{}`", type_name)
            }
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorKind::Source(source) => f.debug_tuple("Source").field(source).finish(),
            ErrorKind::Message(message) => f.debug_tuple("Message").field(message).finish(),
            ErrorKind::Panic(message) => f.debug_tuple("Panic").field(message).finish(),
            ErrorKind::Value { type_name, .. } => f.debug_tuple("Value").field(type_name).finish(),
        }
    }
}

impl<E> From<E> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Error::new(error)
    }
}

/// The failure side of an [`Outcome`]
#[derive(Clone, Debug)]
pub enum Rejection<T> {
    /// Typed rejection sharing the value type of the promise
    Value(T),
    /// Opaque failure
    Error(Error),
}

impl<T> Rejection<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Rejection::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Rejection::Value(value) => Some(value),
            Rejection::Error(_) => None,
        }
    }

    pub fn error(self) -> Option<Error> {
        match self {
            Rejection::Value(_) => None,
            Rejection::Error(error) => Some(error),
        }
    }
}

impl<T> From<Error> for Rejection<T> {
    fn from(error: Error) -> Self {
        Rejection::Error(error)
    }
}

impl<T, E> From<E> for Rejection<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Rejection::Error(Error::new(error))
    }
}

/// Result of a callable or callback: resolved, typed-rejected or failed
pub type Outcome<T> = Result<T, Rejection<T>>;

/// Shorthand for a typed rejection outcome
pub fn reject<T>(value: T) -> Outcome<T> {
    Err(Rejection::Value(value))
}

/// Shorthand for an opaque failure outcome
pub fn fail<T>(error: impl Into<Error>) -> Outcome<T> {
    Err(Rejection::Error(error.into()))
}

/// Run a user callable, turning a panic into an opaque failure
pub(crate) fn guard<T>(f: impl FnOnce() -> Outcome<T>) -> Outcome<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let error = Error::from_panic(payload);
            tracing::warn!("promise callback panicked: {}", error);
            Err(Rejection::Error(error))
        }
    }
}

/// Move a typed rejection of `T` into the rejection channel of `U`.
///
/// The value stays typed when both types are the same, otherwise it travels
/// on as an opaque error that still downcasts to `T`.
pub(crate) fn carry<T, U>(value: T) -> Rejection<U>
where
    T: Any + Send + Sync,
    U: Any,
{
    let boxed: Box<dyn Any> = Box::new(value);
    match boxed.downcast::<U>() {
        Ok(same) => Rejection::Value(*same),
        Err(other) => match other.downcast::<T>() {
            Ok(original) => Rejection::Error(Error::from_value(*original)),
            Err(_) => Rejection::Error(Error::from(PromiseError::UnhandledPath("rejection carry"))),
        },
    }
}

/// Re-type an outcome whose value type is known to be `U` at runtime.
pub(crate) fn retype<T, U>(outcome: Outcome<T>) -> Outcome<U>
where
    T: Any + Send + Sync,
    U: Any,
{
    match outcome {
        Ok(value) => {
            let boxed: Box<dyn Any> = Box::new(value);
            match boxed.downcast::<U>() {
                Ok(same) => Ok(*same),
                Err(_) => Err(Rejection::Error(Error::from(PromiseError::UnhandledPath(
                    "outcome retype",
                )))),
            }
        }
        Err(Rejection::Value(value)) => Err(carry(value)),
        Err(Rejection::Error(error)) => Err(Rejection::Error(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_error_downcasts() {
        let error = Error::from_value(115i64);
        assert_eq!(error.downcast_ref::<i64>(), Some(&115));
        assert!(error.downcast_ref::<i32>().is_none());
        assert!(error.to_string().contains("i64"));
    }

    #[test]
    fn test_std_error_converts() {
        fn parse(s: &str) -> Outcome<i32> {
            Ok(s.parse::<i32>()?)
        }
        let rejection = parse("nope").unwrap_err();
        let error = rejection.error().unwrap();
        assert!(error.is::<std::num::ParseIntError>());
    }

    #[test]
    fn test_promise_error_roundtrips_through_error() {
        let error: Error = PromiseError::NotReady.into();
        assert_eq!(error.downcast_ref::<PromiseError>(), Some(&PromiseError::NotReady));
    }

    #[test]
    fn test_guard_captures_panic() {
        let outcome: Outcome<i32> = guard(|| panic!("boom"));
        let error = outcome.unwrap_err().error().unwrap();
        assert!(error.is_panic());
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn test_carry_keeps_same_type_typed() {
        match carry::<i32, i32>(7) {
            Rejection::Value(v) => assert_eq!(v, 7),
            Rejection::Error(_) => panic!("expected typed rejection"),
        }
        match carry::<i32, String>(7) {
            Rejection::Error(e) => assert_eq!(e.downcast_ref::<i32>(), Some(&7)),
            Rejection::Value(_) => panic!("expected opaque error"),
        }
    }

    #[test]
    fn test_aggregate_error_display() {
        let aggregate = AggregateError::new(vec![Error::msg("a"), Error::msg("b")]);
        assert_eq!(aggregate.to_string(), "aggregate error - 2 inner errors");
        assert_eq!(aggregate.errors()[1].to_string(), "b");
    }
}
