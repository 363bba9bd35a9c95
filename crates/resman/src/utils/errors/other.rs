//! A catch-all error for failures that have no variant of their own, such as
//! a malformed patch header or a chunk entry that points past its chunk.

use std::{
    any::Any,
    borrow::Cow,
    fmt::{Debug, Display},
};

/// An opaque error carrying a message chain.
pub struct OtherError(anyhow::Error);

impl OtherError {
    /// Wraps `err`. An `OtherError` passed in is returned as is rather than
    /// nested inside another.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut slot = Some(err);
        if let Some(other) = (&mut slot as &mut dyn Any)
            .downcast_mut::<Option<OtherError>>()
            .and_then(Option::take)
        {
            return other;
        }
        match slot {
            Some(err) => OtherError(anyhow::Error::new(err)),
            None => OtherError::from_msg("error was already taken"),
        }
    }

    pub fn from_msg<M>(msg: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        OtherError(anyhow::Error::msg(msg))
    }
}

impl Display for OtherError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for OtherError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for OtherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

pub trait ResultExt<T> {
    fn with_other_err(self) -> Result<T, OtherError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_other_err(self) -> Result<T, OtherError> {
        self.map_err(OtherError::new)
    }
}

pub trait OptionExt<T> {
    /// Turns a missing value into an [`OtherError`] with the given message.
    fn ok_or_else_other<F, M>(self, message: F) -> Result<T, OtherError>
    where
        F: FnOnce() -> M,
        M: Into<Cow<'static, str>>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_other<F, M>(self, message: F) -> Result<T, OtherError>
    where
        F: FnOnce() -> M,
        M: Into<Cow<'static, str>>,
    {
        self.ok_or_else(|| OtherError::from_msg(message().into()))
    }
}

/// Returns an [`OtherError`] from the enclosing function unless `$cond`
/// holds. The error is converted with `.into()`, and callers need not
/// import `OtherError` themselves.
macro_rules! ensure_other {
    ($cond:expr, $msg:literal, $($arg:expr),*) => {
        if !$cond {
            return Err($crate::utils::errors::OtherError::from_msg(format!($msg, $($arg),*)).into());
        }
    };
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::utils::errors::OtherError::from_msg($msg).into());
        }
    };
}

macro_rules! bail_other {
    ($msg:literal, $($arg:expr),*) => {
        return Err($crate::utils::errors::OtherError::from_msg(format!($msg, $($arg),*)).into())
    };
    ($msg:literal) => {
        return Err($crate::utils::errors::OtherError::from_msg($msg).into())
    };
}

pub(crate) use {bail_other, ensure_other};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("patch header is truncated")]
    struct TruncatedHeader;

    fn check_chunk(end: usize, len: usize) -> Result<(), OtherError> {
        ensure_other!(end <= len, "entry ends at {}, chunk holds {}", end, len);
        Ok(())
    }

    #[test]
    fn rewrapping_keeps_the_original() {
        let err = OtherError::new(OtherError::from_msg("view.000 is empty"));
        assert_eq!(err.to_string(), "view.000 is empty");
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let result: Result<(), TruncatedHeader> = Err(TruncatedHeader);
        let err = result.with_other_err().unwrap_err();
        assert_eq!(err.to_string(), "patch header is truncated");
    }

    #[test]
    fn missing_values_become_errors() {
        let chunk: Option<&[u8]> = None;
        let err = chunk.ok_or_else_other(|| "chunk 3 is missing").unwrap_err();
        assert_eq!(err.to_string(), "chunk 3 is missing");
    }

    #[test]
    fn ensure_formats_its_message() {
        assert!(check_chunk(10, 12).is_ok());
        let err = check_chunk(14, 12).unwrap_err();
        assert_eq!(err.to_string(), "entry ends at 14, chunk holds 12");
    }
}
