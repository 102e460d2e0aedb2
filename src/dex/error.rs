use std::fmt;

use serde::Serialize;

macro_rules! err {
    ($kind:ident, $msg:literal) => {
        DexError::of($crate::dex::error::DexErrorKind::$kind, $msg)
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        DexError::of($crate::dex::error::DexErrorKind::$kind, &format!($fmtstr, $($args)*))
    };
    ($msg:literal) => {
        DexError::new($msg)
    };
    ($fmtstr:literal, $($args:tt)*) => {
        DexError::new(&format!($fmtstr, $($args)*))
    };
}

macro_rules! fail {
    ($kind:ident, $msg:literal) => {
        return Err(err!($kind, $msg))
    };
    ($kind:ident, $fmtstr:literal, $($args:tt)*) => {
        return Err(err!($kind, $fmtstr, $($args)*))
    };
    ($msg:literal) => {
        return Err(DexError::new($msg))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(DexError::new(&format!($fmtstr, $($args)*)))
    };
}

/// Broad classification of a failure, stable enough for callers to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DexErrorKind
{
    /// A read ran past the end of the buffer.
    OutOfBounds,
    /// No decoded record starts at the requested file offset.
    UnknownOffset,
    /// An index into one of the id tables is out of range.
    UnresolvedReference,
    /// A map entry carries a tag outside the known item types.
    UnknownTypeTag,
    /// Magic, endian tag or header offsets are not sane.
    MalformedHeader,
    /// An opcode with no decoding.
    InvalidInstruction,
    /// A lookup that has no answer, e.g. a method without code.
    NotFound,
    /// Any other structural problem.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DexError
{
    kind: DexErrorKind,
    msg: String,
    contexts: Vec<String>,
}

impl DexError
{
    pub(crate) fn new(msg: &str) -> Self
    {
        DexError::of(DexErrorKind::Malformed, msg)
    }

    pub(crate) fn of(kind: DexErrorKind, msg: &str) -> Self
    {
        DexError {
            kind,
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: DexError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        DexError { kind: base.kind, msg: base.msg, contexts }
    }

    pub fn kind(&self) -> DexErrorKind
    {
        self.kind
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for DexError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_chain_in_display() {
        let e = err!(OutOfBounds, "read of {} bytes at {}", 4, 10);
        let e = DexError::with_context(e, "string_data_item".to_string());
        let e = DexError::with_context(e, "map entry 3".to_string());
        assert_eq!(e.kind(), DexErrorKind::OutOfBounds);
        assert_eq!(e.to_string(), "read of 4 bytes at 10 for string_data_item of map entry 3");
    }

    #[test]
    fn fail_returns_early_with_kind() {
        fn check(v: u32) -> Result<u32, DexError> {
            if v > 3 {
                fail!(NotFound, "value {} too large", v);
            }
            Ok(v)
        }
        assert_eq!(check(2), Ok(2));
        assert_eq!(check(9).unwrap_err().kind(), DexErrorKind::NotFound);
    }
}
