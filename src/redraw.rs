//! Redraw notification payload model.
//!
//! A `redraw` payload is a sequence of batches; a batch is a sequence of
//! updates; an update is an array `[op, args1, args2, ...]` where each
//! `argsN` is one argument list for the handler of `op`.

use std::slice;

use serde_json::Value;
use thiserror::Error;

/// One redraw operation with the argument lists to apply it to, borrowed
/// from the notification payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Update<'a> {
    pub op: &'a str,
    pub calls: Vec<&'a [Value]>,
}

/// Malformed redraw payload entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedrawParseError {
    #[error("redraw batch is not an array")]
    BatchNotArray,

    #[error("redraw update is not an array")]
    UpdateNotArray,

    #[error("redraw update has no operation name")]
    MissingOp,
}

impl<'a> Update<'a> {
    /// Decode an `[op, args...]` array.
    ///
    /// An argument entry that is not an array is a single-argument list, so
    /// `["put", "hello"]` invokes `put` with `["hello"]`.
    ///
    /// # Errors
    /// Returns [`RedrawParseError`] if `value` is not an array or does not
    /// start with a string.
    pub fn from_value(value: &'a Value) -> Result<Self, RedrawParseError> {
        let items = value.as_array().ok_or(RedrawParseError::UpdateNotArray)?;
        let (op, rest) = items.split_first().ok_or(RedrawParseError::MissingOp)?;
        let op = op.as_str().ok_or(RedrawParseError::MissingOp)?;
        let calls = rest
            .iter()
            .map(|args| match args {
                Value::Array(list) => list.as_slice(),
                single => slice::from_ref(single),
            })
            .collect();
        Ok(Self { op, calls })
    }
}

/// View one payload element as a batch of raw update values.
///
/// # Errors
/// Returns [`RedrawParseError::BatchNotArray`] for non-array elements.
pub fn batch_updates(batch: &Value) -> Result<&[Value], RedrawParseError> {
    batch
        .as_array()
        .map(Vec::as_slice)
        .ok_or(RedrawParseError::BatchNotArray)
}
