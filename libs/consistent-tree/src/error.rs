// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// Error returned by [`Cursor::replace`](crate::Cursor::replace).
///
/// Variants that were handed a value give it back.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplaceError<T> {
    /// The cursor is at the end of the tree.
    End,
    /// The cursor's element was erased in the meantime.
    Erased(T),
    /// The new value does not compare equal to the stored one and would break the tree's order.
    Reordered(T),
}

impl<T> ReplaceError<T> {
    /// Returns the rejected value, if there was one.
    pub fn into_value(self) -> Option<T> {
        match self {
            ReplaceError::End => None,
            ReplaceError::Erased(value) | ReplaceError::Reordered(value) => Some(value),
        }
    }
}

impl<T> fmt::Display for ReplaceError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceError::End => write!(f, "cursor is at the end of the tree"),
            ReplaceError::Erased(_) => write!(f, "element was erased"),
            ReplaceError::Reordered(_) => write!(f, "replacement would change the element's position"),
        }
    }
}

impl<T: fmt::Debug> core::error::Error for ReplaceError<T> {}
