// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Value types carried by locals and saved slots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Void,
    Bool,
    Int,
    Str,
    /// Handle to a runtime mailbox
    Mailbox,
    /// Dynamically typed value (messages, exceptions)
    Any,
}
