//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and quoting
//! - `template` - Config template placeholders
//! - `validation` - Required-setting and boolean-like checks

pub mod shell;
pub mod template;
pub mod validation;
