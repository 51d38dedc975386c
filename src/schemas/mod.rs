//! Output record schemas
//!
//! The harvested record is an open-ended attribute bag upstream; these
//! structs pin the stable field catalog with defaults so every emitted
//! line has a consistent shape. Unknown upstream fields are preserved
//! in a catch-all map rather than dropped.

pub mod record;
pub mod twitter;

pub use record::*;
pub use twitter::*;
