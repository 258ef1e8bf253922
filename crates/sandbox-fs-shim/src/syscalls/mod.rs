// Exported replacements, grouped by family. Each one checks its path
// arguments and forwards to the next definition of the same symbol.
pub mod attr;
pub mod dir;
pub mod link;
pub mod open;
pub mod path;
pub mod process;
pub mod stat;
