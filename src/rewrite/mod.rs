//! URL rewrite engine
//!
//! - `url_pair`: origin/public URLs parsed from configuration
//! - `ruleset`: ordered substring substitutions
//! - `accumulator`: per text node buffering for fragmented input

pub mod url_pair;
pub mod ruleset;
pub mod accumulator;

pub use url_pair::{Endpoint, UrlPair};
pub use ruleset::{PortSuffix, RewriteRule, Ruleset};
pub use accumulator::{Emission, TextAccumulator, TextNodeSlot};
