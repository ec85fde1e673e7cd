mod range;
mod tags;

pub use range::Range;
pub use semver::Version;
pub use tags::{highest_non_prerelease, match_tag, parse, sort_tags};
