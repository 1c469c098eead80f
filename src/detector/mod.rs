pub mod badges;
pub mod pair_tags;

pub use badges::{classify, render, Badge, BadgeSignals};
pub use pair_tags::pair_tags;
