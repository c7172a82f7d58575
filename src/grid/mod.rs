//! Photo grid state: paged loading and multi-selection.

pub mod pagination;
pub mod selection;

pub use pagination::{
    GridStatus, PageOutcome, PaginationLoader, ScrollMetrics, ScrollTrigger, SkipReason,
};
pub use selection::{ClickEffect, ClickModifier, SelectionModel};
