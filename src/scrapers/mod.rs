//! Collection phase: turning the live feed into publication records.
//!
//! Collection follows a two-step pattern:
//!
//! 1. **Pagination** ([`paginate`]): drive the infinite-scroll feed until the
//!    target count is reached or loading stalls, checkpointing along the way
//! 2. **Extraction** ([`extract`]): parse a feed snapshot into
//!    [`Publication`](crate::models::Publication) records
//!
//! # Feed layout
//!
//! | Part | Default selector | Notes |
//! |------|------------------|-------|
//! | Container | `div.dl-wrapper` | absent until the feed has loaded |
//! | Date group | `dl` | |
//! | Date heading | `dt` | `15 March 2024` or ISO |
//! | Content block | `dd` | paired with the heading at the same index |
//! | Link | `a[href]` | skipped inside `div.accordion` |

pub mod extract;
pub mod paginate;
