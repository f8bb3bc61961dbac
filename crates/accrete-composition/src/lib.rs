//! Accrete Composition
//!
//! Conflict-checked accumulation of configuration contributed by
//! capabilities.
//!
//! # Facets
//!
//! | Facet | Strategy | Conflict |
//! |-------|----------|----------|
//! | mounts | single writer per destination | different mount at same path |
//! | extra_args | ordered by `(priority, declaration_index)` | never |
//! | loggers | single writer per name | different level |
//! | flags | single writer per name | different value |
//! | modules | single writer per module path | different config |
//!
//! # Example
//!
//! ```rust
//! use accrete_capability::{CapabilityId, Contributions};
//! use accrete_composition::{AccretionStore, Contributor, MergeOutcome};
//!
//! let mut store = AccretionStore::new();
//! let who = Contributor::new(CapabilityId::new("metrics").unwrap(), 0, 0);
//! let outcome = store
//!     .merge(&who, &Contributions::new().with_arg("--enable-metrics"))
//!     .unwrap();
//! assert_eq!(outcome, MergeOutcome::Merged);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod keyed;
pub mod ordered;
pub mod single_writer;
pub mod store;
pub mod strategy;

pub use keyed::{FlagSpec, Keyed};
pub use ordered::{ArgBlock, OrderedArgs};
pub use single_writer::{Attributed, SingleWriterFacet};
pub use store::{
    AccretionStore, ContributorRecord, MergeOutcome, MountFacet, RenderedConfig, StoreSnapshot,
};
pub use strategy::{Contributor, FacetStrategy, MergeError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod proptests {
    use super::*;
    use accrete_capability::{CapabilityId, Contributions, LogLevel, LoggerSpec, MountSpec};
    use proptest::prelude::*;

    // Capability i owns mount i and logger i, shares one identical logger and
    // contributes one argument at a random priority.
    fn capability(i: usize, priority: i64) -> (Contributor, Contributions) {
        let contributor = Contributor::new(CapabilityId::new(format!("cap{i}")).unwrap(), priority, i);
        let contributions = Contributions::new()
            .with_mount(MountSpec::read_only(
                format!("/ext/cap{i}.py"),
                format!("/usr/lib/cap{i}.py"),
            ))
            .with_logger(LoggerSpec::new(format!("cap{i}"), LogLevel::Debug))
            .with_logger(LoggerSpec::new("synapse", LogLevel::Info))
            .with_flag(format!("cap{i}_enabled"), true)
            .with_arg(format!("--cap{i}"));
        (contributor, contributions)
    }

    proptest! {
        #[test]
        fn merge_order_does_not_change_store_content(
            priorities in prop::collection::vec(-5i64..5, 1..8),
            seed in any::<u64>(),
        ) {
            let caps: Vec<_> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| capability(i, *p))
                .collect();

            let mut forward = AccretionStore::new();
            for (c, contributions) in &caps {
                forward.merge(c, contributions).unwrap();
            }

            // Deterministic shuffle from seed
            let mut order: Vec<usize> = (0..caps.len()).collect();
            let mut state = seed;
            for i in (1..order.len()).rev() {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                let j = usize::try_from(state >> 33).unwrap() % (i + 1);
                order.swap(i, j);
            }

            let mut shuffled = AccretionStore::new();
            for i in order {
                let (c, contributions) = &caps[i];
                shuffled.merge(c, contributions).unwrap();
            }

            prop_assert_eq!(forward.render(), shuffled.render());
            prop_assert_eq!(forward.snapshot(), shuffled.snapshot());
            prop_assert_eq!(&forward, &shuffled);
        }

        #[test]
        fn merging_twice_is_idempotent(priorities in prop::collection::vec(-5i64..5, 1..6)) {
            let caps: Vec<_> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| capability(i, *p))
                .collect();

            let mut store = AccretionStore::new();
            for (c, contributions) in &caps {
                store.merge(c, contributions).unwrap();
            }
            let once = store.snapshot();

            for (c, contributions) in &caps {
                prop_assert_eq!(store.merge(c, contributions).unwrap(), MergeOutcome::AlreadyMerged);
            }
            prop_assert_eq!(store.snapshot(), once);
        }
    }
}
