//! # Query Engine
//!
//! Multi-type intersection passes over a [`World`](crate::World).
//!
//! A query names 1 to 8 component types as a tuple. The store with the
//! fewest values drives the pass and every other store is probed by sparse
//! lookup, so a pass costs O(smallest store) no matter how large the others
//! grow.
//!
//! | post-phase            | sequential               | parallel                     |
//! |-----------------------|--------------------------|------------------------------|
//! | none                  | `for_each`               | `par_for_each`               |
//! | consume input tags    | `for_each_consume`       | `par_for_each_consume`       |
//! | consume + output tag  | `for_each_add_tag`       | `par_for_each_add_tag`       |
//! | consume + commands    | `for_each_with_commands` | `par_for_each_with_commands` |

mod commands;
mod fetch;
mod pass;

pub use commands::CommandBuffer;
pub use fetch::Query;
