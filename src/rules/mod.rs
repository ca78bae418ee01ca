//! Verification Rules and Checks
//!
//! A [`Rule`] binds one information source (by hash commitment) to a data key
//! and a freshness window. [`Check`]s hang off a rule and name a plugin plus
//! its parameters and weight.
//!
//! ## Lifecycle
//!
//! - Rules and checks are created by a policy administrator
//! - Only the `active` flag ever changes after creation
//! - Checks are deactivated, never removed, so audit history stays resolvable

mod models;
mod store;

pub use models::{Check, CheckId, Rule, RuleId};
pub use store::{CatalogStore, RuleCatalog, RuleStore};
