//! Affiliate-tag redirect rules: model, compiler and evaluator.

pub mod compiler;
pub mod matcher;
pub mod model;

pub use compiler::{compile, RuleStrategy};
pub use matcher::{evaluate, RuleMatch};
pub use model::{RedirectRule, RuleUpdate};
