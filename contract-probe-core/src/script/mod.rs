//! Verification script generation
//!
//! A contract is turned into a [`ScriptPlan`], rendered from fixed templates,
//! statically validated and hashed. Generation is deterministic: the same
//! contract and target always yield byte-identical text.

pub mod generator;
pub mod lexer;
pub mod prelude;
pub mod translate;
pub mod validate;

pub use generator::{
    Check, CheckKind, EmbeddedTarget, GeneratedScript, ScriptGenerator, ScriptPlan, TargetSource,
    script_hash,
};
pub use translate::{Translation, translate, validate_expression};
pub use validate::validate_script;
