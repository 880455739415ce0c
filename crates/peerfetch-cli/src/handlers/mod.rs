//! Command handlers.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(args: &...) -> Result<(), CliError>`
//! - Thin wrappers that:
//!   1. Validate CLI-specific input
//!   2. Drive the content engine
//!   3. Format output through `presentation`

pub mod race;
