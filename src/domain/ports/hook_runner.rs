//! Hook runner port.
//!
//! The seam between the hook queue and whatever actually executes a hook.
//! Production wires this to the process pool; tests inject lightweight
//! runners to exercise queue semantics without subprocesses.

use async_trait::async_trait;

use crate::domain::errors::HiveResult;
use crate::domain::models::{HookArgs, HookOutput, HookType};

/// Executes a single hook attempt and returns its captured output.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run(&self, hook_type: HookType, args: &HookArgs) -> HiveResult<HookOutput>;
}
