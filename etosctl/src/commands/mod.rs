//! Built-in commands

pub mod testrun;

pub use testrun::TestrunCommand;

use crate::registry::CommandRegistry;

/// Register every built-in command
pub fn register_builtin(registry: &mut CommandRegistry) {
    registry.register(Box::new(TestrunCommand));
}
