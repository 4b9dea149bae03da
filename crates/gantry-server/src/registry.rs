//! Command name → handler tables.
//!
//! Each subsystem contributes two registries: one for mutating operations
//! (the `commands` exchange) and one for read-only telemetry (the `data`
//! exchange). Registries are assembled once at startup by a fallible builder
//! and are immutable afterwards.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Failure raised inside a subsystem handler.
///
/// Converted into a response by the dispatcher; never terminates the
/// dispatch loop.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The args payload did not match the command's expected shape.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The operation itself failed.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// A failure with a formatted reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }
}

/// What a handler produces: `None` renders as `"Command executed"`,
/// `Some(value)` is returned verbatim. Responses are always data.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

/// Boxed handler over subsystem state `S`.
pub type Handler<S> = Box<dyn Fn(&mut S, &Value) -> HandlerResult + Send>;

/// Registry assembly error.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The same command name was bound twice in one registry.
    #[error("duplicate command {command:?} in the {channel} registry")]
    DuplicateCommand { channel: String, command: String },
}

/// Immutable command table for one subsystem channel.
pub struct CommandRegistry<S> {
    channel: String,
    handlers: HashMap<String, Handler<S>>,
}

impl<S> CommandRegistry<S> {
    /// Start building a registry for the named channel.
    pub fn builder(channel: impl Into<String>) -> RegistryBuilder<S> {
        RegistryBuilder {
            channel: channel.into(),
            handlers: HashMap::new(),
        }
    }

    /// Look up a handler by command name.
    pub fn get(&self, command: &str) -> Option<&Handler<S>> {
        self.handlers.get(command)
    }

    /// Channel label, for logs.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Number of bound commands.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no commands are bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Builder rejecting duplicate bindings at startup.
pub struct RegistryBuilder<S> {
    channel: String,
    handlers: HashMap<String, Handler<S>>,
}

impl<S> RegistryBuilder<S> {
    /// Bind a command name to a handler.
    pub fn register<F>(mut self, command: &str, handler: F) -> Result<Self, RegistryError>
    where
        F: Fn(&mut S, &Value) -> HandlerResult + Send + 'static,
    {
        if self.handlers.contains_key(command) {
            return Err(RegistryError::DuplicateCommand {
                channel: self.channel,
                command: command.to_string(),
            });
        }
        self.handlers.insert(command.to_string(), Box::new(handler));
        Ok(self)
    }

    /// Finish the table.
    pub fn build(self) -> CommandRegistry<S> {
        CommandRegistry {
            channel: self.channel,
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_and_invoke() {
        let registry: CommandRegistry<u32> = CommandRegistry::builder("test")
            .register("bump", |state, _args| {
                *state += 1;
                Ok(None)
            })
            .unwrap()
            .register("read", |state, _args| Ok(Some(json!(*state))))
            .unwrap()
            .build();

        let mut state = 0u32;

        let handler = registry.get("bump").unwrap();
        assert_eq!(handler(&mut state, &Value::Null).unwrap(), None);
        assert_eq!(state, 1);

        let handler = registry.get("read").unwrap();
        assert_eq!(handler(&mut state, &Value::Null).unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_unknown_command_is_absent() {
        let registry: CommandRegistry<()> = CommandRegistry::builder("test").build();
        assert!(registry.get("move-to").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_binding_is_rejected() {
        let result = CommandRegistry::<()>::builder("motion commands")
            .register("move-to", |_, _| Ok(None))
            .unwrap()
            .register("move-to", |_, _| Ok(None));

        match result {
            Err(RegistryError::DuplicateCommand { channel, command }) => {
                assert_eq!(channel, "motion commands");
                assert_eq!(command, "move-to");
            }
            Ok(_) => panic!("duplicate binding must be rejected"),
        }
    }
}
