//! # Command Console
//!
//! The host's command dispatcher. Module command handlers are registered
//! into it by the registrar; each line typed at the console is split on
//! whitespace, the first word selects the command and the rest are passed
//! as arguments.
//!
//! Command names are matched case-insensitively. `help` and `modules` are
//! built in and cannot be claimed by a module.

use async_trait::async_trait;
use modgate_host_api::{
    CommandDispatcher, CommandError, CommandHandler, HandlerCatalog, ModuleContext,
    RegisteredCommand,
};
use modgate_runtime::{Environment, SandboxEnforcer};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

/// Commands answered by the console itself.
const BUILTINS: [(&str, &str); 2] = [
    ("help", "List available commands"),
    ("modules", "List loaded and excluded modules"),
];

struct ConsoleEntry {
    name: String,
    command: RegisteredCommand,
}

/// Dispatches console lines to registered commands.
pub struct Console {
    commands: BTreeMap<String, ConsoleEntry>,
    environment: Arc<Environment>,
    enforcer: Arc<SandboxEnforcer>,
}

impl Console {
    /// Create a console with only the built-in commands.
    pub fn new(environment: Arc<Environment>, enforcer: Arc<SandboxEnforcer>) -> Self {
        Self {
            commands: BTreeMap::new(),
            environment,
            enforcer,
        }
    }

    /// Names of every available command, built-ins first.
    pub fn command_names(&self) -> Vec<&str> {
        BUILTINS
            .iter()
            .map(|(name, _)| *name)
            .chain(self.commands.values().map(|entry| entry.name.as_str()))
            .collect()
    }

    /// Module that provides `name`, if a module command is registered under it.
    pub fn provider_of(&self, name: &str) -> Option<&str> {
        self.commands
            .get(&name.to_lowercase())
            .map(|entry| entry.command.module.as_str())
    }

    /// Execute one console line.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub async fn execute_line(&self, line: &str) -> Result<Option<String>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.map(str::to_string).collect();
        let key = name.to_lowercase();

        match key.as_str() {
            "help" => return Ok(Some(self.help())),
            "modules" => return Ok(Some(self.modules())),
            _ => {}
        }

        let entry = self.commands.get(&key).ok_or_else(|| {
            CommandError::Usage(format!(
                "Unknown command '{}'. Type 'help' for a list of commands",
                name
            ))
        })?;

        debug!(module = %entry.command.module, "Executing command '{}'", entry.name);
        let ctx = ModuleContext::new(
            entry.command.module.clone(),
            Arc::clone(&self.environment),
            Arc::clone(&self.enforcer),
        );
        entry.command.handler.execute(&ctx, &args).await.map(Some)
    }

    fn help(&self) -> String {
        let mut out = String::from("Available commands:");
        for (name, description) in BUILTINS {
            let _ = write!(out, "\n  {:<16} {}", name, description);
        }
        for entry in self.commands.values() {
            let _ = write!(
                out,
                "\n  {:<16} {} [{}]",
                entry.name,
                entry.command.handler.description(),
                entry.command.module
            );
        }
        out
    }

    fn modules(&self) -> String {
        let mut out = format!("{} module(s) loaded:", self.environment.len());
        for module in self.environment.modules() {
            let _ = write!(out, "\n  {}", module);
            if module.trusted {
                out.push_str(" (host)");
            }
        }

        let unresolved = self.environment.unresolved();
        if !unresolved.is_empty() {
            let _ = write!(out, "\n{} module(s) excluded:", unresolved.len());
            for error in unresolved {
                let _ = write!(out, "\n  {}", error);
            }
        }
        out
    }
}

impl CommandDispatcher for Console {
    fn register_command(&mut self, name: &str, command: RegisteredCommand) {
        self.commands.insert(
            name.to_lowercase(),
            ConsoleEntry {
                name: name.to_string(),
                command,
            },
        );
    }

    fn has_command(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        BUILTINS.iter().any(|(builtin, _)| *builtin == key) || self.commands.contains_key(&key)
    }
}

/// Resolves a `module:symbol` path and prints what it names.
#[derive(Default)]
pub struct ResolveCommand;

#[async_trait]
impl CommandHandler for ResolveCommand {
    async fn execute(&self, ctx: &ModuleContext, args: &[String]) -> Result<String, CommandError> {
        let [target] = args else {
            return Err(CommandError::Usage("Resolve <module:symbol>".to_string()));
        };
        let entry = ctx.resolve(target)?;
        Ok(format!("{} ({:?})", entry.path, entry.kind))
    }

    fn description(&self) -> &str {
        "Show what a module:symbol path names"
    }
}

/// Constructors for the handlers the host itself declares.
pub fn host_handlers(host_id: &str) -> HandlerCatalog {
    let mut handlers = HandlerCatalog::new();
    handlers.register::<ResolveCommand>(host_id, "ResolveCommand");
    handlers
}
