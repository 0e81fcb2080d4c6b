use crate::commands::{load_registry, CommandOutput};
use crate::config::CliConfig;
use crate::error::CliResult;

/// List schema references, one per line
pub fn run(config: &CliConfig) -> CliResult<CommandOutput> {
    let registry = load_registry(config)?;
    let mut out = String::new();
    for reference in registry.available() {
        let schema = registry.get(&reference)?;
        match &schema.description {
            Some(description) => out.push_str(&format!("{}\t{}\n", reference, description)),
            None => out.push_str(&format!("{}\n", reference)),
        }
    }
    Ok(CommandOutput::ok(out))
}
