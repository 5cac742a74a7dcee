use super::{CliError, Context};

pub fn show(ctx: &mut Context) -> Result<(), CliError> {
    ctx.emit_lines("version", [format!("hypeman version {}", ctx.version)])
}
