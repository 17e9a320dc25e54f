//! `provctl handlers`

use crate::Context;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use provisioning::HandlerKind;

pub fn run(ctx: &Context) -> Result<()> {
    if !ctx.quiet {
        ui::header("Handlers");
    }
    for (position, kind) in HandlerKind::ALL.iter().enumerate() {
        let marker = if kind.is_critical() {
            "critical".red().to_string()
        } else {
            String::new()
        };
        println!("{:>3}  {:<24} {}", position + 1, kind.name(), marker);
    }
    if !ctx.quiet {
        println!();
        ui::dim("A failing critical handler stops the run; other failures are recorded.");
    }
    Ok(())
}
