//! Built-in patch listing.

use clap::Args;

use crate::patches::Patch;

#[derive(Args)]
pub struct PatchesArgs {
    /// Show only this patch
    #[arg(value_enum)]
    patch: Option<Patch>,
}

pub fn run(args: PatchesArgs) -> anyhow::Result<()> {
    let patches: Vec<Patch> = match args.patch {
        Some(p) => vec![p],
        None => Patch::ALL.to_vec(),
    };

    println!("Built-in Patches\n");
    for patch in patches {
        println!("{:<8} {}", patch.name(), patch.description());
        for (receiver, help) in patch.receivers() {
            println!("  receiver {receiver:<8} {help}");
        }
        for table in patch.tables() {
            println!("  table    {table}");
        }
        println!();
    }
    Ok(())
}
