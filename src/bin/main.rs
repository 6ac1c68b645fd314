#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "HYBRID Ledger".bright_cyan().bold());
    println!("{}", "-------------".bright_cyan());
    println!();
    println!(
        "{}",
        "The ledger core runs inside the node binary.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run a specific command.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!(
        "  - {}  {}",
        "hybrid-node".bright_white(),
        "block production, mempool sweeps and the REST API".dimmed()
    );
    println!();
    println!("{}", "Options:".bright_green().underline());
    println!("  --config <path>       TOML configuration (default: config.toml)");
    println!("  --ticks <n>           stop after n block ticks");
    println!("  --demo-senders <n>    feed the pool from n synthetic senders");
    println!("  --log-level <level>   error | warn | info | debug | trace");
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --bin hybrid-node -- --demo-senders 4 --ticks 10".italic());
}
