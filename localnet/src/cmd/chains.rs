//! `localnet chains`: print a built-in chain registry.

use localnet::chain::ChainSource;

/// Prints one line per chain of `source`.
#[allow(clippy::print_stdout)]
pub fn run(source: &ChainSource) {
    for record in source.records() {
        println!(
            "{:<12} {:>10}  {:<6} {}",
            record.name,
            record.chain_id,
            record.token_symbol.as_deref().unwrap_or("-"),
            record.rpc
        );
    }
}
