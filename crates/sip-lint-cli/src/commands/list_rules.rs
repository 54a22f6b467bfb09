//! List rules command implementation.

use sip_lint_rules::{all_rules, Preset};

/// Runs the list-rules command.
pub fn run() {
    println!("Available rules:\n");
    println!("{:<20} Description", "Id");
    println!("{}", "-".repeat(80));

    for rule in all_rules() {
        println!("{:<20} {}", rule.id(), rule.description());
    }

    println!("\nPresets:");
    for preset in [Preset::Recommended, Preset::Strict, Preset::Minimal] {
        let ids: Vec<String> = preset.rules().iter().map(|r| r.id().to_string()).collect();
        let default = if preset == Preset::default() {
            " (default)"
        } else {
            ""
        };
        println!("  {:<12} - {}{default}", preset.name(), ids.join(", "));
    }

    println!("\nUse --rules to filter specific rules, e.g.:");
    println!("  sip-lint check --rules preamble-data,copyright");
}
