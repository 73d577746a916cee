//! Config command - show the resolved configuration.

use hearth_config::ResolvedConfig;

use crate::theme::Theme;

/// Print the resolved configuration, annotated with where each value came from.
pub(crate) fn show_config(resolved: &ResolvedConfig, raw: bool) {
    if raw {
        print!("{}", resolved.to_toml());
        return;
    }

    println!("{}", Theme::header("Resolved configuration"));
    if resolved.loaded_files.is_empty() {
        println!("{}", Theme::dimmed("# no config files found, using defaults"));
    } else {
        for file in &resolved.loaded_files {
            println!("{}", Theme::dimmed(&format!("# loaded {file}")));
        }
    }
    println!("{}", Theme::separator());
    println!("{}", resolved.annotated());
}
