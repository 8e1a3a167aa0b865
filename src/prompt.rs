use dialoguer::{Confirm, Input, MultiSelect, theme::ColorfulTheme};
use std::path::PathBuf;

/// Abstraction over a free-text input prompt.
///
/// Decouples collecting input from the logic that consumes it, so the run
/// flow can be driven by a scripted stub in tests.
pub trait StringPrompter {
    /// Prompt the user for a line of text.
    ///
    /// # Returns
    /// `Ok(String)` with the raw input, or `Err(String)` describing the failure.
    fn prompt(&mut self, prompt: &str) -> Result<String, String>;
}

/// Abstraction over a checkbox list where every item starts checked.
pub trait SelectPrompter {
    /// Show `items` and return the indices the user left checked.
    ///
    /// # Returns
    /// `Ok(Some(indices))` on submit, `Ok(None)` if the user cancelled, or
    /// `Err(String)` on input failure.
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<Option<Vec<usize>>, String>;
}

/// Abstraction over a boolean (yes/no) confirmation prompt.
pub trait ConfirmPrompter {
    /// Prompt the user for a yes/no confirmation.
    ///
    /// # Returns
    /// `Ok(true)` if confirmed, `Ok(false)` if declined or cancelled, or
    /// `Err(String)` on input failure.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String>;
}

/// Terminal implementation of every prompt trait, using `dialoguer` with
/// `ColorfulTheme`.
pub struct DialoguerPrompter;

impl StringPrompter for DialoguerPrompter {
    fn prompt(&mut self, prompt: &str) -> Result<String, String> {
        let theme = ColorfulTheme::default();
        let input = Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(true);
        match input.interact_text() {
            Ok(v) => Ok(v),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl SelectPrompter for DialoguerPrompter {
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<Option<Vec<usize>>, String> {
        let theme = ColorfulTheme::default();
        let defaults = vec![true; items.len()];
        let select = MultiSelect::with_theme(&theme)
            .with_prompt(prompt)
            .items(items)
            .defaults(&defaults);
        match select.interact_opt() {
            Ok(v) => Ok(v),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl ConfirmPrompter for DialoguerPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String> {
        let theme = ColorfulTheme::default();
        let confirm = Confirm::with_theme(&theme)
            .with_prompt(prompt)
            .default(default);
        match confirm.interact_opt() {
            Ok(v) => Ok(v.unwrap_or(false)),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Ask for the text to look for in origin URLs, trimmed.
pub fn ask_find<P: StringPrompter>(prompter: &mut P) -> Result<String, String> {
    prompter
        .prompt("Enter text to find in Origin URL (e.g., github.com)")
        .map(|s| s.trim().to_string())
}

/// Ask for the replacement text, trimmed.
pub fn ask_replace<P: StringPrompter>(prompter: &mut P) -> Result<String, String> {
    prompter
        .prompt("Enter replacement text (e.g., gitlab.com)")
        .map(|s| s.trim().to_string())
}

/// Let the user uncheck repositories they want to leave alone.
///
/// # Returns
/// - `Ok(Some(paths))` with the repositories still checked, in input order.
/// - `Ok(None)` if the user cancelled.
/// - `Err(String)` if input failed.
pub fn choose_repositories<P: SelectPrompter>(
    prompter: &mut P,
    repos: &[PathBuf],
) -> Result<Option<Vec<PathBuf>>, String> {
    let items: Vec<String> = repos.iter().map(|r| r.display().to_string()).collect();
    let picked = prompter.select(
        "Select repositories to process (uncheck to exclude)",
        &items,
    )?;

    Ok(picked.map(|mut indices| {
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|i| repos.get(i).cloned())
            .collect()
    }))
}

/// Builds the final confirmation message.
pub fn confirm_message(count: usize, regex: bool) -> String {
    let mut msg = format!("Ready to process {} repositories. Proceed?", count);
    if regex {
        msg.push_str(" (Regex Mode Enabled)");
    }
    msg
}

/// Ask the user to confirm before any repository is modified.
pub fn confirm_process<P: ConfirmPrompter>(
    prompter: &mut P,
    count: usize,
    regex: bool,
) -> Result<bool, String> {
    prompter.confirm(&confirm_message(count, regex), true)
}
