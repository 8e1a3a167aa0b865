use crate::rewrite::RewriteSpec;

use console::{Alignment, measure_text_width, pad_str, style};

/// Prints a boxed, colorized summary of the rewrite about to run.
///
/// # Examples
///
/// ```no_run
/// use git_origin_rewrite::banner::print_banner;
/// use git_origin_rewrite::rewrite::{MatchMode, RewriteSpec};
///
/// let spec = RewriteSpec::new("github.com", "gitlab.com", MatchMode::Literal).unwrap();
/// print_banner(&spec, 4);
/// ```
pub fn print_banner(spec: &RewriteSpec, repo_count: usize) {
    println!();
    for row in framed(&banner_lines(spec, repo_count)) {
        println!("{row}");
    }
    println!();
}

/// Wraps `lines` in a single-line box, one row per line plus the two
/// borders.
///
/// Every row has the same visible width. Padding goes through
/// [`console::pad_str`], which ignores ANSI escapes, so styled lines line
/// up with plain ones.
fn framed(lines: &[String]) -> Vec<String> {
    let inner = lines.iter().map(|l| measure_text_width(l)).max().unwrap_or(0);
    let rule = "─".repeat(inner + 2);
    let edge = style("│").blue().bold();

    let mut rows = Vec::with_capacity(lines.len() + 2);
    rows.push(style(format!("┌{rule}┐")).blue().bold().to_string());
    for line in lines {
        let body = pad_str(line, inner, Alignment::Left, None);
        rows.push(format!("{edge} {body} {edge}"));
    }
    rows.push(style(format!("└{rule}┘")).blue().bold().to_string());
    rows
}

/// Lines of the plan banner: title, mode, the plan itself, then the steps
/// taken per repository.
fn banner_lines(spec: &RewriteSpec, repo_count: usize) -> Vec<String> {
    let mode = if spec.is_regex() {
        style("Regex mode: backreferences like \\1 are expanded.").yellow()
    } else {
        style("Text mode: every occurrence is replaced.").cyan()
    };

    let plan = [
        ("Find", spec.find().to_string()),
        ("Replace", spec.replace().to_string()),
        ("Repositories", repo_count.to_string()),
    ];
    let label_width = plan.iter().map(|(k, _)| k.len() + 1).max().unwrap_or(0);

    let mut lines = vec![
        style("Rewrite origin remote URLs").bold().to_string(),
        String::new(),
        mode.bold().to_string(),
        String::new(),
    ];
    lines.extend(
        plan.iter()
            .map(|(k, v)| format!("{:<w$} {}", format!("{k}:"), v, w = label_width)),
    );
    lines.push(String::new());
    lines.push("For each repository:".to_string());
    lines.extend(
        [
            "rewrite and fetch `origin`",
            "rewrite submodule URLs in .gitmodules and local config",
            "run `git submodule sync` if any submodule changed",
        ]
        .iter()
        .enumerate()
        .map(|(i, step)| format!("  {}) {}", i + 1, step)),
    );
    lines
}
