use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// One line of a typing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `type <text>`: the search box now holds `text`
    Type(String),
    /// `enter <text>`: the user asked to search for `text` right away
    Enter(String),
    /// `wait <ms>`
    Wait(Duration),
    /// `reset`
    Reset,
}

pub fn load(path: &Path) -> Result<Vec<Step>> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse(&source)
}

pub fn parse(source: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let step = match command {
            "type" => Step::Type(rest.to_string()),
            "enter" => Step::Enter(rest.to_string()),
            "wait" => {
                let millis: u64 = rest.parse().with_context(|| {
                    format!("line {}: expected milliseconds after 'wait', got '{}'", line_number, rest)
                })?;
                Step::Wait(Duration::from_millis(millis))
            }
            "reset" if rest.is_empty() => Step::Reset,
            "reset" => bail!("line {}: 'reset' takes no arguments", line_number),
            other => bail!("line {}: unknown command '{}'", line_number, other),
        };
        steps.push(step);
    }

    Ok(steps)
}
