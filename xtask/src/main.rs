use clap::{Parser, Subcommand};
use colored::*;
use std::process::{Command as ProcessCommand, ExitCode};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format, fix, test and lint the whole workspace
    Tidy,
    /// Run the workspace tests and summarize the result
    Test,
}

struct Step {
    name: &'static str,
    args: &'static [&'static str],
}

const FMT: Step = Step {
    name: "Formatting",
    args: &["fmt", "--all"],
};
const FIX: Step = Step {
    name: "Cargo fix",
    args: &["fix", "--allow-dirty", "--workspace"],
};

fn run_step(step: &Step) -> Result<(), String> {
    let status = ProcessCommand::new("cargo")
        .args(step.args)
        .status()
        .map_err(|e| format!("{} could not start: {e}", step.name))?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("{} failed", step.name))
    }
}

/// Returns the number of failed tests, summed over every test binary.
fn run_tests() -> Result<usize, String> {
    let output = ProcessCommand::new("cargo")
        .args(["test", "--workspace"])
        .output()
        .map_err(|e| format!("cargo test could not start: {e}"))?;

    if output.status.success() {
        return Ok(0);
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let failed = count_failed(&combined);

    // Compile errors never reach a summary line
    if failed == 0 {
        Err("cargo test failed".to_string())
    } else {
        Ok(failed)
    }
}

fn count_failed(output: &str) -> usize {
    output
        .lines()
        .filter(|line| line.starts_with("test result: FAILED."))
        .filter_map(|line| {
            line.split(';')
                .find(|part| part.trim().ends_with("failed"))
                .and_then(|part| part.split_whitespace().next())
                .and_then(|num| num.parse::<usize>().ok())
        })
        .sum()
}

fn count_warnings() -> Result<usize, String> {
    let output = ProcessCommand::new("cargo")
        .args(["clippy", "--workspace", "--message-format=json"])
        .output()
        .map_err(|e| format!("cargo clippy could not start: {e}"))?;

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| line.contains("\"level\":\"warning\""))
        .count())
}

fn tidy() -> Result<String, String> {
    run_step(&FMT)?;
    run_step(&FIX)?;

    let failed = run_tests()?;
    if failed > 0 {
        return Err(format!("× {failed} tests failed"));
    }

    match count_warnings()? {
        0 => Ok("✓ Success!".to_string()),
        warnings => Err(format!("× Found {warnings} issues")),
    }
}

fn test() -> Result<String, String> {
    match run_tests()? {
        0 => Ok("✓ All tests passed".to_string()),
        failed => Err(format!("× {failed} tests failed")),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = match args.command {
        Command::Tidy => tidy(),
        Command::Test => test(),
    };

    match result {
        Ok(message) => print_result(&message, true),
        Err(message) => print_result(&message, false),
    }
}

fn print_result(message: &str, success: bool) -> ExitCode {
    const WIDTH: usize = 50;
    println!("\n{}", "=".repeat(WIDTH).cyan());

    let inner = message.chars().count() + 4;
    let indent = " ".repeat(WIDTH.saturating_sub(inner + 2) / 2);
    let border = "─".repeat(inner);
    let boxed = format!("{indent}┌{border}┐\n{indent}│  {message}  │\n{indent}└{border}┘");

    if success {
        println!("\n{}\n", boxed.bold().green());
        ExitCode::SUCCESS
    } else {
        println!("\n{}\n", boxed.bold().red());
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_failed_sums_binaries() {
        let output = "\
test result: ok. 12 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
test result: FAILED. 10 passed; 2 failed; 0 ignored; 0 measured; 0 filtered out
test result: FAILED. 3 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out
";
        assert_eq!(count_failed(output), 3);
    }
}
