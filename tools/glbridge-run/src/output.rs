use std::fmt;

use serde::Serialize;

/// Output format of the run report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The report as one JSON object.
    Json,
    /// One line per thread plus a graphics summary.
    #[default]
    Human,
}

/// Write a report to stdout.
pub fn emit<T: Serialize + fmt::Display>(
    format: OutputFormat,
    value: &T,
) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Human => print!("{value}"),
    }
    Ok(())
}

/// Write an error to stdout (JSON mode) or stderr (human mode).
pub fn emit_error(format: OutputFormat, exit_code: u8, message: &str) {
    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": message,
                "exit_code": exit_code,
            });
            // JSON errors go to stdout so the caller always gets valid JSON.
            println!("{obj}");
        }
        OutputFormat::Human => eprintln!("error: {message}"),
    }
}
