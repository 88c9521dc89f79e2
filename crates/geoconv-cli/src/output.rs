use console::style;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

/// Output format mode
#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct OutputWriter {
    mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { mode: if json { OutputMode::Json } else { OutputMode::Human } }
    }

    pub fn success(&self, message: impl Display) {
        match self.mode {
            OutputMode::Human => {
                println!("{} {}", style("✓").green().bold(), message);
            }
            OutputMode::Json => {
                let output = serde_json::json!({
                    "status": "success",
                    "message": message.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
        }
    }

    pub fn info(&self, message: impl Display) {
        match self.mode {
            OutputMode::Human => {
                println!("{} {}", style("ℹ").blue().bold(), message);
            }
            OutputMode::Json => {
                let output = serde_json::json!({
                    "status": "info",
                    "message": message.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
        }
    }

    pub fn warn(&self, message: impl Display) {
        match self.mode {
            OutputMode::Human => {
                println!("{} {}", style("⚠").yellow().bold(), message);
            }
            OutputMode::Json => {
                let output = serde_json::json!({
                    "status": "warning",
                    "message": message.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
        }
    }

    pub fn error(&self, message: impl Display) {
        match self.mode {
            OutputMode::Human => {
                eprintln!("{} {}", style("✗").red().bold(), message);
            }
            OutputMode::Json => {
                let output = serde_json::json!({
                    "status": "error",
                    "message": message.to_string(),
                });
                eprintln!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
        }
    }

    pub fn table<T: Tabled + serde::Serialize>(&self, data: Vec<T>) {
        match self.mode {
            OutputMode::Human => {
                if data.is_empty() {
                    println!("{}", style("(no data)").dim());
                } else {
                    let mut table = Table::new(data);
                    table.with(Style::rounded());
                    println!("{table}");
                }
            }
            OutputMode::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "data": data })).unwrap()
                );
            }
        }
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        match self.mode {
            OutputMode::Human => {
                println!("{}: {}", style(key).bold(), value);
            }
            OutputMode::Json => {
                let mut output = serde_json::Map::new();
                output.insert(key.to_string(), serde_json::Value::String(value.to_string()));
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            }
        }
    }

    pub fn section(&self, title: impl Display) {
        match self.mode {
            OutputMode::Human => {
                println!("\n{}", style(title).bold().underlined());
            }
            OutputMode::Json => {}
        }
    }
}
