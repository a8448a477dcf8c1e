use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a single record as field/value pairs.
pub fn print_record(pairs: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let mut object = Map::new();
            for (key, value) in pairs {
                object.insert((*key).to_string(), Value::String(value.clone()));
            }
            println!(
                "{}",
                serde_json::to_string(&Value::Object(object)).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in pairs {
                table.add_row(vec![(*key).to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (key, value) in pairs {
                println!("{key}: {value}");
            }
        }
    }
}

/// Print a list of records under shared column headers.
pub fn print_rows(headers: &[&str], rows: &[Vec<String>], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let records: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let mut object = Map::new();
                    for (header, cell) in headers.iter().zip(row) {
                        object.insert(header.to_lowercase(), Value::String(cell.clone()));
                    }
                    Value::Object(object)
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&Value::Array(records)).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(headers.to_vec());
            for row in rows {
                table.add_row(row.clone());
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("{}", row.join(" "));
            }
        }
    }
}

/// Render an optional wire string for display.
pub fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}
