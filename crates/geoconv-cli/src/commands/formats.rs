//! `geoconv formats` - list supported formats

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use geoconv_core::registry::{OutputFormat, TABULAR_INPUTS, VECTOR_INPUTS};

use crate::output::OutputWriter;

#[derive(Tabled, Serialize)]
struct InputRow {
    #[tabled(rename = "Extension")]
    extension: String,
    #[tabled(rename = "Format")]
    format: &'static str,
}

#[derive(Tabled, Serialize)]
struct OutputRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Format")]
    format: &'static str,
    #[tabled(rename = "Produces")]
    produces: String,
}

pub fn run(writer: &OutputWriter) -> Result<()> {
    writer.section("Inputs");
    let inputs: Vec<InputRow> = VECTOR_INPUTS
        .iter()
        .chain(TABULAR_INPUTS.iter())
        .map(|(extension, label)| InputRow {
            extension: format!(".{extension}"),
            format: label,
        })
        .collect();
    writer.table(inputs);

    writer.section("Outputs");
    let outputs: Vec<OutputRow> = OutputFormat::ALL
        .iter()
        .map(|format| OutputRow {
            key: format.key(),
            format: format.label(),
            produces: format!(".{}", format.file_extension()),
        })
        .collect();
    writer.table(outputs);

    Ok(())
}
