use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use grcnn_rs::Report;

pub fn write_report(path: &Path, report: &Report) -> Result<(), String> {
    let display = path.display();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| format!("Cannot create '{}' for the report: {err}", parent.display()))?;
    }

    let file = File::create(path).map_err(|err| format!("Cannot open '{display}': {err}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(|err| format!("Cannot encode evaluation report '{display}': {err}"))?;
    writeln!(writer).map_err(|err| format!("Cannot write '{display}': {err}"))?;
    writer
        .flush()
        .map_err(|err| format!("Cannot flush '{display}': {err}"))
}
