//! `pengate script`: Run a batch-edit script against a JSON document.

use std::path::Path;
use std::sync::Arc;

use pengate_canvas::{InMemoryDocument, PlaceholderImageSource};
use pengate_core::SharedDocument;
use pengate_script::{Interpreter, ScriptError};
use tokio::sync::Mutex;
use tracing::info;

pub async fn run(
    file: &Path,
    document: Option<&Path>,
    out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read script {}: {e}", file.display()))?;

    let doc = match document {
        Some(path) => InMemoryDocument::load(path)?,
        None => InMemoryDocument::new(),
    };
    let doc = Arc::new(Mutex::new(doc));
    let shared: SharedDocument = doc.clone();
    let interpreter = Interpreter::new(shared, Arc::new(PlaceholderImageSource::default()));

    let report = match interpreter.run(&source).await {
        Ok(report) => report,
        Err(ScriptError::Validation { line, message }) => {
            return Err(format!("Script rejected at line {line}: {message}").into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&report.to_value())?);
    info!(summary = %report.summary(), "Script finished");

    if let Some(out) = out {
        doc.lock().await.save(out)?;
        info!(path = %out.display(), "Document written");
    }

    if !report.is_success() {
        return Err(report.summary().into());
    }
    Ok(())
}
