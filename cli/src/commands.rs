//! Subcommand implementations
//!
//! Each command returns the text to print so the formatting can be tested.

use analysis::{AnalysisEngine, AnalysisOptions, UploadedImage};
use anyhow::{Context, bail};
use shared::{
    AnalysisFailure, AnalysisResult, BatchReport, ClassifierBackend, DISCLAIMER, DiagnosticClass, ProcessId,
    TechniqueComparison, logging, process_info, process_warn, recommendation,
};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use report::PdfReportRenderer;

/// Extensions picked up when a directory is given to `batch`
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

const CLINIC_NAME: &str = "ColpoVision";

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string()
}

fn read_image(path: &Path) -> anyhow::Result<UploadedImage> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    Ok(UploadedImage::new(display_name(path), bytes))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand directories (one level, sorted) and keep explicit files as given
pub fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("Cannot list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && has_image_extension(path))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    if files.is_empty() {
        bail!("No images found in the given inputs");
    }
    Ok(files)
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn format_result(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", result.file_name);
    let _ = writeln!(
        out,
        "  Image:       {}x{} {} ({})",
        result.image.width, result.image.height, result.image.format, result.image.color_mode
    );
    let _ = writeln!(
        out,
        "  Backend:     {}{}",
        result.backend,
        if result.enhanced { ", CLAHE enhanced" } else { "" }
    );
    let _ = writeln!(out, "  Diagnosis:   {} ({})", result.predicted, percent(result.confidence));
    let _ = writeln!(out, "  Risk level:  {}", result.risk_level);
    for (class, probability) in result.probabilities.iter() {
        let _ = writeln!(out, "    {:<28} {:>7}", class.label(), percent(probability));
    }
    let _ = writeln!(out, "  {}", result.recommendation);
    out
}

pub fn format_batch(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Batch {}: {} analysed, {} failed ({} backend)",
        report.batch_id,
        report.results.len(),
        report.failures.len(),
        report.backend
    );
    for class in DiagnosticClass::ALL {
        let count = report.counts.get(&class).copied().unwrap_or(0);
        let share = report.distribution.get(&class).copied().unwrap_or(0.0);
        let _ = writeln!(out, "  {:<28} {:>4} {:>7}", class.label(), count, percent(share));
    }
    for result in &report.results {
        let _ = writeln!(
            out,
            "  {:<32} {:<28} {:>7}",
            result.file_name,
            result.predicted.label(),
            percent(result.confidence)
        );
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  FAILED {}: {}", failure.file_name, failure.message);
    }
    out
}

pub fn format_comparison(comparison: &TechniqueComparison) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Without enhancement:");
    out.push_str(&format_result(&comparison.original));
    let _ = writeln!(out, "With CLAHE enhancement:");
    out.push_str(&format_result(&comparison.enhanced));
    let verdict = if comparison.agreement {
        "Both techniques agree"
    } else {
        "The techniques disagree; review the image manually"
    };
    let _ = writeln!(out, "{verdict}");
    out
}

pub fn format_classes() -> String {
    let mut out = String::new();
    for class in DiagnosticClass::ALL {
        let _ = writeln!(
            out,
            "{:<10} {:<28} risk {:<6} {}",
            class.id(),
            class.label(),
            class.risk_level(),
            recommendation(class)
        );
    }
    out
}

fn with_disclaimer(mut out: String) -> String {
    let _ = writeln!(out, "\n{DISCLAIMER}");
    out
}

pub fn analyze(
    engine: &AnalysisEngine,
    file: &Path,
    enhance: bool,
    backend: ClassifierBackend,
    report: Option<&Path>,
) -> anyhow::Result<String> {
    let image = read_image(file)?;
    let options = AnalysisOptions {
        enhance,
        backend,
        patient_id: None,
    };
    let result = engine.analyze(&image.bytes, &image.file_name, options)?;
    let mut out = format_result(&result);

    if let Some(path) = report {
        let pdf = PdfReportRenderer::new(CLINIC_NAME).render_analysis(&result, None)?;
        fs::write(path, pdf).with_context(|| format!("Cannot write {}", path.display()))?;
        let _ = writeln!(out, "Report written to {}", path.display());
    }

    Ok(with_disclaimer(out))
}

pub fn batch(
    engine: &AnalysisEngine,
    inputs: &[PathBuf],
    backend: ClassifierBackend,
    json: Option<&Path>,
    report: Option<&Path>,
) -> anyhow::Result<String> {
    // Unreadable files are reported like undecodable ones
    let mut images = Vec::new();
    let mut unreadable = Vec::new();
    for path in collect_inputs(inputs)? {
        match read_image(&path) {
            Ok(image) => images.push(image),
            Err(e) => {
                process_warn!(ProcessId::current(), "⚠️ Skipping {}: {:#}", path.display(), e);
                unreadable.push(AnalysisFailure {
                    file_name: display_name(&path),
                    message: format!("{e:#}"),
                });
            }
        }
    }

    let mut batch = if images.is_empty() {
        BatchReport::new(Uuid::new_v4(), backend, Vec::new(), Vec::new())
    } else {
        engine.analyze_batch(&images, backend, |done, total| {
            logging::log_progress(ProcessId::current(), "Analysing", &format!("{done}/{total}"));
        })?
    };
    batch.failures.extend(unreadable);
    let mut out = format_batch(&batch);

    if let Some(path) = json {
        let content = serde_json::to_string_pretty(&batch)?;
        fs::write(path, content).with_context(|| format!("Cannot write {}", path.display()))?;
        let _ = writeln!(out, "JSON written to {}", path.display());
    }
    if let Some(path) = report {
        let pdf = PdfReportRenderer::new(CLINIC_NAME).render_batch(&batch)?;
        fs::write(path, pdf).with_context(|| format!("Cannot write {}", path.display()))?;
        let _ = writeln!(out, "Report written to {}", path.display());
    }

    process_info!(ProcessId::current(), "📁 Batch {} done", batch.batch_id);
    Ok(with_disclaimer(out))
}

pub fn compare(engine: &AnalysisEngine, file: &Path, backend: ClassifierBackend) -> anyhow::Result<String> {
    let image = read_image(file)?;
    let comparison = engine.compare(&image.bytes, &image.file_name, backend)?;
    Ok(with_disclaimer(format_comparison(&comparison)))
}
