//! Subcommands of `pdfstamp`
//!
//! Each invocation opens the persisted history, optionally loads a PDF into
//! an annotation session, applies one action and reports a notice.

use crate::config::Config;
use crate::raster::MeasuringRasterizer;
use anyhow::Context;
use clap::{Args, Subcommand};
use stamp_core::{
    AnnotationSession, DraftInput, FileStore, LopdfBackend, Notice, PreviewCoordinator,
    RenderOutcome, StampError,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

type Session = AnnotationSession<LopdfBackend, FileStore>;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Add a text entry to a page ("true" places a check marker)
    Add {
        /// Document the entry is placed on
        pdf: PathBuf,
        #[command(flatten)]
        draft: DraftArgs,
        /// Also write the re-rendered document here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete an entry by id
    Remove { id: String },
    /// Delete an entry and print its values for re-adding
    Edit { id: String },
    /// List the entry history
    List,
    /// Delete every entry
    Clear,
    /// Replace the history with a JSON array of entries
    Import { file: PathBuf },
    /// Write the history as pretty JSON
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render all entries onto a document
    Render {
        pdf: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show where a draft would appear on the page preview
    Draft {
        pdf: PathBuf,
        #[command(flatten)]
        draft: DraftArgs,
        /// Preview zoom factor (0.1 to 3.0)
        #[arg(long)]
        zoom: Option<f64>,
    },
    /// Print page count and page sizes
    Info { pdf: PathBuf },
}

/// Entry values as typed on the command line. Validation happens in the
/// core so the messages match every other host.
#[derive(Args, Debug, Clone, Default)]
pub struct DraftArgs {
    #[arg(long)]
    pub text: String,
    /// Optional label kept with the entry
    #[arg(long, default_value = "")]
    pub key: String,
    #[arg(long, allow_hyphen_values = true)]
    pub x: String,
    #[arg(long, allow_hyphen_values = true)]
    pub y: String,
    #[arg(long, default_value = "12")]
    pub size: String,
    #[arg(long, default_value = "1")]
    pub page: String,
}

impl DraftArgs {
    pub fn input(&self) -> DraftInput {
        DraftInput {
            text: self.text.clone(),
            key_name: self.key.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
            size: self.size.clone(),
            page: self.page.clone(),
        }
    }
}

/// What a command printed and how it ended.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub lines: Vec<String>,
    pub notice: Option<Notice>,
}

impl Report {
    pub fn failed(&self) -> bool {
        self.notice.as_ref().is_some_and(Notice::is_error)
    }
}

struct Outcome {
    message: String,
    write: Option<(PathBuf, Vec<u8>)>,
}

impl Outcome {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            write: None,
        }
    }

    fn writing(mut self, path: PathBuf, bytes: Vec<u8>) -> Self {
        self.write = Some((path, bytes));
        self
    }
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn open_session(config: &Config, report: &mut Report) -> anyhow::Result<Session> {
    let engine = config.engine_config()?;
    let kv = FileStore::new(&config.storage.path);
    let (session, load) = AnnotationSession::new(LopdfBackend, kv, engine, config.session_options());
    if let Some(warning) = load.warning {
        report.lines.push(format!("warning: {}", warning));
    }
    Ok(session)
}

/// Run `command` against the history configured in `config`.
///
/// User-facing failures (bad input, unreadable documents, rejected
/// imports) end up in the report's notice. Only I/O on the host side is
/// returned as an error.
pub async fn execute(command: &Command, config: &Config) -> anyhow::Result<Report> {
    let mut report = Report::default();
    let mut session = open_session(config, &mut report)?;

    let outcome = match command {
        Command::Add { pdf, draft, output } => {
            let bytes = read_file(pdf)?;
            add(&mut session, bytes, &draft.input(), output.as_deref(), &mut report)
        }
        Command::Remove { id } => match session.delete_entry(id) {
            Ok(true) => Ok(Outcome::message("Entry deleted.")),
            Ok(false) => Err(StampError::Input(format!("No entry with id {}", id))),
            Err(e) => Err(e),
        },
        Command::Edit { id } => edit(&mut session, id, &mut report),
        Command::List => {
            for entry in session.entries() {
                report.lines.push(format!("{}  {}", entry.id, entry.describe()));
            }
            Ok(Outcome::message(format!("{} entries", session.entries().len())))
        }
        Command::Clear => session
            .clear_entries()
            .map(|()| Outcome::message("Text history cleared.")),
        Command::Import { file } => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            session.import_json(&text).map(|count| {
                report.lines.push(format!("{} entries imported", count));
                Outcome::message("Text history imported successfully!")
            })
        }
        Command::Export { output } => {
            let download = session.export_history();
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&download.filename));
            Ok(Outcome::message(format!("Text history exported to {}", path.display()))
                .writing(path, download.bytes))
        }
        Command::Render { pdf, output } => {
            let bytes = read_file(pdf)?;
            render(&mut session, bytes, output.as_deref(), &mut report)
        }
        Command::Draft { pdf, draft, zoom } => {
            let bytes = read_file(pdf)?;
            let zoom = zoom.unwrap_or_else(|| config.zoom());
            preview(&mut session, bytes, &draft.input(), zoom, &mut report).await
        }
        Command::Info { pdf } => {
            let bytes = read_file(pdf)?;
            info_lines(&mut session, bytes, &mut report)
        }
    };

    match outcome {
        Ok(outcome) => {
            if let Some((path, bytes)) = outcome.write {
                write_file(&path, &bytes)?;
            }
            report.notice = Some(Notice::success(outcome.message));
        }
        Err(e) => {
            warn!(error = %e, "Command failed");
            report.notice = Some(Notice::from_error(&e));
        }
    }
    Ok(report)
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}

fn add(
    session: &mut Session,
    pdf: Vec<u8>,
    input: &DraftInput,
    output: Option<&Path>,
    report: &mut Report,
) -> Result<Outcome, StampError> {
    let draft = input.parse()?;
    session.load_document(pdf)?;
    let entry = session.add_entry(draft)?;
    report.lines.push(format!("{}  {}", entry.id, entry.describe()));

    let outcome = Outcome::message("Text added successfully!");
    match output {
        Some(path) => {
            let download = session.export_pdf()?;
            Ok(outcome.writing(path.to_path_buf(), download.bytes))
        }
        None => Ok(outcome),
    }
}

fn edit(session: &mut Session, id: &str, report: &mut Report) -> Result<Outcome, StampError> {
    let draft = session
        .begin_edit(id)?
        .ok_or_else(|| StampError::Input(format!("No entry with id {}", id)))?;
    let json = serde_json::to_string_pretty(&draft)
        .map_err(|e| StampError::Validation(e.to_string()))?;
    report.lines.push(json);
    Ok(Outcome::message(
        "Entry removed for editing. Run `pdfstamp add` with the adjusted values.",
    ))
}

fn render(
    session: &mut Session,
    pdf: Vec<u8>,
    output: Option<&Path>,
    report: &mut Report,
) -> Result<Outcome, StampError> {
    session.load_document(pdf)?;
    if let Some(stats) = session.last_stats() {
        report.lines.push(format!(
            "{} text, {} markers, {} skipped",
            stats.text, stats.markers, stats.skipped
        ));
        if stats.marker_fallbacks > 0 {
            report.lines.push(format!(
                "{} markers drawn as text (marker image unavailable)",
                stats.marker_fallbacks
            ));
        }
    }

    let download = session.export_pdf()?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&download.filename));
    Ok(Outcome::message(format!("PDF saved to {}", path.display())).writing(path, download.bytes))
}

async fn preview(
    session: &mut Session,
    pdf: Vec<u8>,
    input: &DraftInput,
    zoom: f64,
    report: &mut Report,
) -> Result<Outcome, StampError> {
    let draft = input.parse()?;
    session.load_document(pdf)?;
    let rendered = session.rendered_bytes().ok_or(StampError::NoDocument)?.to_vec();

    let coordinator = PreviewCoordinator::new(LopdfBackend, MeasuringRasterizer);
    let pages = coordinator.set_document(rendered)?;
    coordinator.set_zoom(zoom).await?;

    let view = match coordinator.go_to_page(draft.page).await? {
        Some(RenderOutcome::Applied(view)) => view,
        Some(RenderOutcome::Superseded) => {
            return Err(StampError::Raster("render superseded".to_string()))
        }
        None => {
            return Err(StampError::Input(format!(
                "Page {} does not exist (document has {} pages)",
                draft.page, pages
            )))
        }
    };

    report.lines.push(format!(
        "Page {} of {} at {} ({}x{} px)",
        view.page,
        view.page_count,
        coordinator.zoom_label(),
        view.canvas_width,
        view.canvas_height
    ));
    let overlay = coordinator.preview_draft(draft.x, draft.y, draft.size, &draft.text);
    report.lines.push(format!(
        "{:?} at left {:.1}, top {:.1}, font size {:.1}",
        overlay.text, overlay.left, overlay.top, overlay.font_size
    ));
    Ok(Outcome::message("Preview ready."))
}

fn info_lines(
    session: &mut Session,
    pdf: Vec<u8>,
    report: &mut Report,
) -> Result<Outcome, StampError> {
    let pages = session.load_document(pdf)?;
    for page in 1..=pages {
        if let Some(size) = session.page_size(page) {
            report
                .lines
                .push(format!("Page {}: {} x {} pt", page, size.width, size.height));
        }
    }
    Ok(Outcome::message(format!("{} pages", pages)))
}
