/// Extraction run orchestration
///
/// A run walks the game directory, applies every enabled extractor to each
/// script, filters the results and hands them to the configured writer.
/// Progress and the final outcome are published on the event bus; `run`
/// itself never returns an error.
use crate::config::ExtractionConfig;
use crate::entry::{ExtractionEntry, ExtractionResult, FileFailure};
use crate::events::{Event, EventBus};
use crate::extractors::{read_script, Extractor};
use crate::factories::{ExtractorFactory, FactoryError, ValidatorFactory, WriterFactory};
use crate::formats::{RenderContext, TemplateWriter, TranslationIndex, WriteError};
use crate::scanner::{FileScanner, ScanConfig};
use crate::validator::{EntryValidator, RejectReason, ValidationContext, ValidatorKind, Verdict};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no game directory configured")]
    MissingGameDirectory,

    #[error("game directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("failed to scan {}: {source}", .path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    #[error("an extraction is already running")]
    AlreadyRunning,
}

pub struct ExtractionCore {
    bus: Arc<EventBus>,
    extractors: ExtractorFactory,
    validators: ValidatorFactory,
    writers: WriterFactory,
    state: Mutex<RunState>,
}

/// Implementations resolved from the factories for one run
struct Pipeline<'a> {
    extractors: Vec<&'a dyn Extractor>,
    text_validators: Vec<&'a dyn EntryValidator>,
    skip_translated: Option<&'a dyn EntryValidator>,
    writer: &'a dyn TemplateWriter,
    /// Output is also the translation source, so translated entries stay in it
    keep_translated: bool,
}

/// Running counts for one run
#[derive(Default)]
struct Tally {
    /// Entries still needing translation
    entries: Vec<ExtractionEntry>,
    /// Everything written to the template
    template: Vec<ExtractionEntry>,
    seen_keys: HashSet<String>,
    failed_files: Vec<FileFailure>,
    rejected: usize,
    duplicates: usize,
    skipped_translated: usize,
}

impl ExtractionCore {
    /// Core with every built-in extractor, validator and writer registered
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_factories(
            bus,
            ExtractorFactory::with_builtin(),
            ValidatorFactory::with_builtin(),
            WriterFactory::with_builtin(),
        )
    }

    pub fn with_factories(
        bus: Arc<EventBus>,
        extractors: ExtractorFactory,
        validators: ValidatorFactory,
        writers: WriterFactory,
    ) -> Self {
        Self {
            bus,
            extractors,
            validators,
            writers,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn extractors_mut(&mut self) -> &mut ExtractorFactory {
        &mut self.extractors
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorFactory {
        &mut self.validators
    }

    pub fn writers_mut(&mut self) -> &mut WriterFactory {
        &mut self.writers
    }

    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    /// Run one extraction against a configuration snapshot.
    ///
    /// A call made while another run is in progress is rejected without
    /// publishing anything.
    pub fn run(&self, config: &ExtractionConfig) -> ExtractionResult {
        {
            let mut state = self.lock_state();
            if *state == RunState::Running {
                warn!("extraction start rejected: {}", RunError::AlreadyRunning);
                return ExtractionResult::failed(RunError::AlreadyRunning.to_string());
            }
            *state = RunState::Running;
        }
        let mut guard = RunGuard {
            state: &self.state,
            finished: false,
        };

        info!(
            "extraction started in {} ({} extractors)",
            config.game_directory.display(),
            config.enabled_extractors.len()
        );
        self.bus.publish(Event::ExtractionStarted {
            game_directory: config.game_directory.clone(),
            extractors: config.enabled_extractors.iter().copied().collect(),
        });

        match self.execute(config) {
            Ok(result) => {
                guard.finish(RunState::Completed);
                info!("{}", result.message);
                self.bus.publish(Event::ExtractionCompleted {
                    success: true,
                    count: result.count,
                    message: result.message.clone(),
                });
                result
            }
            Err(err) => {
                guard.finish(RunState::Failed);
                error!("extraction failed: {}", err);
                let message = err.to_string();
                self.bus.publish(Event::ExtractionError {
                    success: false,
                    message: message.clone(),
                });
                ExtractionResult::failed(message)
            }
        }
    }

    fn execute(&self, config: &ExtractionConfig) -> Result<ExtractionResult, RunError> {
        let root = config.game_directory.as_path();
        if root.as_os_str().is_empty() {
            return Err(RunError::MissingGameDirectory);
        }

        let mut pipeline = self.resolve(config)?;

        if !root.is_dir() {
            return Err(RunError::DirectoryNotFound(root.to_path_buf()));
        }

        let output_path = config.resolved_output_path();
        let translation_path = config.resolved_translation_path();

        let scan_config =
            ScanConfig::from_config(config, vec![output_path.clone(), translation_path.clone()]);
        let files = FileScanner::new(scan_config)
            .scan(root)
            .map_err(|source| RunError::Traversal {
                path: root.to_path_buf(),
                source,
            })?;

        pipeline.keep_translated = same_file(&output_path, &translation_path);
        let translations = if pipeline.skip_translated.is_some() || pipeline.keep_translated {
            load_translations(pipeline.writer, &translation_path)
        } else {
            TranslationIndex::new()
        };
        let ctx = ValidationContext::new(&translations);

        let total = files.len();
        let mut tally = Tally::default();

        for (index, file) in files.iter().enumerate() {
            match read_script(&file.path) {
                Ok(content) => {
                    self.bus.publish(Event::FileLoaded {
                        path: file.path.clone(),
                        content_length: content.len(),
                    });
                    let before = tally.entries.len();
                    self.process_file(&pipeline, &ctx, &content, &file.path, &mut tally);
                    debug!(
                        "{}: {} new entries",
                        file.relative_path,
                        tally.entries.len() - before
                    );
                }
                Err(err) => {
                    error!("{}", err);
                    tally.failed_files.push(FileFailure {
                        path: file.path.clone(),
                        reason: err.to_string(),
                    });
                }
            }

            self.bus.publish(Event::ExtractionProgress {
                current: index + 1,
                total,
                entries: tally.entries.len(),
                failed: tally.failed_files.len(),
                file: Some(file.path.clone()),
            });
        }

        let render_ctx =
            RenderContext::new(config.language.clone(), root).with_translations(translations);
        pipeline
            .writer
            .write(&output_path, &tally.template, &render_ctx)
            .map_err(|source| RunError::Write {
                path: output_path.clone(),
                source,
            })?;
        self.bus.publish(Event::FileSaved {
            path: output_path.clone(),
            entry_count: tally.template.len(),
        });

        let count = tally.entries.len();
        let mut message = format!("Extracted {} entries from {} files", count, total);
        if !tally.failed_files.is_empty() {
            message.push_str(&format!(" ({} files failed)", tally.failed_files.len()));
        }

        Ok(ExtractionResult {
            success: true,
            count,
            message,
            entries: tally.entries,
            files_scanned: total,
            failed_files: tally.failed_files,
            skipped_translated: tally.skipped_translated,
            rejected: tally.rejected,
            duplicates: tally.duplicates,
            output_path: Some(output_path),
        })
    }

    fn resolve<'a>(&'a self, config: &ExtractionConfig) -> Result<Pipeline<'a>, RunError> {
        let extractors = config
            .enabled_extractors
            .iter()
            .map(|kind| self.extractors.get(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        if extractors.is_empty() {
            warn!("no extractors enabled; the template will be empty");
        }

        let text_validators = config
            .validators
            .iter()
            .filter(|kind| **kind != ValidatorKind::SkipTranslated)
            .map(|kind| self.validators.get(*kind))
            .collect::<Result<Vec<_>, _>>()?;

        let skip_translated = if config.skip_translated {
            Some(self.validators.get(ValidatorKind::SkipTranslated)?)
        } else {
            None
        };

        Ok(Pipeline {
            extractors,
            text_validators,
            skip_translated,
            writer: self.writers.get(config.writer_format)?,
            keep_translated: false,
        })
    }

    fn process_file(
        &self,
        pipeline: &Pipeline<'_>,
        ctx: &ValidationContext<'_>,
        content: &str,
        path: &Path,
        tally: &mut Tally,
    ) {
        let mut found: Vec<ExtractionEntry> = pipeline
            .extractors
            .iter()
            .flat_map(|extractor| extractor.extract_from_content(content, path))
            .collect();
        found.sort_by_key(|entry| entry.line_number);

        'entries: for entry in found {
            for validator in &pipeline.text_validators {
                if let Verdict::Reject(reason) = validator.validate(&entry, ctx) {
                    debug!(
                        "{}:{}: {} rejected ({:?})",
                        path.display(),
                        entry.line_number,
                        entry.attribute,
                        reason
                    );
                    tally.rejected += 1;
                    continue 'entries;
                }
            }

            if !tally.seen_keys.insert(entry.key()) {
                tally.duplicates += 1;
                continue;
            }

            if let Some(validator) = pipeline.skip_translated {
                if validator.validate(&entry, ctx) == Verdict::Reject(RejectReason::AlreadyTranslated) {
                    tally.skipped_translated += 1;
                    if pipeline.keep_translated {
                        tally.template.push(entry);
                    }
                    continue;
                }
            }

            tally.template.push(entry.clone());
            tally.entries.push(entry);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Existing translations; anything but a missing file that fails to load is
/// logged and treated as empty.
fn load_translations(writer: &dyn TemplateWriter, path: &Path) -> TranslationIndex {
    match writer.load(path) {
        Ok(index) => {
            debug!("{} existing translations in {}", index.len(), path.display());
            index
        }
        Err(err) => {
            warn!(
                "could not read translations from {}: {}; treating as untranslated",
                path.display(),
                err
            );
            TranslationIndex::new()
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Leaves the core in `Failed` if a run unwinds before finishing.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(&mut self, outcome: RunState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = RunState::Failed;
        }
    }
}

impl std::fmt::Debug for ExtractionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionCore")
            .field("state", &self.state())
            .field("extractors", &self.extractors)
            .field("validators", &self.validators)
            .field("writers", &self.writers)
            .finish()
    }
}
