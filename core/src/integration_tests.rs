/// Integration tests for the extraction flow
/// Config store → core → scanner/extractors/validators → writer, observed
/// through the event bus

#[cfg(test)]
mod tests {
    use crate::config::{ConfigStore, ExtractionConfig};
    use crate::entry::Attribute;
    use crate::events::{subscriber, Event, EventBus, Topic};
    use crate::extraction::{ExtractionCore, RunState};
    use crate::factories::{FactoryError, Role, WriterFactory};
    use crate::formats::OutputFormat;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};

    struct Project {
        dir: TempDir,
    }

    impl Project {
        fn new() -> Self {
            let project = Self {
                dir: tempdir().unwrap(),
            };
            fs::create_dir_all(project.game()).unwrap();
            project
        }

        fn game(&self) -> PathBuf {
            self.dir.path().join("game")
        }

        fn script(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
            let path = self.game().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn config(&self) -> ExtractionConfig {
            ExtractionConfig {
                game_directory: self.game(),
                ..ExtractionConfig::default()
            }
        }
    }

    fn collect_events(bus: &EventBus, topics: &[Topic]) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        for topic in topics {
            let sink = Arc::clone(&events);
            bus.subscribe(
                *topic,
                subscriber(move |event| {
                    sink.lock().unwrap().push(event.clone());
                    Ok(())
                }),
            );
        }
        events
    }

    // ============================================
    // Extraction basics
    // ============================================

    #[test]
    fn test_extracts_exactly_the_assigned_attributes() {
        let project = Project::new();
        project.script(
            "items.rpy",
            "define sword = Item(\"sword\")\n    description \"Hello\"\n    purchase_notification \"Buy now\"\n",
        );

        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&project.config());
        assert!(result.success);
        assert_eq!(result.count, 2);

        let found: Vec<_> = result
            .entries
            .iter()
            .map(|e| (e.attribute, e.value.as_str(), e.line_number))
            .collect();
        assert_eq!(
            found,
            vec![
                (Attribute::Description, "Hello", 2),
                (Attribute::PurchaseNotification, "Buy now", 3),
            ]
        );
    }

    #[test]
    fn test_commented_assignments_are_ignored() {
        let project = Project::new();
        project.script(
            "items.rpy",
            "# description \"Old\"\n    # unlock_notification \"Gone\"\ndescription \"Current\"\n",
        );

        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&project.config());
        assert_eq!(result.count, 1);
        assert_eq!(result.entries[0].value, "Current");
    }

    #[test]
    fn test_empty_directory_completes_with_empty_output() {
        let project = Project::new();
        let bus = Arc::new(EventBus::new());
        let events = collect_events(&bus, &[Topic::ExtractionCompleted, Topic::ExtractionProgress]);

        let config = project.config();
        let result = ExtractionCore::new(Arc::clone(&bus)).run(&config);
        assert!(result.success);
        assert_eq!(result.count, 0);
        assert_eq!(result.files_scanned, 0);

        let output = config.resolved_output_path();
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
        assert_eq!(fs::read_to_string(&output).unwrap(), "");

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::ExtractionCompleted { success: true, count: 0, .. }
        ));
    }

    #[test]
    fn test_unreadable_file_is_recorded_and_run_completes() {
        let project = Project::new();
        let broken = project.script("a_broken.rpy", b"description \"\xFF\xFE\xFF\"\n".as_slice());
        let good = project.script("b_good.rpy", "description \"Readable\"\n");

        let bus = Arc::new(EventBus::new());
        let events = collect_events(
            &bus,
            &[Topic::ExtractionProgress, Topic::ExtractionCompleted, Topic::ExtractionError],
        );
        let core = ExtractionCore::new(Arc::clone(&bus));
        let result = core.run(&project.config());

        assert!(result.success);
        assert_eq!(core.state(), RunState::Completed);
        assert_eq!(result.count, 1);
        assert_eq!(result.entries[0].source_file, good);
        assert_eq!(result.failed_files.len(), 1);
        assert_eq!(result.failed_files[0].path, broken);
        assert!(result.message.contains("1 files failed"));

        let events = events.lock().unwrap();
        let progress: Vec<(usize, usize, usize, usize)> = events
            .iter()
            .filter_map(|event| match event {
                Event::ExtractionProgress {
                    current,
                    total,
                    entries,
                    failed,
                    ..
                } => Some((*current, *total, *entries, *failed)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 2, 0, 1), (2, 2, 1, 1)]);
        assert!(matches!(events.last(), Some(Event::ExtractionCompleted { success: true, .. })));
    }

    #[test]
    fn test_missing_directory_publishes_error() {
        let project = Project::new();
        let mut config = project.config();
        config.game_directory = project.dir.path().join("no_such_game");

        let bus = Arc::new(EventBus::new());
        let events = collect_events(&bus, &[Topic::ExtractionCompleted, Topic::ExtractionError]);
        let core = ExtractionCore::new(Arc::clone(&bus));
        let result = core.run(&config);

        assert!(!result.success);
        assert_eq!(core.state(), RunState::Failed);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::ExtractionError { success, message } => {
                assert!(!success);
                assert!(message.contains("no_such_game"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unknown_writer_name() {
        let writers = WriterFactory::with_builtin();
        let err = writers.get_by_name("docx").err().unwrap();
        assert_eq!(
            err,
            FactoryError::UnknownImplementation {
                role: Role::Writer,
                name: "docx".into(),
            }
        );
    }

    // ============================================
    // Filtering
    // ============================================

    #[test]
    fn test_skip_translated_drops_only_translated_keys() {
        let project = Project::new();
        project.script(
            "items.rpy",
            "description \"Hello\"\npurchase_notification \"Buy now\"\n",
        );
        let translations = project.dir.path().join("done.rpy");
        fs::write(
            &translations,
            "translate schinese strings:\n\n    old \"Hello\"\n    new \"你好\"\n\n    old \"Buy now\"\n    new \"\"\n",
        )
        .unwrap();

        let mut config = project.config();
        config.translation_path = Some(translations);
        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&config);

        assert!(result.success);
        assert_eq!(result.count, 1);
        assert_eq!(result.entries[0].attribute, Attribute::PurchaseNotification);
        assert_eq!(result.skipped_translated, 1);

        config.skip_translated = false;
        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&config);
        assert_eq!(result.count, 2);
        assert_eq!(result.skipped_translated, 0);
    }

    #[test]
    fn test_previous_output_is_the_default_translation_source() {
        let project = Project::new();
        project.script("items.rpy", "description \"Hello\"\nunlock_notification \"Unlocked\"\n");
        let config = project.config();
        let core = ExtractionCore::new(Arc::new(EventBus::new()));

        assert_eq!(core.run(&config).count, 2);

        // A translator fills in one entry of the generated template.
        let output = config.resolved_output_path();
        let translated = fs::read_to_string(&output)
            .unwrap()
            .replacen("new \"\"", "new \"你好\"", 1);
        fs::write(&output, translated).unwrap();

        let result = core.run(&config);
        assert_eq!(result.count, 1);
        assert_eq!(result.entries[0].value, "Unlocked");

        // The translated template was backed up before being replaced.
        let backups = fs::read_dir(output.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".bak."))
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_duplicates_and_rejections_are_counted() {
        let project = Project::new();
        project.script("a.rpy", "description \"Shared\"\ndescription \"...\"\n");
        project.script("b.rpy", "unlock_notification \"Shared\"\ndescription \"Bad\u{FFFD}\"\n");

        let mut config = project.config();
        config.validators.push(crate::validator::ValidatorKind::HasAlphanumeric);
        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&config);

        assert_eq!(result.count, 1);
        // First occurrence wins.
        assert_eq!(result.entries[0].source_file, project.game().join("a.rpy"));
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.rejected, 2);
    }

    #[test]
    fn test_translation_folder_is_not_scanned() {
        let project = Project::new();
        project.script("script.rpy", "description \"Source\"\n");
        project.script(
            "tl/schinese/script.rpy",
            "translate schinese strings:\n    old \"x\"\n    new \"y\"\n    description \"Not a source\"\n",
        );

        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&project.config());
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.count, 1);
    }

    // ============================================
    // Writers
    // ============================================

    fn run_with_format(project: &Project, format: OutputFormat) -> (PathBuf, Vec<String>) {
        let mut config = project.config();
        config.writer_format = format;
        let result = ExtractionCore::new(Arc::new(EventBus::new())).run(&config);
        assert!(result.success, "{}", result.message);
        let keys = result.entries.iter().map(|e| e.key()).collect();
        (config.resolved_output_path(), keys)
    }

    #[test]
    fn test_every_format_parses_back_to_the_same_keys() {
        let project = Project::new();
        project.script(
            "scripts/items.rpy",
            "description \"Say \\\"hi\\\", friend\"\npurchase_notification 'Bought {item}'\nunlock_notification \"\"\"Two\nlines\"\"\"\n",
        );

        for format in OutputFormat::ALL {
            let (output, mut keys) = run_with_format(&project, format);
            assert_eq!(keys.len(), 3, "{format}");

            let index = format.build().load(&output).unwrap();
            let mut parsed: Vec<String> = index.keys().map(str::to_string).collect();
            parsed.sort();
            keys.sort();
            assert_eq!(parsed, keys, "{format}");
        }
    }

    #[test]
    fn test_output_paths_are_relative_to_game_directory() {
        let project = Project::new();
        project.script("scripts/items.rpy", "description \"Hello\"\n");

        let (output, _) = run_with_format(&project, OutputFormat::RenPy);
        let content = fs::read_to_string(output).unwrap();
        assert!(content.starts_with("translate schinese strings:\n"));
        assert!(content.contains("# description: scripts/items.rpy:1\n"));
        assert!(!content.contains(&*project.game().to_string_lossy()));
    }

    // ============================================
    // Host flow
    // ============================================

    #[test]
    fn test_config_store_drives_the_core() {
        let project = Project::new();
        project.script("items.rpy", "description \"Hello\"\nunlock_notification \"Yay\"\n");

        let bus = Arc::new(EventBus::new());
        let events = collect_events(
            &bus,
            &[Topic::ConfigChanged, Topic::FileSaved, Topic::ExtractionCompleted],
        );

        let mut store = ConfigStore::new(Arc::clone(&bus));
        store.set_game_directory(project.game());
        store.set_output_path(project.dir.path().join("template.json"));
        store.set_writer_format(OutputFormat::Json);
        store.set_extractor_enabled(crate::extractors::ExtractorKind::Description, false);

        let core = ExtractionCore::new(Arc::clone(&bus));
        let result = core.run(&store.snapshot());
        assert_eq!(result.count, 1);

        let saved: Vec<(PathBuf, usize)> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::FileSaved { path, entry_count } => Some((path.clone(), *entry_count)),
                _ => None,
            })
            .collect();
        assert_eq!(saved, vec![(project.dir.path().join("template.json"), 1)]);

        let changes = events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.topic() == Topic::ConfigChanged)
            .count();
        assert_eq!(changes, 4);
        assert!(Path::new(&project.dir.path().join("template.json")).exists());
    }
}
