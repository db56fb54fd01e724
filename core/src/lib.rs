pub mod backup;
pub mod config;
pub mod encoding;
pub mod entry;
pub mod events;
pub mod extraction;
pub mod extractors;
pub mod factories;
pub mod formats;
pub mod scanner;
pub mod validator;

#[cfg(test)]
mod integration_tests;

pub use config::{default_config_path, ConfigChange, ConfigStore, ExtractionConfig};
pub use entry::{Attribute, ExtractionEntry, ExtractionResult, FileFailure};
pub use events::{event_bus, subscriber, Event, EventBus, Subscriber, Topic};
pub use extraction::{ExtractionCore, RunError, RunState};
pub use extractors::{ExtractError, Extractor, ExtractorKind};
pub use factories::{
    ExtractorFactory, FactoryError, Registrable, Registry, Role, ValidatorFactory, WriterFactory,
};
pub use formats::{OutputFormat, TemplateWriter, TranslationIndex, WriteError};
pub use validator::{EntryValidator, ValidatorKind, Verdict};
