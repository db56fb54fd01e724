/// Kind → implementation registries for extractors, validators and writers
use crate::extractors::{Extractor, ExtractorKind};
use crate::formats::{OutputFormat, TemplateWriter};
use crate::validator::{EntryValidator, ValidatorKind};
use log::{debug, warn};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What a registry hands out; used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Extractor,
    Validator,
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Extractor => "extractor",
            Role::Validator => "validator",
            Role::Writer => "writer",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("unknown {role} implementation: {name}")]
    UnknownImplementation { role: Role, name: String },

    #[error("{role} registered as '{key}' implements '{actual}'")]
    KindMismatch {
        role: Role,
        key: &'static str,
        actual: &'static str,
    },
}

impl FactoryError {
    pub fn unknown(role: Role, name: impl Into<String>) -> Self {
        FactoryError::UnknownImplementation {
            role,
            name: name.into(),
        }
    }
}

/// Enum kinds that identify registry entries.
pub trait RegistryKey: Copy + Eq + fmt::Debug + 'static {
    const ROLE: Role;

    fn name(&self) -> &'static str;
}

impl RegistryKey for ExtractorKind {
    const ROLE: Role = Role::Extractor;

    fn name(&self) -> &'static str {
        self.as_str()
    }
}

impl RegistryKey for ValidatorKind {
    const ROLE: Role = Role::Validator;

    fn name(&self) -> &'static str {
        self.as_str()
    }
}

impl RegistryKey for OutputFormat {
    const ROLE: Role = Role::Writer;

    fn name(&self) -> &'static str {
        self.as_str()
    }
}

/// Implementations that report the kind they provide.
pub trait Registrable<K> {
    fn registry_kind(&self) -> K;
}

impl Registrable<ExtractorKind> for dyn Extractor {
    fn registry_kind(&self) -> ExtractorKind {
        self.kind()
    }
}

impl Registrable<ValidatorKind> for dyn EntryValidator {
    fn registry_kind(&self) -> ValidatorKind {
        self.kind()
    }
}

impl Registrable<OutputFormat> for dyn TemplateWriter {
    fn registry_kind(&self) -> OutputFormat {
        self.format()
    }
}

/// Registry preserving registration order. Registering an existing kind
/// replaces the implementation in place.
pub struct Registry<K: RegistryKey, T: ?Sized> {
    entries: Vec<(K, Box<T>)>,
}

pub type ExtractorFactory = Registry<ExtractorKind, dyn Extractor>;
pub type ValidatorFactory = Registry<ValidatorKind, dyn EntryValidator>;
pub type WriterFactory = Registry<OutputFormat, dyn TemplateWriter>;

impl<K: RegistryKey, T: ?Sized> Default for Registry<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: RegistryKey, T: ?Sized> Registry<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: K, implementation: Box<T>) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == kind) {
            Some(slot) => {
                warn!("replacing registered {} '{}'", K::ROLE, kind.name());
                slot.1 = implementation;
            }
            None => {
                debug!("registered {} '{}'", K::ROLE, kind.name());
                self.entries.push((kind, implementation));
            }
        }
    }

    /// Remove and return the implementation for `kind`, if any
    pub fn unregister(&mut self, kind: K) -> Option<Box<T>> {
        let index = self.entries.iter().position(|(existing, _)| *existing == kind)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, kind: K) -> Result<&T, FactoryError> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == kind)
            .map(|(_, implementation)| implementation.as_ref())
            .ok_or_else(|| FactoryError::unknown(K::ROLE, kind.name()))
    }

    pub fn contains(&self, kind: K) -> bool {
        self.entries.iter().any(|(existing, _)| *existing == kind)
    }

    /// Names in registration order
    pub fn list_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(kind, _)| kind.name()).collect()
    }

    pub fn kinds(&self) -> Vec<K> {
        self.entries.iter().map(|(kind, _)| *kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, T> Registry<K, T>
where
    K: RegistryKey,
    T: ?Sized + Registrable<K>,
{
    /// Add or replace the implementation for `kind`. An implementation that
    /// provides a different kind is refused.
    pub fn register(&mut self, kind: K, implementation: Box<T>) -> Result<(), FactoryError> {
        let actual = implementation.registry_kind();
        if actual != kind {
            warn!(
                "refusing {} '{}' registered as '{}'",
                K::ROLE,
                actual.name(),
                kind.name()
            );
            return Err(FactoryError::KindMismatch {
                role: K::ROLE,
                key: kind.name(),
                actual: actual.name(),
            });
        }
        self.insert(kind, implementation);
        Ok(())
    }
}

impl<K, T> Registry<K, T>
where
    K: RegistryKey + FromStr<Err = FactoryError>,
    T: ?Sized,
{
    /// Look up by the kind's string name
    pub fn get_by_name(&self, name: &str) -> Result<&T, FactoryError> {
        self.get(name.parse::<K>()?)
    }
}

impl<K: RegistryKey, T: ?Sized> fmt::Debug for Registry<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("role", &K::ROLE)
            .field("names", &self.list_names())
            .finish()
    }
}

impl ExtractorFactory {
    /// Registry with every built-in extractor
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in ExtractorKind::ALL {
            registry.insert(kind, kind.build());
        }
        registry
    }
}

impl ValidatorFactory {
    /// Registry with every built-in validator
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for kind in ValidatorKind::ALL {
            registry.insert(kind, kind.build());
        }
        registry
    }
}

impl WriterFactory {
    /// Registry with every built-in output format
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for format in OutputFormat::ALL {
            registry.insert(format, format.build());
        }
        registry
    }
}
