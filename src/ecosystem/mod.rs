//! Ecosystem descriptors and the registry that maps names to them
//!
//! An [`Ecosystem`] bundles everything the framework needs to handle one
//! package manager: the five pipeline stage implementations, its version
//! scheme and typed hooks for production checks, name normalisation and
//! display names. Descriptors are plain values built once at startup and
//! collected into an [`EcosystemRegistry`].

mod registry;

pub use registry::{EcosystemRegistry, RegistryBuilder};

use crate::domain::Dependency;
use crate::error::ConfigError;
use crate::pipeline::{FileFetcher, FileParser, FileUpdater, MetadataFinder, UpdateChecker};
use crate::version::{Operator, Version, VersionScheme};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ptr;
use std::sync::Arc;

/// Decides from a dependency's groups whether it ships to production
pub type ProductionCheck = fn(&[String]) -> bool;

/// Canonicalises a package name (e.g. PEP 503 for Python)
pub type NameNormaliser = fn(&str) -> String;

/// Builds a human-facing name; None falls back to the dependency name
pub type DisplayNameBuilder = fn(&Dependency) -> Option<String>;

/// Default colour for ecosystem labels
pub const DEFAULT_LABEL_COLOUR: &str = "ededed";

fn always_production(_groups: &[String]) -> bool {
    true
}

fn identity_name(name: &str) -> String {
    name.to_string()
}

/// Label metadata for an ecosystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub colour: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Label {
    /// Label with the default colour
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colour: DEFAULT_LABEL_COLOUR.to_string(),
            description: None,
        }
    }
}

/// Full capability set of one ecosystem
pub struct Ecosystem {
    name: String,
    version_scheme: VersionScheme,
    default_operator: Operator,
    fetcher: Arc<dyn FileFetcher>,
    parser: Arc<dyn FileParser>,
    checker: Arc<dyn UpdateChecker>,
    updater: Arc<dyn FileUpdater>,
    metadata_finder: Arc<dyn MetadataFinder>,
    production_check: ProductionCheck,
    name_normaliser: NameNormaliser,
    display_name_builder: Option<DisplayNameBuilder>,
    label: Label,
}

impl Ecosystem {
    /// Start building a descriptor for `name`
    pub fn builder(name: impl Into<String>) -> EcosystemBuilder {
        EcosystemBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_scheme(&self) -> VersionScheme {
        self.version_scheme
    }

    /// Operator bare versions in requirement strings are read as
    pub fn default_operator(&self) -> Operator {
        self.default_operator
    }

    pub fn fetcher(&self) -> &dyn FileFetcher {
        self.fetcher.as_ref()
    }

    pub fn parser(&self) -> &dyn FileParser {
        self.parser.as_ref()
    }

    pub fn checker(&self) -> &dyn UpdateChecker {
        self.checker.as_ref()
    }

    pub fn updater(&self) -> &dyn FileUpdater {
        self.updater.as_ref()
    }

    pub fn metadata_finder(&self) -> &dyn MetadataFinder {
        self.metadata_finder.as_ref()
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Parse a version with this ecosystem's scheme
    pub fn parse_version(&self, input: &str) -> Result<Version, ConfigError> {
        self.version_scheme.parse(input)
    }

    /// Apply the production-check predicate
    pub fn is_production(&self, groups: &[String]) -> bool {
        (self.production_check)(groups)
    }

    /// Apply the name normaliser
    pub fn normalise_name(&self, name: &str) -> String {
        (self.name_normaliser)(name)
    }

    /// Apply the display-name builder, if one is registered
    pub fn display_name_for(&self, dependency: &Dependency) -> Option<String> {
        self.display_name_builder.and_then(|build| build(dependency))
    }

    /// True when `other` shares every stage implementation, hook and
    /// setting with this one
    pub(crate) fn same_implementation(&self, other: &Ecosystem) -> bool {
        let same_display_name = match (self.display_name_builder, other.display_name_builder) {
            (Some(a), Some(b)) => ptr::fn_addr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.version_scheme == other.version_scheme
            && self.default_operator == other.default_operator
            && self.label == other.label
            && ptr::fn_addr_eq(self.production_check, other.production_check)
            && ptr::fn_addr_eq(self.name_normaliser, other.name_normaliser)
            && same_display_name
            && Arc::ptr_eq(&self.fetcher, &other.fetcher)
            && Arc::ptr_eq(&self.parser, &other.parser)
            && Arc::ptr_eq(&self.checker, &other.checker)
            && Arc::ptr_eq(&self.updater, &other.updater)
            && Arc::ptr_eq(&self.metadata_finder, &other.metadata_finder)
    }
}

impl fmt::Debug for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecosystem")
            .field("name", &self.name)
            .field("version_scheme", &self.version_scheme)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Ecosystem`]; every stage implementation is required
pub struct EcosystemBuilder {
    name: String,
    version_scheme: VersionScheme,
    default_operator: Operator,
    fetcher: Option<Arc<dyn FileFetcher>>,
    parser: Option<Arc<dyn FileParser>>,
    checker: Option<Arc<dyn UpdateChecker>>,
    updater: Option<Arc<dyn FileUpdater>>,
    metadata_finder: Option<Arc<dyn MetadataFinder>>,
    production_check: ProductionCheck,
    name_normaliser: NameNormaliser,
    display_name_builder: Option<DisplayNameBuilder>,
    label: Option<Label>,
}

impl EcosystemBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_scheme: VersionScheme::Semantic,
            default_operator: Operator::Exact,
            fetcher: None,
            parser: None,
            checker: None,
            updater: None,
            metadata_finder: None,
            production_check: always_production,
            name_normaliser: identity_name,
            display_name_builder: None,
            label: None,
        }
    }

    pub fn version_scheme(mut self, scheme: VersionScheme) -> Self {
        self.version_scheme = scheme;
        self
    }

    /// Operator applied to bare versions in requirement strings
    pub fn default_operator(mut self, op: Operator) -> Self {
        self.default_operator = op;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn FileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn FileParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn checker(mut self, checker: Arc<dyn UpdateChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn updater(mut self, updater: Arc<dyn FileUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn metadata_finder(mut self, finder: Arc<dyn MetadataFinder>) -> Self {
        self.metadata_finder = Some(finder);
        self
    }

    pub fn production_check(mut self, check: ProductionCheck) -> Self {
        self.production_check = check;
        self
    }

    pub fn name_normaliser(mut self, normaliser: NameNormaliser) -> Self {
        self.name_normaliser = normaliser;
        self
    }

    pub fn display_name_builder(mut self, builder: DisplayNameBuilder) -> Self {
        self.display_name_builder = Some(builder);
        self
    }

    pub fn label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    /// Finish the descriptor, failing if any stage implementation is absent
    pub fn build(self) -> Result<Ecosystem, ConfigError> {
        let name = self.name;
        let missing = |capability: &'static str| ConfigError::MissingCapability {
            name: name.clone(),
            capability,
        };

        let fetcher = self.fetcher.ok_or_else(|| missing("file fetcher"))?;
        let parser = self.parser.ok_or_else(|| missing("file parser"))?;
        let checker = self.checker.ok_or_else(|| missing("update checker"))?;
        let updater = self.updater.ok_or_else(|| missing("file updater"))?;
        let metadata_finder = self
            .metadata_finder
            .ok_or_else(|| missing("metadata finder"))?;
        let label = self.label.unwrap_or_else(|| Label::new(name.clone()));

        Ok(Ecosystem {
            name,
            version_scheme: self.version_scheme,
            default_operator: self.default_operator,
            fetcher,
            parser,
            checker,
            updater,
            metadata_finder,
            production_check: self.production_check,
            name_normaliser: self.name_normaliser,
            display_name_builder: self.display_name_builder,
            label,
        })
    }
}
