//! Metadata lookup: where does a dependency's code live?

use crate::domain::Dependency;
use crate::error::Result;
use crate::http::HttpClient;
use crate::source::{Source, SourceParser};
use async_trait::async_trait;
use tracing::debug;

/// Per-ecosystem discovery of a dependency's source repository
#[async_trait]
pub trait MetadataFinder: Send + Sync {
    /// Source repository of `dependency`, if one can be found
    async fn source(&self, dependency: &Dependency) -> Result<Option<Source>>;
}

/// First git requirement URL that parses as a [`Source`]
pub fn source_from_requirements(dependency: &Dependency) -> Option<Source> {
    dependency
        .requirements
        .iter()
        .filter_map(|r| r.source.as_ref())
        .filter_map(|s| s.url.as_deref())
        .find_map(Source::from_url)
}

/// Metadata finder backed by a JSON registry endpoint.
///
/// `url_template` contains `{name}`; each of `pointers` is a JSON pointer
/// (e.g. `/info/project_urls/Source`) tried in order.
pub struct RegistryMetadataFinder {
    client: HttpClient,
    registry: String,
    url_template: String,
    pointers: Vec<String>,
    parser: SourceParser,
}

impl RegistryMetadataFinder {
    pub fn new(
        client: HttpClient,
        registry: impl Into<String>,
        url_template: impl Into<String>,
        pointers: &[&str],
    ) -> Self {
        Self {
            client,
            registry: registry.into(),
            url_template: url_template.into(),
            pointers: pointers.iter().map(|p| p.to_string()).collect(),
            parser: SourceParser::default(),
        }
    }

    /// Also recognise self-hosted provider hosts (builder pattern)
    pub fn with_parser(mut self, parser: SourceParser) -> Self {
        self.parser = parser;
        self
    }

    fn url_for(&self, dependency: &Dependency) -> String {
        self.url_template.replace("{name}", &dependency.name)
    }

    /// Scan the configured pointers of a registry document
    pub fn source_in(&self, document: &serde_json::Value) -> Option<Source> {
        self.pointers
            .iter()
            .filter_map(|pointer| document.pointer(pointer))
            .filter_map(|value| match value {
                serde_json::Value::String(s) => Some(s.as_str()),
                // npm style: {"type": "git", "url": "..."}
                serde_json::Value::Object(map) => map.get("url").and_then(|u| u.as_str()),
                _ => None,
            })
            .find_map(|text| self.parser.parse(text))
    }
}

#[async_trait]
impl MetadataFinder for RegistryMetadataFinder {
    async fn source(&self, dependency: &Dependency) -> Result<Option<Source>> {
        if let Some(source) = source_from_requirements(dependency) {
            return Ok(Some(source));
        }

        let url = self.url_for(dependency);
        let document: serde_json::Value = self
            .client
            .get_json(&url, &dependency.name, &self.registry)
            .await?;
        let source = self.source_in(&document);
        debug!(
            "Source for {}: {}",
            dependency.name,
            source.as_ref().map_or("none".to_string(), |s| s.url())
        );
        Ok(source)
    }
}
