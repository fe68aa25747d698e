// SPDX-License-Identifier: AGPL-3.0-or-later
//! Publisher trait, output formats and publishing configuration

use crate::formats::{HtmlPublisher, TextPublisher, XmlPublisher};
use crate::publish::PublishContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Error type for tree building and publishing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Bad list style \"{0}\"")]
    InvalidListStyle(String),

    #[error("Cannot call document registrar object")]
    RegistrarNotCallable,

    #[error("Unknown publisher: {0}")]
    UnknownPublisher(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Output format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Html,
    Xml,
}

impl OutputFormat {
    /// Short display name
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Xml => "xml",
        }
    }

    pub const ALL: [Self; 3] = [Self::Text, Self::Html, Self::Xml];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            "xml" => Ok(Self::Xml),
            _ => Err(Error::UnknownPublisher(s.to_string())),
        }
    }
}

/// Stylesheet variant for HTML output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleVariant {
    #[default]
    Default,
    Small,
}

impl FromStr for StyleVariant {
    type Err = std::convert::Infallible;

    /// Anything but `small` selects the default sheet
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("small") {
            Ok(Self::Small)
        } else {
            Ok(Self::Default)
        }
    }
}

/// Configuration for publishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Target line width for wrapping
    pub line_width: usize,
    /// First heading level listed in the table of contents
    pub toc_start: u32,
    /// Heading level where the table of contents stops descending
    pub toc_stop: u32,
    /// HTML stylesheet
    pub style: StyleVariant,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            line_width: 80,
            toc_start: 0,
            toc_stop: 2,
            style: StyleVariant::Default,
        }
    }
}

/// Publisher trait: two-phase visitor over the document tree
///
/// A publisher instance holds per-document state and is used for one
/// publish run.
pub trait Publisher {
    /// The output format this publisher produces
    fn format(&self) -> OutputFormat;

    fn doc_begin(
        &mut self,
        cx: &mut PublishContext<'_>,
        title: &str,
        style: StyleVariant,
    ) -> Result<()>;

    fn doc_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()>;

    /// Called after the node's level has been pushed
    fn node_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()>;

    /// Called after all children, before the level is popped
    fn node_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()>;
}

type PublisherFactory = fn(&PublishConfig) -> Box<dyn Publisher>;

fn text_publisher(config: &PublishConfig) -> Box<dyn Publisher> {
    Box::new(TextPublisher::with_width(config.line_width))
}

fn html_publisher(_: &PublishConfig) -> Box<dyn Publisher> {
    Box::new(HtmlPublisher::new())
}

fn xml_publisher(_: &PublishConfig) -> Box<dyn Publisher> {
    Box::new(XmlPublisher::new())
}

/// Registry of publisher constructors
pub struct PublisherRegistry {
    factories: HashMap<OutputFormat, PublisherFactory>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the text, HTML and XML publishers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(OutputFormat::Text, text_publisher);
        registry.register(OutputFormat::Html, html_publisher);
        registry.register(OutputFormat::Xml, xml_publisher);
        registry
    }

    pub fn register(&mut self, format: OutputFormat, factory: PublisherFactory) {
        self.factories.insert(format, factory);
    }

    /// Fresh publisher for one document
    pub fn create(&self, format: OutputFormat, config: &PublishConfig) -> Result<Box<dyn Publisher>> {
        self.factories
            .get(&format)
            .map(|factory| factory(config))
            .ok_or_else(|| Error::UnknownPublisher(format.to_string()))
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
