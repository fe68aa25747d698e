// SPDX-License-Identifier: AGPL-3.0-or-later
//! Command implementations

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use structext_core::{publish_to_string, DocumentStore, NodeId, OutputFormat, PublishConfig, StyleVariant};

/// Arguments for `publish`
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Markup file, `-` for stdin
    input: PathBuf,

    /// Output format: text, html or xml
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// HTML stylesheet: default or small
    #[arg(long, default_value = "default")]
    style: StyleVariant,

    /// Text line width
    #[arg(long, default_value_t = 80)]
    width: usize,

    /// First heading level listed in the table of contents
    #[arg(long, default_value_t = 0)]
    toc_start: u32,

    /// Heading level where the table of contents stops
    #[arg(long, default_value_t = 2)]
    toc_stop: u32,

    /// Define a macro symbol, `name=value`
    #[arg(short = 'D', value_parser = parse_define)]
    define: Vec<(String, String)>,
}

impl PublishArgs {
    pub fn execute(self) -> Result<()> {
        let source = read_input(&self.input)?;
        let config = PublishConfig {
            line_width: self.width,
            toc_start: self.toc_start,
            toc_stop: self.toc_stop,
            style: self.style,
        };
        let output = publish_document(&source, self.format, &config, &self.define)?;
        write_output(self.output.as_deref(), &output)
    }
}

/// Arguments for `dump`
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Markup file, `-` for stdin
    input: PathBuf,

    /// Define a macro symbol, `name=value`
    #[arg(short = 'D', value_parser = parse_define)]
    define: Vec<(String, String)>,
}

impl DumpArgs {
    pub fn execute(self) -> Result<()> {
        let source = read_input(&self.input)?;
        let json = dump_document(&source, &self.define)?;
        write_output(None, &format!("{json}\n"))
    }
}

/// Split `name=value`
fn parse_define(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got {s:?}")),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read stdin")?;
        return Ok(source);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_output(path: Option<&Path>, output: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

/// Parse markup with the given global symbols
fn load_document(store: &mut DocumentStore, source: &str, defines: &[(String, String)]) -> NodeId {
    for (name, value) in defines {
        store.scope_mut().globals.set(name.as_str(), value.as_str());
    }
    let root = store.parse_text(source);
    tracing::debug!(node = %root, defines = defines.len(), "document loaded");
    root
}

pub fn publish_document(
    source: &str,
    format: OutputFormat,
    config: &PublishConfig,
    defines: &[(String, String)],
) -> Result<String> {
    let mut store = DocumentStore::new();
    let root = load_document(&mut store, source, defines);
    publish_to_string(&mut store, root, format, config)
        .with_context(|| format!("Failed to publish as {format}"))
}

pub fn dump_document(source: &str, defines: &[(String, String)]) -> Result<String> {
    let mut store = DocumentStore::new();
    let root = load_document(&mut store, source, defines);
    let tree = store.to_json(root).context("Failed to serialize document")?;
    Ok(serde_json::to_string_pretty(&tree)?)
}
