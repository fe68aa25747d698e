// SPDX-License-Identifier: AGPL-3.0-or-later
//! Built-in publishers for each output format

pub mod html;
pub mod text;
pub mod xml;

pub use html::HtmlPublisher;
pub use text::TextPublisher;
pub use xml::XmlPublisher;
