//! The render stages.
//!
//! 1. **extensions** - run the content through each extension conversion
//! 2. **document** - the whole-document plugin hook
//! 3. **layouts** - wrap the content in the document's layout

mod document;
mod extensions;
mod layouts;

pub(super) use self::document::render_document_hook;
pub use self::extensions::{Conversion, extension_chain};
pub(super) use self::extensions::render_extensions;
pub(super) use self::layouts::render_layouts;
