mod action;
mod builder;
mod cson;
mod database;
mod document;
mod events;
mod file;
mod highlight;
mod layout;
mod meta;
mod pipeline;
mod plugins;
mod source;
mod template_data;

pub use action::{ActionOptions, ActionQueue, GroupPolicy};
pub use builder::{Builder, base_path_from_config};
pub use document::SingleExtensions;
pub use template_data::TemplateData;
