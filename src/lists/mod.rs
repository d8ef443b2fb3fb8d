mod formatter;
mod options;
mod pattern;

pub use formatter::{ListFormatter, NameSource, format_names, list};
pub use options::{ListOptions, Variable};
pub use pattern::Pattern;
