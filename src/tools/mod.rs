pub mod catalog;
pub mod executor;
pub mod registry;
pub mod theme;

pub use catalog::{CatalogEntry, ToolCatalog};
pub use executor::{ToolExecutor, ToolHandler, ToolResult};
pub use registry::{Tool, ToolError, ToolRegistry};
pub use theme::{ApplyBespokeThemeTool, Theme, ThemeHandle};
