pub mod catalog;
pub mod handlers;
pub mod prompts;
pub mod proxy;
pub mod resources;

use catalog::{Catalog, ServerKind};
use proxy::ToolProxy;

/// State of one MCP server process, shared with every handler.
pub struct McpServer {
    pub kind: ServerKind,
    pub proxy: ToolProxy,
}

impl McpServer {
    pub fn new(kind: ServerKind, proxy: ToolProxy) -> Self {
        Self { kind, proxy }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.proxy.catalog()
    }
}
