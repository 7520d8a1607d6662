//! Hierarchy listing command

use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::error::CliError;
use crate::database::{DatabaseBackendType, DivisionStore};
use crate::models::DivisionNode;

use super::{load_config, open_duckdb, parse_tenant};

/// Tree command arguments
#[derive(Debug, Clone)]
pub struct TreeArgs {
    pub tenant: String,
    pub workspace: PathBuf,
    /// Preferred label language
    pub lang: String,
    /// Deepest level to print
    pub max_depth: Option<i64>,
}

/// Print a tenant's divisions as an indented tree
pub fn handle_tree(args: &TreeArgs) -> Result<(), CliError> {
    let workspace_path = &args.workspace;
    let tenant_id = parse_tenant(&args.tenant)?;
    let config = load_config(workspace_path)?;

    if config.database.backend == DatabaseBackendType::Memory {
        return Err(CliError::InvalidArgument(
            "The memory backend does not persist divisions; nothing to list".to_string(),
        ));
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))?;

    rt.block_on(async {
        let store = open_duckdb(&config, workspace_path)?;
        let lines = render_tree(&store, tenant_id, &args.lang, args.max_depth).await?;
        if lines.is_empty() {
            eprintln!("No divisions found for tenant {}", tenant_id);
        }
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    })
}

/// Render the hierarchy depth-first, children in store order
pub(crate) async fn render_tree<S: DivisionStore + ?Sized>(
    store: &S,
    tenant_id: Uuid,
    lang: &str,
    max_depth: Option<i64>,
) -> Result<Vec<String>, CliError> {
    let mut lines = Vec::new();
    let mut stack: Vec<DivisionNode> = store.children(tenant_id, None).await?;
    stack.reverse();

    while let Some(node) = stack.pop() {
        lines.push(format_node(&node, lang));

        if max_depth.is_some_and(|depth| node.level >= depth) {
            continue;
        }
        let mut children = store.children(tenant_id, Some(node.id)).await?;
        children.reverse();
        stack.extend(children);
    }

    Ok(lines)
}

fn format_node(node: &DivisionNode, lang: &str) -> String {
    format!(
        "{}{} [{}]",
        "  ".repeat(node.level.saturating_sub(1).max(0) as usize),
        node.label(&[lang]).unwrap_or("(unnamed)"),
        node.import_id.as_deref().unwrap_or("-")
    )
}
