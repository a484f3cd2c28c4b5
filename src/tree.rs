//! Recursive rendering of a znode and its descendants.
//!
//! The walk is depth-first and pre-order, and children are visited in exactly the order the
//! service lists them. Each line is written as soon as its node is visited, so a large tree
//! starts printing before the walk completes.

use crate::namespace::{Namespace, NamespaceError, child_path, node_name};
use std::io::Write;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("Failed to list children of {path}: {source}")]
    Namespace {
        path: String,
        source: NamespaceError,
    },
    #[error("Failed to write tree output: {0}")]
    Output(#[from] std::io::Error),
}

/// One visited node. Only lives long enough to format its line.
struct RenderFrame<'a> {
    path: &'a str,
    depth: usize,
}

impl RenderFrame<'_> {
    fn line(&self) -> String {
        let name = node_name(self.path);
        match self.depth {
            0 => format!(". {}", name),
            1 => format!("  └─── {}", name),
            depth => format!(
                "{}└{} {}",
                "    ".repeat(depth),
                "─".repeat(depth),
                name
            ),
        }
    }
}

/// Writes the tree rooted at `start` to `out`.
///
/// A node that disappears between being listed and being visited is rendered as a leaf.
/// Any other listing failure aborts the render.
pub fn render_tree<N, W>(namespace: &N, start: &str, out: &mut W) -> Result<(), TreeError>
where
    N: Namespace + ?Sized,
    W: Write + ?Sized,
{
    visit(namespace, RenderFrame { path: start, depth: 0 }, out)
}

fn visit<N, W>(namespace: &N, frame: RenderFrame<'_>, out: &mut W) -> Result<(), TreeError>
where
    N: Namespace + ?Sized,
    W: Write + ?Sized,
{
    writeln!(out, "{}", frame.line())?;

    let children = match namespace.list_children(frame.path) {
        Ok(children) => children,
        Err(NamespaceError::NodeNotFound(_)) => {
            debug!("{} vanished during traversal, treating it as a leaf", frame.path);
            return Ok(());
        }
        Err(source) => {
            return Err(TreeError::Namespace {
                path: frame.path.to_string(),
                source,
            });
        }
    };

    for child in &children {
        let path = child_path(frame.path, child);
        visit(
            namespace,
            RenderFrame {
                path: &path,
                depth: frame.depth + 1,
            },
            out,
        )?;
    }

    Ok(())
}
