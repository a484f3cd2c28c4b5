//! Operations selected by `--action`.
//!
//! An [`Operation`] is built from the command line before any connection is opened, so
//! missing options, bad payloads and unreadable deployment sources are reported without
//! needing a reachable service. [`run`] then executes it against a [`Namespace`].

use crate::cli::Action;
use crate::deploy::{DeployError, DeploymentPlan, deploy};
use crate::namespace::{Namespace, NamespaceError, NodeStat, ROOT, create_and_set, is_root};
use crate::payload::{PayloadError, read_canonical};
use crate::tree::{TreeError, render_tree};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

const HEALTHY_REPLY: &str = "imok";

#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error("Option --znode (or -z) is mandatory with the selected action")]
    MissingZnode,
    #[error("'Set' action needs --znode (or -z) positionned.")]
    SetMissingZnode,
    #[error("'Set' action needs option --input or --values positionned.")]
    SetMissingValue,
    #[error("Deploy action needs an input file (-i or --input)")]
    DeployMissingInput,
    #[error("ROOT cannot be deleted, exiting.")]
    RootDeletion,
    #[error("ZNode {0} does not exist.")]
    NodeNotFound(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("Error during creation/insertion of keys/values: {0}")]
    Write(NamespaceError),
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// The options an operation may draw on, independent of how they were parsed.
#[derive(Debug, Default)]
pub struct OperationArgs {
    pub znode: Option<String>,
    /// Canonical JSON text from `--values`.
    pub values: Option<String>,
    pub input: Option<PathBuf>,
}

#[derive(Debug)]
pub enum Operation {
    Get { znode: String },
    Stats { znode: String },
    Set { znode: String, payload: Vec<u8> },
    Deploy { plan: DeploymentPlan },
    Tree { znode: String },
    Delete { znode: String },
    List { znode: String },
    Status,
}

/// How an operation that ran to completion turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Unhealthy,
    EntriesFailed(usize),
}

impl Operation {
    /// Validates `args` for `action` and prepares everything that can be prepared offline.
    pub fn prepare(action: Action, args: OperationArgs) -> Result<Self, OpError> {
        let OperationArgs {
            znode,
            values,
            input,
        } = args;

        let op = match action {
            Action::Get => Operation::Get {
                znode: znode.ok_or(OpError::MissingZnode)?,
            },
            Action::Stats => Operation::Stats {
                znode: znode.ok_or(OpError::MissingZnode)?,
            },
            Action::Del => Operation::Delete {
                znode: znode.ok_or(OpError::MissingZnode)?,
            },
            Action::List => Operation::List {
                znode: znode.ok_or(OpError::MissingZnode)?,
            },
            Action::Tree => Operation::Tree {
                znode: znode.unwrap_or_else(|| ROOT.to_string()),
            },
            Action::Status => Operation::Status,
            Action::Set => {
                let payload = match (input, values) {
                    (Some(path), _) => read_canonical(&path)?,
                    (None, Some(values)) => values.into_bytes(),
                    (None, None) => return Err(OpError::SetMissingValue),
                };
                Operation::Set {
                    znode: znode.ok_or(OpError::SetMissingZnode)?,
                    payload,
                }
            }
            Action::Deploy => {
                let input = input.ok_or(OpError::DeployMissingInput)?;
                Operation::Deploy {
                    plan: DeploymentPlan::load(&input)?,
                }
            }
        };

        Ok(op)
    }
}

/// Runs `op` against `namespace`, writing command output to `out`.
pub fn run<N, W>(op: Operation, namespace: &N, out: &mut W) -> Result<Outcome, OpError>
where
    N: Namespace + ?Sized,
    W: Write + ?Sized,
{
    match op {
        Operation::Get { znode } => {
            require_exists(namespace, &znode)?;
            let (payload, _) = namespace.get_value(&znode)?;
            writeln!(out, "{}", String::from_utf8_lossy(&payload).trim_end())?;
        }
        Operation::Stats { znode } => {
            require_exists(namespace, &znode)?;
            let (_, stat) = namespace.get_value(&znode)?;
            write_stat(&stat, out)?;
        }
        Operation::Set { znode, payload } => {
            create_and_set(namespace, &znode, payload).map_err(OpError::Write)?;
        }
        Operation::Deploy { plan } => {
            let report = deploy(namespace, &plan);
            if !report.failures.is_empty() {
                return Ok(Outcome::EntriesFailed(report.failures.len()));
            }
        }
        Operation::Tree { znode } => {
            render_tree(namespace, &znode, out)?;
        }
        Operation::Delete { znode } => {
            if is_root(&znode) {
                return Err(OpError::RootDeletion);
            }
            require_exists(namespace, &znode)?;
            info!("Deleting znode {}", znode);
            namespace.delete_subtree(&znode)?;
        }
        Operation::List { znode } => {
            require_exists(namespace, &znode)?;
            let children = namespace.list_children(&znode)?;
            if children.is_empty() {
                writeln!(out, "Znode {} has no child", znode)?;
            } else {
                for child in children {
                    writeln!(out, "{}", child)?;
                }
            }
        }
        Operation::Status => return check_health(namespace, out),
    }

    Ok(Outcome::Done)
}

fn require_exists<N: Namespace + ?Sized>(namespace: &N, znode: &str) -> Result<(), OpError> {
    if namespace.exists(znode)? {
        Ok(())
    } else {
        Err(OpError::NodeNotFound(znode.to_string()))
    }
}

fn check_health<N, W>(namespace: &N, out: &mut W) -> Result<Outcome, OpError>
where
    N: Namespace + ?Sized,
    W: Write + ?Sized,
{
    let reply = match namespace.health_probe() {
        Ok(reply) => reply,
        Err(e) => {
            writeln!(out, "WARN - {}", e)?;
            return Ok(Outcome::Unhealthy);
        }
    };

    if reply.trim_end() == HEALTHY_REPLY {
        writeln!(out, "OK")?;
        Ok(Outcome::Done)
    } else {
        writeln!(out, "WARN - Server replied : {}", reply)?;
        Ok(Outcome::Unhealthy)
    }
}

fn write_stat<W: Write + ?Sized>(stat: &NodeStat, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "czxid: {}", stat.czxid)?;
    writeln!(out, "mzxid: {}", stat.mzxid)?;
    writeln!(out, "ctime: {}", format_millis(stat.ctime))?;
    writeln!(out, "mtime: {}", format_millis(stat.mtime))?;
    writeln!(out, "version: {}", stat.version)?;
    writeln!(out, "cversion: {}", stat.cversion)?;
    writeln!(out, "aversion: {}", stat.aversion)?;
    writeln!(out, "ephemeral_owner: {:#x}", stat.ephemeral_owner)?;
    writeln!(out, "data_length: {}", stat.data_length)?;
    writeln!(out, "num_children: {}", stat.num_children)?;
    writeln!(out, "pzxid: {}", stat.pzxid)
}

fn format_millis(millis: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(millis) {
        Some(utc) => {
            let local: chrono::DateTime<chrono::Local> = utc.into();
            format!("{} ({})", local.format("%Y-%m-%d %H:%M:%S%.3f %z"), millis)
        }
        None => millis.to_string(),
    }
}
