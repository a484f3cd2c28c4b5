//! ZooKeeper-backed [`Namespace`].

use super::{Namespace, NamespaceError, NodeStat, ROOT};
use std::io::{Read, Write};
use std::mem::ManuallyDrop;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zookeeper::{Stat, WatchedEvent, Watcher, ZkError, ZkState, ZooKeeper, ZooKeeperExt};

const HEALTH_PROBE_COMMAND: &[u8] = b"ruok";

/// Node watches are never set, so the only events seen here are informational.
struct LoggingWatcher;

impl Watcher for LoggingWatcher {
    fn handle(&self, event: WatchedEvent) {
        debug!("ZooKeeper event: {:?}", event);
    }
}

fn is_connected(state: &ZkState) -> bool {
    matches!(state, ZkState::Connected | ZkState::ConnectedReadOnly)
}

pub struct ZkNamespace {
    target: String,
    timeout: Duration,
    /// Never dropped: `ZooKeeper`'s `Drop` closes the session again and blocks until the
    /// server answers. The session is closed through [`ZkNamespace::disconnect`] instead.
    zk: ManuallyDrop<ZooKeeper>,
    connected: Arc<AtomicBool>,
    released: AtomicBool,
}

impl ZkNamespace {
    /// Opens a session with `target` and waits up to `timeout` for it to be usable.
    pub fn connect(target: &str, timeout: Duration) -> Result<Self, NamespaceError> {
        info!("Connecting to {}", target);

        let zk = ZooKeeper::connect(target, timeout, LoggingWatcher).map_err(|e| {
            NamespaceError::Connection {
                target: target.to_string(),
                message: format!("{:?}", e),
            }
        })?;
        let zk = ManuallyDrop::new(zk);

        let (sender, receiver) = mpsc::channel();
        let connected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&connected);
        zk.add_listener(move |state: ZkState| {
            debug!("Session state: {:?}", state);
            let up = is_connected(&state);
            flag.store(up, Ordering::SeqCst);
            // The receiver is gone once connect has returned.
            let _ = sender.send(up);
        });

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(true) => break,
                Ok(false) => {}
                // The handle is leaked: nothing was established that could be closed.
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(NamespaceError::Connection {
                        target: target.to_string(),
                        message: format!("no session established within {:?}", timeout),
                    });
                }
            }
        }

        debug!("Connected to {}", target);

        Ok(ZkNamespace {
            target: target.to_string(),
            timeout,
            zk,
            connected,
            released: AtomicBool::new(false),
        })
    }

    /// Closes the session. Only the first call has an effect.
    ///
    /// A session whose connection is currently lost is left to expire on the server, since
    /// closing it would wait for a reconnect.
    pub fn disconnect(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.connected.load(Ordering::SeqCst) {
            warn!("Not connected to {}, leaving session to expire", self.target);
            return;
        }
        debug!("Closing session with {}", self.target);
        if let Err(e) = self.zk.close() {
            warn!("Failed to close session with {}: {:?}", self.target, e);
        }
    }

    fn service_error(path: &str, error: ZkError) -> NamespaceError {
        match error {
            ZkError::NoNode => NamespaceError::NodeNotFound(path.to_string()),
            other => NamespaceError::Service {
                path: path.to_string(),
                message: format!("{:?}", other),
            },
        }
    }
}

impl Drop for ZkNamespace {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl From<Stat> for NodeStat {
    fn from(stat: Stat) -> Self {
        NodeStat {
            czxid: stat.czxid,
            mzxid: stat.mzxid,
            ctime: stat.ctime,
            mtime: stat.mtime,
            version: stat.version,
            cversion: stat.cversion,
            aversion: stat.aversion,
            ephemeral_owner: stat.ephemeral_owner,
            data_length: stat.data_length,
            num_children: stat.num_children,
            pzxid: stat.pzxid,
        }
    }
}

impl Namespace for ZkNamespace {
    fn exists(&self, path: &str) -> Result<bool, NamespaceError> {
        self.zk
            .exists(path, false)
            .map(|stat| stat.is_some())
            .map_err(|e| Self::service_error(path, e))
    }

    fn list_children(&self, path: &str) -> Result<Vec<String>, NamespaceError> {
        self.zk
            .get_children(path, false)
            .map_err(|e| Self::service_error(path, e))
    }

    fn get_value(&self, path: &str) -> Result<(Vec<u8>, NodeStat), NamespaceError> {
        let (payload, stat) = self
            .zk
            .get_data(path, false)
            .map_err(|e| Self::service_error(path, e))?;
        Ok((payload, stat.into()))
    }

    fn set_value(&self, path: &str, payload: Vec<u8>) -> Result<(), NamespaceError> {
        self.zk
            .set_data(path, payload, None)
            .map(|_| ())
            .map_err(|e| Self::service_error(path, e))
    }

    fn create_path(&self, path: &str) -> Result<(), NamespaceError> {
        self.zk
            .ensure_path(path)
            .map_err(|e| Self::service_error(path, e))
    }

    fn delete_subtree(&self, path: &str) -> Result<(), NamespaceError> {
        self.zk
            .delete_recursive(path)
            .map_err(|e| Self::service_error(path, e))
    }

    fn health_probe(&self) -> Result<String, NamespaceError> {
        probe_host(&self.target, self.timeout).map_err(|e| NamespaceError::Service {
            path: ROOT.to_string(),
            message: format!("health probe failed: {}", e),
        })
    }
}

/// First `host:port` of a connect string such as `a:2181,b:2181/chroot`.
fn first_host(target: &str) -> &str {
    let hosts = target.split('/').next().unwrap_or(target);
    hosts.split(',').next().unwrap_or(hosts).trim()
}

fn probe_host(target: &str, timeout: Duration) -> std::io::Result<String> {
    let host = first_host(target);
    let addr = host
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::other(format!("no address for {}", host)))?;

    debug!("Sending health probe to {}", addr);

    let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.write_all(HEALTH_PROBE_COMMAND)?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply)?;
    Ok(reply)
}
