use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

/// A `host:port` nothing is listening on, so connecting always fails.
#[allow(dead_code)]
pub fn unreachable_target() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind probe listener");
    let addr = listener.local_addr().expect("listener has no address");
    drop(listener);
    addr.to_string()
}

/// `zkcli` pointed at an unreachable server with a one second connect timeout.
#[allow(dead_code)]
pub fn zkcli_offline() -> Command {
    let mut cmd = cargo_bin_cmd!("zkcli");
    cmd.env_remove("RUST_LOG")
        .arg("--target")
        .arg(unreachable_target())
        .arg("--timeout")
        .arg("1");
    cmd
}

// Each integration test file is compiled as its own crate, so helpers above and below
// are unused in some of them.
#[allow(dead_code)]
pub fn write_mapping(dir: &Path, entries: &[(&str, &str, Option<&str>)]) -> PathBuf {
    let mut mapping = String::from("# generated by the test\n");
    for (znode, file, content) in entries {
        if let Some(content) = content {
            fs::write(dir.join(file), content).expect("failed to write payload");
        }
        mapping.push_str(&format!("{znode}:{file}\n"));
    }
    let path = dir.join("mapping.txt");
    fs::write(&path, mapping).expect("failed to write mapping");
    path
}

/// What [`FakeEnsemble`] has seen from its clients.
#[allow(dead_code)]
#[derive(Debug, PartialEq, Eq)]
pub enum EnsembleEvent {
    SessionEstablished,
    SessionClosed,
    /// A connection that did not start with a handshake, such as a `ruok` probe.
    ProbeConnected,
}

/// A local server speaking just enough of the ZooKeeper protocol to hold a session.
///
/// The first connection is served as a session: the handshake is completed, pings and
/// CloseSession are answered, every other request is left pending. Later connections are
/// accepted and never answered.
#[allow(dead_code)]
pub struct FakeEnsemble {
    pub target: String,
    pub events: Receiver<EnsembleEvent>,
}

#[allow(dead_code)]
impl FakeEnsemble {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind fake ensemble");
        let target = listener
            .local_addr()
            .expect("listener has no address")
            .to_string();
        let (sender, events) = mpsc::channel();

        thread::spawn(move || {
            let mut first = true;
            for socket in listener.incoming() {
                let Ok(socket) = socket else { return };
                let sender = sender.clone();
                if first {
                    first = false;
                    thread::spawn(move || serve_session(socket, sender));
                } else {
                    let _ = sender.send(EnsembleEvent::ProbeConnected);
                    thread::spawn(move || {
                        let _socket = socket;
                        thread::sleep(Duration::from_secs(60));
                    });
                }
            }
        });

        FakeEnsemble { target, events }
    }

    pub fn wait_for(&self, expected: EnsembleEvent) {
        let deadline = Duration::from_secs(10);
        loop {
            match self.events.recv_timeout(deadline) {
                Ok(event) if event == expected => return,
                Ok(_) => {}
                Err(e) => panic!("never saw {expected:?}: {e}"),
            }
        }
    }
}

#[allow(dead_code)]
const OP_CLOSE_SESSION: i32 = -11;
#[allow(dead_code)]
const OP_PING: i32 = 11;

#[allow(dead_code)]
fn read_frame(socket: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut len = [0u8; 4];
    socket.read_exact(&mut len)?;
    let mut frame = vec![0u8; u32::from_be_bytes(len) as usize];
    socket.read_exact(&mut frame)?;
    Ok(frame)
}

#[allow(dead_code)]
fn write_frame(socket: &mut TcpStream, body: &[u8]) -> io::Result<()> {
    socket.write_all(&(body.len() as u32).to_be_bytes())?;
    socket.write_all(body)
}

#[allow(dead_code)]
fn reply_header(xid: i32) -> Vec<u8> {
    let mut header = xid.to_be_bytes().to_vec();
    header.extend_from_slice(&0i64.to_be_bytes());
    header.extend_from_slice(&0i32.to_be_bytes());
    header
}

#[allow(dead_code)]
fn serve_session(mut socket: TcpStream, events: Sender<EnsembleEvent>) -> io::Result<()> {
    read_frame(&mut socket)?;

    let mut response = 0i32.to_be_bytes().to_vec();
    response.extend_from_slice(&10_000i32.to_be_bytes());
    response.extend_from_slice(&0x5eed_i64.to_be_bytes());
    response.extend_from_slice(&16i32.to_be_bytes());
    response.extend_from_slice(&[0u8; 16]);
    response.push(0);
    write_frame(&mut socket, &response)?;
    let _ = events.send(EnsembleEvent::SessionEstablished);

    loop {
        let request = read_frame(&mut socket)?;
        if request.len() < 8 {
            continue;
        }
        let xid = i32::from_be_bytes([request[0], request[1], request[2], request[3]]);
        let opcode = i32::from_be_bytes([request[4], request[5], request[6], request[7]]);
        match opcode {
            OP_PING => write_frame(&mut socket, &reply_header(xid))?,
            OP_CLOSE_SESSION => {
                let _ = events.send(EnsembleEvent::SessionClosed);
                write_frame(&mut socket, &reply_header(xid))?;
            }
            _ => {}
        }
    }
}
