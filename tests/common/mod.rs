//! In-process mock RCON server for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use vipsync::rcon::{transform, SessionTimings, READ_BUFFER_SIZE};
use vipsync::registry::ServerTarget;

/// How the mock misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Normal,
    /// Close the connection without sending a key.
    NoKey,
    /// Stop answering after a successful login.
    SilentAfterLogin,
    /// Deliver every reply as two separately obfuscated writes a few ms apart.
    SplitReplies,
}

#[derive(Debug)]
pub struct MockState {
    pub password: String,
    pub vips: Vec<(String, String)>,
    pub commands: Vec<String>,
    pub connections: usize,
}

pub struct MockRconServer {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<MockState>>,
}

impl MockRconServer {
    pub async fn start(
        key: &[u8],
        password: &str,
        vips: &[(&str, &str)],
        behavior: Behavior,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(MockState {
            password: password.to_string(),
            vips: vips
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            commands: Vec::new(),
            connections: 0,
        }));

        let key = key.to_vec();
        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                let key = key.clone();
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, key, shared, behavior).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn target(&self, password: &str) -> ServerTarget {
        ServerTarget::new("127.0.0.1", self.addr.port(), password)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn vip_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .vips
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }
}

pub fn fast_timings() -> SessionTimings {
    SessionTimings {
        connect_timeout: Duration::from_millis(500),
        idle_timeout: Duration::from_millis(300),
        quiescence: Duration::from_millis(20),
        read_buffer_size: READ_BUFFER_SIZE,
    }
}

/// A port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn serve(
    mut stream: TcpStream,
    key: Vec<u8>,
    state: Arc<Mutex<MockState>>,
    behavior: Behavior,
) -> std::io::Result<()> {
    if behavior == Behavior::NoKey {
        return stream.shutdown().await;
    }
    stream.write_all(&key).await?;

    let mut logged_in = false;
    let mut buf = vec![0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let plain = transform(&key, &buf[..n]).unwrap();
        let command = String::from_utf8_lossy(&plain).into_owned();

        let reply = {
            let mut state = state.lock().unwrap();
            state.commands.push(command.clone());
            answer(&mut state, &command, &mut logged_in)
        };

        if behavior == Behavior::SilentAfterLogin && logged_in && !command.starts_with("login ") {
            continue;
        }

        let reply = reply.as_bytes();
        if behavior == Behavior::SplitReplies && reply.len() > 1 {
            // Each write is its own frame, obfuscated from the start of the key.
            let (first, second) = reply.split_at(reply.len() / 2);
            stream.write_all(&transform(&key, first).unwrap()).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            stream.write_all(&transform(&key, second).unwrap()).await?;
        } else {
            stream.write_all(&transform(&key, reply).unwrap()).await?;
        }
    }
}

fn answer(state: &mut MockState, command: &str, logged_in: &mut bool) -> String {
    if let Some(password) = command.strip_prefix("login ") {
        *logged_in = password == state.password;
        return if *logged_in { "SUCCESS" } else { "FAIL" }.to_string();
    }
    if !*logged_in {
        return "FAIL".to_string();
    }

    if command == "get vipids" {
        let mut reply = state.vips.len().to_string();
        for (id, name) in &state.vips {
            reply.push('\t');
            reply.push_str(&format!("{} \"{}\"", id, name));
        }
        return reply;
    }
    if let Some(rest) = command.strip_prefix("vipadd ") {
        let (id, name) = rest.split_once(' ').unwrap_or((rest, ""));
        state
            .vips
            .push((id.to_string(), name.trim_matches('"').to_string()));
        return "SUCCESS".to_string();
    }
    if let Some(id) = command.strip_prefix("vipdel ") {
        state.vips.retain(|(existing, _)| existing != id);
        return "SUCCESS".to_string();
    }
    "FAIL".to_string()
}
