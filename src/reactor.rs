//! The single-threaded event loop. Owns the store, the block manager, the
//! event bus, and every client connection; nothing here is shared across
//! threads. Each iteration follows a fixed order: wait for readiness,
//! expire deadlines, service ready sockets, reprocess clients a
//! notification just woke, flush queued replies.

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};

use crate::block::{BlockManager, ClientId};
use crate::client::Client;
use crate::commands::{self, Command, DispatchOutcome};
use crate::event::EventBus;
use crate::resp::RespHandler;
use crate::store::Store;

const LISTENER_TOKEN: Token = Token(0);
const READ_CHUNK: usize = 4096;

struct Connection {
    stream: TcpStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    write_interest: bool,
    client: Client,
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    store: Store,
    block_mgr: BlockManager,
    events_bus: EventBus,
    default_idle_ms: u64,
    max_clients: usize,
    started_at: Instant,
}

impl Reactor {
    pub fn bind(addr: SocketAddr, default_idle_ms: u64, max_clients: usize) -> std::io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
        info!(%addr, "listening");
        Ok(Reactor {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: 1,
            store: Store::new(),
            block_mgr: BlockManager::new(),
            events_bus: EventBus::new(),
            default_idle_ms,
            max_clients,
            started_at: Instant::now(),
        })
    }

    /// The address actually bound, useful when `bind` was given port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn now_ms(&self) -> i64 {
        self.started_at.elapsed().as_millis() as i64
    }

    /// Run the loop until the readiness wait returns a non-EINTR error.
    pub fn run(&mut self) -> std::io::Result<()> {
        let mut events = Events::with_capacity(1024);
        loop {
            let wait_ms = {
                let now_ms = self.now_ms();
                let earliest = self.block_mgr.earliest_deadline_ms(now_ms);
                if earliest < 0 {
                    self.default_idle_ms
                } else {
                    (earliest as u64).min(self.default_idle_ms)
                }
            };

            match self.poll.poll(&mut events, Some(Duration::from_millis(wait_ms))) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let now_ms = self.now_ms();
            self.expire_deadlines(now_ms);

            for event in events.iter() {
                let token = event.token();
                if token == LISTENER_TOKEN {
                    self.accept_all();
                    continue;
                }
                if event.is_readable() {
                    self.service_connection(token, now_ms);
                }
                if event.is_writable() {
                    self.try_flush_write_buf(token);
                }
            }

            self.reprocess_woken_clients(now_ms);
            self.flush_events();
        }
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if self.connections.len() >= self.max_clients {
                        warn!(%peer, "rejecting connection: at max_clients ({})", self.max_clients);
                        continue;
                    }
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        warn!("failed to register connection from {peer}: {e}");
                        continue;
                    }
                    info!(client = token.0, %peer, "accepted connection");
                    self.connections.insert(
                        token,
                        Connection {
                            stream,
                            read_buf: Vec::new(),
                            write_buf: Vec::new(),
                            write_interest: false,
                            client: Client::new(token.0),
                        },
                    );
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("accept failed: {e}");
                    return;
                }
            }
        }
    }

    /// Read whatever is available, parse every complete frame it yields
    /// (one command may arrive pipelined with others), and run each.
    fn service_connection(&mut self, token: Token, now_ms: i64) {
        let mut closed = false;
        let mut commands_to_run: Vec<Vec<String>> = Vec::new();

        if let Some(conn) = self.connections.get_mut(&token) {
            let mut temp = [0u8; READ_CHUNK];
            loop {
                match conn.stream.read(&mut temp) {
                    Ok(0) => {
                        closed = true;
                        break;
                    }
                    Ok(n) => conn.read_buf.extend_from_slice(&temp[..n]),
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        debug!("read error on client {}: {e}", token.0);
                        closed = true;
                        break;
                    }
                }
            }

            loop {
                match RespHandler::parse_request(&conn.read_buf) {
                    Ok(Some((value, len))) => {
                        conn.read_buf.drain(0..len);
                        match commands::request_to_tokens(&value) {
                            Ok(tokens) => commands_to_run.push(tokens),
                            Err(e) => self.events_bus.push_error(token.0, e.to_resp_error()),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("malformed frame from client {}: {e}", token.0);
                        closed = true;
                        break;
                    }
                }
            }
        } else {
            return;
        }

        if closed {
            self.close_connection(token);
            return;
        }

        for tokens in commands_to_run {
            self.run_one_command(token, tokens, now_ms);
        }
    }

    fn run_one_command(&mut self, token: Token, tokens: Vec<String>, now_ms: i64) {
        let client_id = token.0;
        match commands::parse_command(&tokens) {
            Ok(cmd) => {
                let block_request = match &cmd {
                    Command::XRead(args) => Some((
                        args.keys.iter().map(|k| ("stream".to_string(), k.clone())).collect::<Vec<_>>(),
                        args.block_ms,
                    )),
                    _ => None,
                };

                let outcome = commands::dispatch(&mut self.store, &mut self.block_mgr, &mut self.events_bus, client_id, cmd, now_ms);

                if let DispatchOutcome::Blocked = outcome {
                    if let Some((keys, Some(block_ms))) = block_request {
                        if let Some(conn) = self.connections.get_mut(&token) {
                            conn.client.mark_blocked(&keys, now_ms + block_ms as i64);
                            conn.client.pending_request = Some(tokens);
                        }
                    }
                }
            }
            Err(e) => self.events_bus.push_error(client_id, e.to_resp_error()),
        }
    }

    /// Clients a notification moved into `pending_reprocess`: re-run their
    /// stored request. It either completes with a reply now (and is
    /// unblocked) or re-blocks on a fresh deadline.
    fn reprocess_woken_clients(&mut self, now_ms: i64) {
        let woken: Vec<ClientId> = self.block_mgr.pending_reprocess.drain(..).collect();
        for client_id in woken {
            let token = Token(client_id);
            let Some(tokens) = self.connections.get(&token).and_then(|c| c.client.pending_request.clone()) else {
                continue;
            };
            self.run_one_command(token, tokens, now_ms);
            if let Some(conn) = self.connections.get_mut(&token) {
                if !self.block_mgr.is_blocked(client_id) {
                    conn.client.clear_block();
                }
            }
        }
    }

    fn expire_deadlines(&mut self, now_ms: i64) {
        for client_id in self.block_mgr.expire_deadlines(now_ms) {
            self.events_bus.push_nil(client_id);
            if let Some(conn) = self.connections.get_mut(&Token(client_id)) {
                conn.client.clear_block();
            }
        }
    }

    fn flush_events(&mut self) {
        for event in self.events_bus.drain() {
            if let Some(conn) = self.connections.get_mut(&Token(event.client)) {
                conn.write_buf.extend_from_slice(event.value.serialize().as_bytes());
            }
        }
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.try_flush_write_buf(token);
        }
    }

    fn try_flush_write_buf(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else { return };
        if conn.write_buf.is_empty() {
            return;
        }
        match conn.stream.write(&conn.write_buf) {
            Ok(n) => {
                conn.write_buf.drain(0..n);
                let want_writable = !conn.write_buf.is_empty();
                if want_writable != conn.write_interest {
                    conn.write_interest = want_writable;
                    let interest = if want_writable {
                        Interest::READABLE | Interest::WRITABLE
                    } else {
                        Interest::READABLE
                    };
                    let _ = self.poll.registry().reregister(&mut conn.stream, token, interest);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if !conn.write_interest {
                    conn.write_interest = true;
                    let _ = self.poll.registry().reregister(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE);
                }
            }
            Err(e) => {
                warn!("write failed on client {}: {e}", token.0);
                self.close_connection(token);
            }
        }
    }

    fn close_connection(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            self.block_mgr.unblock(token.0);
            info!(client = token.0, "connection closed");
        }
    }
}
