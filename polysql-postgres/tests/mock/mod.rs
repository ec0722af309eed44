//! A scripted PostgreSQL server for wire-level tests.
//!
//! The server accepts one connection and runs a script against it on a
//! background thread. Scripts read frontend messages with the `expect_*`
//! helpers (asserting on their contents) and answer with hand-encoded
//! backend messages.

#![allow(dead_code)]

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use polysql_postgres::{PgConfig, PgConnection};

/// One connection's worth of scripted server behavior.
pub struct MockServer {
    port: u16,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Listen on an ephemeral port and run `script` against the first client.
    pub fn start<F>(script: F) -> Self
    where
        F: FnOnce(&mut Peer) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut peer = Peer { stream };
            script(&mut peer);
        });
        Self {
            port,
            handle: Some(handle),
        }
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Keyword/value connection string for this server.
    pub fn connection_string(&self) -> String {
        format!("host=127.0.0.1 port={} user=alice dbname=app", self.port)
    }

    /// Parsed configuration for this server, without environment fallbacks.
    pub fn config(&self) -> PgConfig {
        PgConfig::parse(&self.connection_string()).unwrap()
    }

    /// Open a connection to this server.
    pub fn connect(&self) -> PgConnection {
        let mut conn = PgConnection::new();
        conn.open_with_config(&self.config()).unwrap();
        conn
    }

    /// Wait for the script to finish, re-raising its panic if it failed.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    }
}

/// A frontend message body with a read cursor.
pub struct Body {
    data: Vec<u8>,
    pos: usize,
}

impl Body {
    fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let b = self.data[self.pos];
        self.pos += 1;
        b
    }

    pub fn i16(&mut self) -> i16 {
        let v = i16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        v
    }

    pub fn i32(&mut self) -> i32 {
        let bytes = self.bytes(4);
        i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn bytes(&mut self, n: usize) -> Vec<u8> {
        let out = self.data[self.pos..self.pos + n].to_vec();
        self.pos += n;
        out
    }

    pub fn cstr(&mut self) -> String {
        let end = self.data[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .map(|i| self.pos + i)
            .unwrap();
        let s = String::from_utf8(self.data[self.pos..end].to_vec()).unwrap();
        self.pos = end + 1;
        s
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// A decoded Bind message.
#[derive(Debug, PartialEq)]
pub struct Bind {
    pub portal: String,
    pub statement: String,
    pub param_formats: Vec<i16>,
    pub params: Vec<Option<Vec<u8>>>,
    pub result_formats: Vec<i16>,
}

/// The server side of the connection.
pub struct Peer {
    stream: TcpStream,
}

impl Peer {
    /// Read one tagged frontend message.
    pub fn read(&mut self) -> (u8, Body) {
        let mut tag = [0_u8; 1];
        self.stream.read_exact(&mut tag).unwrap();
        let body = self.read_body();
        (tag[0], body)
    }

    fn read_body(&mut self) -> Body {
        let mut len = [0_u8; 4];
        self.stream.read_exact(&mut len).unwrap();
        let len = i32::from_be_bytes(len) as usize - 4;
        let mut data = vec![0_u8; len];
        self.stream.read_exact(&mut data).unwrap();
        Body::new(data)
    }

    /// Read a message and assert its tag.
    pub fn expect(&mut self, tag: u8) -> Body {
        let (actual, body) = self.read();
        assert_eq!(actual as char, tag as char, "unexpected frontend message");
        body
    }

    /// Read the startup message, returning its parameters.
    pub fn read_startup(&mut self) -> Vec<(String, String)> {
        let mut body = self.read_body();
        assert_eq!(body.i32(), 196_608, "protocol version 3.0");
        let mut params = Vec::new();
        loop {
            let key = body.cstr();
            if key.is_empty() {
                break;
            }
            let value = body.cstr();
            params.push((key, value));
        }
        params
    }

    /// Accept the startup message without authentication.
    pub fn handshake(&mut self) -> Vec<(String, String)> {
        let params = self.read_startup();
        self.auth_ok();
        self.finish_startup();
        params
    }

    /// ParameterStatus, BackendKeyData and ReadyForQuery.
    pub fn finish_startup(&mut self) {
        self.parameter_status("server_version", "16.2");
        self.parameter_status("client_encoding", "UTF8");
        self.backend_key_data(4242, 7);
        self.ready();
    }

    /// Read Parse, Describe and Sync, returning the statement name and SQL.
    pub fn expect_prepare(&mut self) -> (String, String) {
        let mut parse = self.expect(b'P');
        let name = parse.cstr();
        let sql = parse.cstr();
        assert_eq!(parse.i16(), 0, "no parameter types are sent");

        let mut describe = self.expect(b'D');
        assert_eq!(describe.u8(), b'S');
        assert_eq!(describe.cstr(), name);

        self.expect(b'S');
        (name, sql)
    }

    /// Answer a successful prepare.
    pub fn prepared(&mut self, params: &[u32], columns: &[(&str, u32)]) {
        self.parse_complete();
        self.parameter_description(params);
        if columns.is_empty() {
            self.no_data();
        } else {
            self.row_description(columns);
        }
        self.ready();
    }

    /// Read Bind, Execute and Sync.
    pub fn expect_bind(&mut self) -> Bind {
        let mut body = self.expect(b'B');
        let portal = body.cstr();
        let statement = body.cstr();
        let param_formats = (0..body.i16()).map(|_| body.i16()).collect();
        let params = (0..body.i16())
            .map(|_| match body.i32() {
                -1 => None,
                len => Some(body.bytes(len as usize)),
            })
            .collect();
        let result_formats = (0..body.i16()).map(|_| body.i16()).collect();

        let mut execute = self.expect(b'E');
        assert_eq!(execute.cstr(), portal);
        assert_eq!(execute.i32(), 0, "all rows are requested");

        self.expect(b'S');
        Bind {
            portal,
            statement,
            param_formats,
            params,
            result_formats,
        }
    }

    /// Read Close and Sync for a statement and answer them.
    pub fn expect_close(&mut self, name: &str) {
        let mut close = self.expect(b'C');
        assert_eq!(close.u8(), b'S');
        assert_eq!(close.cstr(), name);
        self.expect(b'S');
        self.close_complete();
        self.ready();
    }

    /// Read a simple Query, returning its SQL.
    pub fn expect_query(&mut self) -> String {
        self.expect(b'Q').cstr()
    }

    /// Read Terminate, or accept the client hanging up.
    pub fn expect_terminate(&mut self) {
        let mut tag = [0_u8; 1];
        match self.stream.read_exact(&mut tag) {
            Ok(()) => assert_eq!(tag[0] as char, 'X', "expected Terminate"),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {}
            Err(e) => panic!("read failed: {}", e),
        }
    }

    pub fn send(&mut self, tag: u8, body: &[u8]) {
        let mut msg = Vec::with_capacity(body.len() + 5);
        msg.push(tag);
        msg.extend_from_slice(&(body.len() as i32 + 4).to_be_bytes());
        msg.extend_from_slice(body);
        self.stream.write_all(&msg).unwrap();
    }

    pub fn auth_ok(&mut self) {
        self.send(b'R', &0_i32.to_be_bytes());
    }

    pub fn auth_cleartext(&mut self) {
        self.send(b'R', &3_i32.to_be_bytes());
    }

    pub fn auth_md5(&mut self, salt: [u8; 4]) {
        let mut body = 5_i32.to_be_bytes().to_vec();
        body.extend_from_slice(&salt);
        self.send(b'R', &body);
    }

    pub fn parameter_status(&mut self, name: &str, value: &str) {
        let mut body = Vec::new();
        push_cstr(&mut body, name);
        push_cstr(&mut body, value);
        self.send(b'S', &body);
    }

    pub fn backend_key_data(&mut self, process_id: i32, secret_key: i32) {
        let mut body = process_id.to_be_bytes().to_vec();
        body.extend_from_slice(&secret_key.to_be_bytes());
        self.send(b'K', &body);
    }

    pub fn ready(&mut self) {
        self.send(b'Z', b"I");
    }

    pub fn parse_complete(&mut self) {
        self.send(b'1', &[]);
    }

    pub fn bind_complete(&mut self) {
        self.send(b'2', &[]);
    }

    pub fn close_complete(&mut self) {
        self.send(b'3', &[]);
    }

    pub fn no_data(&mut self) {
        self.send(b'n', &[]);
    }

    pub fn parameter_description(&mut self, oids: &[u32]) {
        let mut body = (oids.len() as i16).to_be_bytes().to_vec();
        for oid in oids {
            body.extend_from_slice(&oid.to_be_bytes());
        }
        self.send(b't', &body);
    }

    pub fn row_description(&mut self, columns: &[(&str, u32)]) {
        let mut body = (columns.len() as i16).to_be_bytes().to_vec();
        for (name, oid) in columns {
            push_cstr(&mut body, name);
            body.extend_from_slice(&0_u32.to_be_bytes());
            body.extend_from_slice(&0_i16.to_be_bytes());
            body.extend_from_slice(&oid.to_be_bytes());
            body.extend_from_slice(&(-1_i16).to_be_bytes());
            body.extend_from_slice(&(-1_i32).to_be_bytes());
            body.extend_from_slice(&0_i16.to_be_bytes());
        }
        self.send(b'T', &body);
    }

    pub fn data_row(&mut self, values: &[Option<&[u8]>]) {
        let mut body = (values.len() as i16).to_be_bytes().to_vec();
        for value in values {
            match value {
                Some(bytes) => {
                    body.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    body.extend_from_slice(bytes);
                }
                None => body.extend_from_slice(&(-1_i32).to_be_bytes()),
            }
        }
        self.send(b'D', &body);
    }

    pub fn command_complete(&mut self, tag: &str) {
        let mut body = Vec::new();
        push_cstr(&mut body, tag);
        self.send(b'C', &body);
    }

    pub fn error_response(&mut self, code: &str, message: &str) {
        self.send(b'E', &fields("ERROR", code, message));
    }

    pub fn notice_response(&mut self, code: &str, message: &str) {
        self.send(b'N', &fields("NOTICE", code, message));
    }
}

fn fields(severity: &str, code: &str, message: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (tag, value) in [(b'S', severity), (b'V', severity), (b'C', code), (b'M', message)] {
        body.push(tag);
        push_cstr(&mut body, value);
    }
    body.push(0);
    body
}

fn push_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}
