//! Blocking wire session.
//!
//! One [`Session`] owns the socket to one server process. Messages are
//! encoded and decoded with `postgres-protocol`; everything else (startup,
//! authentication, the extended-query flow and draining) happens here.
//!
//! At most one prepared statement may have results in flight. Any other
//! command issued while a stream is open fails with [`PgError::Busy`] until
//! the stream is read to the end or drained. Closing a statement is the
//! exception: the Close is queued and sent before the next command.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::ops::Range;

use bytes::BytesMut;
use fallible_iterator::FallibleIterator;
use postgres_protocol::IsNull;
use postgres_protocol::authentication::{self, sasl};
use postgres_protocol::message::backend::{
    AuthenticationSaslBody, DataRowBody, ErrorFields, Message,
};
use postgres_protocol::message::frontend::{self, BindError};
use tracing::{debug, trace, warn};

use crate::config::{Address, PgConfig};
use crate::conversions::ParamSlot;
use crate::error::{PgError, PgResult};
use crate::oid::Oid;

const READ_CHUNK: usize = 8 * 1024;

/// A result column reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Column name.
    pub name: String,
    /// Type OID.
    pub oid: Oid,
}

/// One row read off the socket.
pub struct DataRow {
    body: DataRowBody,
    ranges: Vec<Option<Range<usize>>>,
}

impl std::fmt::Debug for DataRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRow")
            .field("ranges", &self.ranges)
            .finish()
    }
}

impl DataRow {
    fn new(body: DataRowBody) -> PgResult<Self> {
        let ranges = body.ranges().collect()?;
        Ok(Self { body, ranges })
    }

    /// Number of values in the row.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the row has no values.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Raw value of a column; `None` for SQL NULL or an out-of-range index.
    pub fn value(&self, column: usize) -> Option<&[u8]> {
        let range = self.ranges.get(column)?.clone()?;
        self.body.buffer().get(range)
    }
}

enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Self::Unix(s) => s.flush(),
        }
    }
}

/// A blocking session with one server process.
pub struct Session {
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,
    parameters: HashMap<String, String>,
    backend_key: Option<(i32, i32)>,
    transaction_status: u8,
    in_flight: Option<String>,
    pending_closes: Vec<String>,
    command_rows: u64,
    last_change_count: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend_key", &self.backend_key)
            .field("transaction_status", &(self.transaction_status as char))
            .field("in_flight", &self.in_flight)
            .field("pending_closes", &self.pending_closes)
            .finish()
    }
}

impl Session {
    /// Connect, authenticate and wait until the server is ready for queries.
    pub fn connect(config: &PgConfig) -> PgResult<Self> {
        config.validate()?;

        let socket = open_socket(config)?;
        let mut session = Self {
            socket,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::new(),
            parameters: HashMap::new(),
            backend_key: None,
            transaction_status: b'I',
            in_flight: None,
            pending_closes: Vec::new(),
            command_rows: 0,
            last_change_count: 0,
        };
        session.startup(config)?;

        debug!(
            address = ?config.address(),
            user = %config.user(),
            dbname = %config.dbname(),
            "Connected to PostgreSQL"
        );
        Ok(session)
    }

    /// A server parameter reported at startup, e.g. `server_version`.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Process id and secret key of the server process.
    pub fn backend_key(&self) -> Option<(i32, i32)> {
        self.backend_key
    }

    /// Transaction status from the last ReadyForQuery: `I`, `T` or `E`.
    pub fn transaction_status(&self) -> u8 {
        self.transaction_status
    }

    /// Rows affected by the last command recorded as a change.
    ///
    /// Set by [`Session::simple_query`] and [`Session::record_change_count`];
    /// streamed results leave it alone.
    pub fn last_change_count(&self) -> u64 {
        self.last_change_count
    }

    /// Record the affected-row count of a statement run on behalf of the application.
    pub fn record_change_count(&mut self, count: u64) {
        self.last_change_count = count;
    }

    /// Rows reported by the CommandComplete of the most recent extended-query stream.
    pub fn command_rows(&self) -> u64 {
        self.command_rows
    }

    /// Name of the statement whose results are being streamed.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Fail if another statement's results are still pending.
    pub fn ensure_idle(&self) -> PgResult<()> {
        match &self.in_flight {
            Some(name) => Err(PgError::Busy(name.clone())),
            None => Ok(()),
        }
    }

    /// Check the session is idle and send any queued Close messages.
    fn begin_command(&mut self) -> PgResult<()> {
        self.ensure_idle()?;
        for name in std::mem::take(&mut self.pending_closes) {
            self.send_close(&name)?;
        }
        Ok(())
    }

    /// Parse and describe a named statement.
    pub fn prepare(&mut self, name: &str, sql: &str) -> PgResult<(Vec<Oid>, Vec<ColumnDesc>)> {
        self.begin_command()?;
        trace!(name = %name, sql = %sql, "Parse/Describe");

        frontend::parse(name, sql, std::iter::empty(), &mut self.write_buf)?;
        frontend::describe(b'S', name, &mut self.write_buf)?;
        frontend::sync(&mut self.write_buf);
        self.send()?;

        let mut params = Vec::new();
        let mut columns = Vec::new();
        self.read_until_ready(|message| {
            match message {
                Message::ParseComplete | Message::NoData => {}
                Message::ParameterDescription(body) => {
                    params = body.parameters().collect()?;
                }
                Message::RowDescription(body) => {
                    columns = body
                        .fields()
                        .map(|field| {
                            Ok(ColumnDesc {
                                name: field.name().to_string(),
                                oid: field.type_oid(),
                            })
                        })
                        .collect()?;
                }
                _ => return Err(unexpected("prepare")),
            }
            Ok(())
        })?;

        Ok((params, columns))
    }

    /// Bind parameters to the unnamed portal and execute it.
    ///
    /// The statement becomes the one in flight; read its rows with
    /// [`Session::next_row`] or discard them with [`Session::drain`].
    pub fn start(&mut self, name: &str, params: &[ParamSlot], result_formats: &[i16]) -> PgResult<()> {
        self.begin_command()?;
        trace!(name = %name, params = params.len(), "Bind/Execute");

        frontend::bind(
            "",
            name,
            params.iter().map(|p| p.format),
            params,
            |param, buf| match &param.buffer {
                Some(value) => {
                    buf.extend_from_slice(value);
                    Ok(IsNull::No)
                }
                None => Ok(IsNull::Yes),
            },
            result_formats.iter().copied(),
            &mut self.write_buf,
        )
        .map_err(|e| match e {
            BindError::Conversion(e) => PgError::protocol(e.to_string()),
            BindError::Serialization(e) => PgError::Io(e),
        })?;
        frontend::execute("", 0, &mut self.write_buf)?;
        frontend::sync(&mut self.write_buf);
        self.send()?;

        self.command_rows = 0;
        self.in_flight = Some(name.to_string());
        Ok(())
    }

    /// Read the next row of the statement in flight.
    ///
    /// Returns `None` once the command completes; the session is then idle.
    pub fn next_row(&mut self) -> PgResult<Option<DataRow>> {
        if self.in_flight.is_none() {
            return Ok(None);
        }

        loop {
            match self.read_message()? {
                Message::BindComplete => {}
                Message::DataRow(body) => return DataRow::new(body).map(Some),
                Message::CommandComplete(body) => {
                    self.command_rows = affected_rows(body.tag()?);
                    self.finish_stream()?;
                    return Ok(None);
                }
                Message::EmptyQueryResponse | Message::PortalSuspended => {
                    self.finish_stream()?;
                    return Ok(None);
                }
                Message::ErrorResponse(body) => {
                    let err = server_error(body.fields());
                    self.drain()?;
                    return Err(err);
                }
                Message::ReadyForQuery(body) => {
                    self.transaction_status = body.status();
                    self.in_flight = None;
                    return Ok(None);
                }
                _ => {
                    self.drain()?;
                    return Err(unexpected("row stream"));
                }
            }
        }
    }

    /// Execute a prepared statement to completion, discarding rows.
    ///
    /// Returns the affected-row count without recording it.
    pub fn run(&mut self, name: &str, params: &[ParamSlot], result_formats: &[i16]) -> PgResult<u64> {
        self.start(name, params, result_formats)?;
        while self.next_row()?.is_some() {}
        Ok(self.command_rows)
    }

    /// Discard everything up to ReadyForQuery for the statement in flight.
    pub fn drain(&mut self) -> PgResult<()> {
        if let Some(name) = self.in_flight.take() {
            trace!(name = %name, "Draining pending results");
            if let Err(err) = self.read_until_ready(|_| Ok(())) {
                if err.is_connection_error() {
                    return Err(err);
                }
                debug!(error = %err, "Discarded error while draining");
            }
        }
        Ok(())
    }

    /// Deallocate a named statement.
    ///
    /// While another statement is streaming the Close is queued and sent
    /// ahead of the next command.
    pub fn close_statement(&mut self, name: &str) -> PgResult<()> {
        if let Some(busy) = &self.in_flight {
            trace!(name = %name, in_flight = %busy, "Deferring Close");
            self.pending_closes.push(name.to_string());
            return Ok(());
        }
        self.begin_command()?;
        self.send_close(name)
    }

    fn send_close(&mut self, name: &str) -> PgResult<()> {
        trace!(name = %name, "Close");

        frontend::close(b'S', name, &mut self.write_buf)?;
        frontend::sync(&mut self.write_buf);
        self.send()?;

        self.read_until_ready(|message| match message {
            Message::CloseComplete => Ok(()),
            _ => Err(unexpected("close")),
        })
    }

    /// Run SQL through the simple-query protocol, discarding any rows.
    pub fn simple_query(&mut self, sql: &str) -> PgResult<()> {
        self.begin_command()?;
        trace!(sql = %sql, "Query");

        frontend::query(sql, &mut self.write_buf)?;
        self.send()?;

        let mut changes = None;
        self.read_until_ready(|message| {
            if let Message::CommandComplete(body) = message {
                changes = Some(affected_rows(body.tag()?));
            }
            Ok(())
        })?;

        if let Some(changes) = changes {
            self.last_change_count = changes;
        }
        Ok(())
    }

    /// Say goodbye to the server. Errors are ignored; the socket is closed on drop.
    pub fn terminate(mut self) {
        frontend::terminate(&mut self.write_buf);
        if let Err(err) = self.send() {
            debug!(error = %err, "Failed to send Terminate");
        }
    }

    fn startup(&mut self, config: &PgConfig) -> PgResult<()> {
        frontend::startup_message(config.startup_params(), &mut self.write_buf)?;
        self.send()?;

        loop {
            match self.read_message()? {
                Message::AuthenticationOk => break,
                Message::AuthenticationCleartextPassword => {
                    frontend::password_message(password(config)?, &mut self.write_buf)?;
                    self.send()?;
                }
                Message::AuthenticationMd5Password(body) => {
                    let hash = authentication::md5_hash(
                        config.user().as_bytes(),
                        password(config)?,
                        body.salt(),
                    );
                    frontend::password_message(hash.as_bytes(), &mut self.write_buf)?;
                    self.send()?;
                }
                Message::AuthenticationSasl(body) => {
                    self.authenticate_sasl(&body, password(config)?)?;
                }
                Message::ErrorResponse(body) => return Err(server_error(body.fields())),
                _ => {
                    return Err(PgError::connection(
                        "server requested an unsupported authentication method",
                    ));
                }
            }
        }

        let mut backend_key = None;
        self.read_until_ready(|message| match message {
            Message::BackendKeyData(body) => {
                backend_key = Some((body.process_id(), body.secret_key()));
                Ok(())
            }
            _ => Err(unexpected("startup")),
        })?;
        self.backend_key = backend_key;
        Ok(())
    }

    fn authenticate_sasl(&mut self, body: &AuthenticationSaslBody, password: &[u8]) -> PgResult<()> {
        let mut mechanisms = body.mechanisms();
        let mut has_scram = false;
        while let Some(mechanism) = mechanisms.next()? {
            has_scram |= mechanism == sasl::SCRAM_SHA_256;
        }
        if !has_scram {
            return Err(PgError::connection(
                "server requires an unsupported SASL mechanism",
            ));
        }

        let mut scram = sasl::ScramSha256::new(password, sasl::ChannelBinding::unsupported());
        frontend::sasl_initial_response(sasl::SCRAM_SHA_256, scram.message(), &mut self.write_buf)?;
        self.send()?;

        match self.read_message()? {
            Message::AuthenticationSaslContinue(body) => scram.update(body.data())?,
            Message::ErrorResponse(body) => return Err(server_error(body.fields())),
            _ => return Err(unexpected("SASL exchange")),
        }

        frontend::sasl_response(scram.message(), &mut self.write_buf)?;
        self.send()?;

        match self.read_message()? {
            Message::AuthenticationSaslFinal(body) => scram.finish(body.data())?,
            Message::ErrorResponse(body) => return Err(server_error(body.fields())),
            _ => return Err(unexpected("SASL exchange")),
        }
        Ok(())
    }

    fn finish_stream(&mut self) -> PgResult<()> {
        let result = self.read_until_ready(|_| Ok(()));
        self.in_flight = None;
        result
    }

    /// Read messages up to ReadyForQuery, handing the others to `handle`.
    ///
    /// The first ErrorResponse (or handler error) is returned once the
    /// server is ready again. Socket errors return immediately.
    fn read_until_ready<F>(&mut self, mut handle: F) -> PgResult<()>
    where
        F: FnMut(Message) -> PgResult<()>,
    {
        let mut error = None;
        loop {
            match self.read_message()? {
                Message::ReadyForQuery(body) => {
                    self.transaction_status = body.status();
                    break;
                }
                Message::ErrorResponse(body) => {
                    let err = server_error(body.fields());
                    error.get_or_insert(err);
                }
                message => {
                    if let Err(err) = handle(message) {
                        if err.is_connection_error() && !matches!(err, PgError::Protocol(_)) {
                            return Err(err);
                        }
                        error.get_or_insert(err);
                    }
                }
            }
        }
        error.map_or(Ok(()), Err)
    }

    /// Read one message, handling asynchronous ones on the way.
    fn read_message(&mut self) -> PgResult<Message> {
        loop {
            match Message::parse(&mut self.read_buf)? {
                Some(Message::NoticeResponse(body)) => {
                    if let PgError::Server {
                        severity,
                        code,
                        message,
                        ..
                    } = server_error(body.fields())
                    {
                        warn!(severity = %severity, code = %code, "{}", message);
                    }
                }
                Some(Message::ParameterStatus(body)) => {
                    let name = body.name()?.to_string();
                    let value = body.value()?.to_string();
                    trace!(name = %name, value = %value, "ParameterStatus");
                    self.parameters.insert(name, value);
                }
                Some(Message::NotificationResponse(body)) => {
                    debug!(channel = %body.channel()?, "Ignoring notification");
                }
                Some(message) => return Ok(message),
                None => self.fill()?,
            }
        }
    }

    fn fill(&mut self) -> PgResult<()> {
        let mut chunk = [0_u8; READ_CHUNK];
        let n = self.socket.read(&mut chunk)?;
        if n == 0 {
            return Err(PgError::connection("server closed the connection unexpectedly"));
        }
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    fn send(&mut self) -> PgResult<()> {
        let result = self
            .socket
            .write_all(&self.write_buf)
            .and_then(|()| self.socket.flush());
        self.write_buf.clear();
        Ok(result?)
    }
}

fn open_socket(config: &PgConfig) -> PgResult<Socket> {
    match config.address() {
        Address::Tcp(host, port) => {
            let connect_err = |e: std::io::Error| {
                PgError::connection(format!(
                    "could not connect to server at \"{}\", port {}: {}",
                    host, port, e
                ))
            };

            let stream = match config.connect_timeout {
                Some(timeout) => {
                    let mut last_err = None;
                    let mut stream = None;
                    for addr in (host.as_str(), port).to_socket_addrs().map_err(connect_err)? {
                        match TcpStream::connect_timeout(&addr, timeout) {
                            Ok(s) => {
                                stream = Some(s);
                                break;
                            }
                            Err(e) => last_err = Some(e),
                        }
                    }
                    match (stream, last_err) {
                        (Some(s), _) => s,
                        (None, Some(e)) => return Err(connect_err(e)),
                        (None, None) => {
                            return Err(PgError::connection(format!(
                                "could not resolve host \"{}\"",
                                host
                            )));
                        }
                    }
                }
                None => TcpStream::connect((host.as_str(), port)).map_err(connect_err)?,
            };
            stream.set_nodelay(true)?;
            Ok(Socket::Tcp(stream))
        }
        #[cfg(unix)]
        Address::Unix(path) => {
            let stream = UnixStream::connect(&path).map_err(|e| {
                PgError::connection(format!(
                    "could not connect to server on socket \"{}\": {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(Socket::Unix(stream))
        }
        #[cfg(not(unix))]
        Address::Unix(path) => Err(PgError::config(format!(
            "Unix domain sockets are not supported on this platform: {}",
            path.display()
        ))),
    }
}

fn password(config: &PgConfig) -> PgResult<&[u8]> {
    config
        .password
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| PgError::connection("password authentication requested but no password supplied"))
}

/// Build an error from ErrorResponse/NoticeResponse fields.
fn server_error(mut fields: ErrorFields<'_>) -> PgError {
    let mut severity = String::new();
    let mut code = String::new();
    let mut message = String::new();
    let mut detail = None;

    loop {
        match fields.next() {
            Ok(Some(field)) => {
                let value = String::from_utf8_lossy(field.value_bytes()).into_owned();
                match field.type_() {
                    b'S' => severity = value,
                    b'C' => code = value,
                    b'M' => message = value,
                    b'D' => detail = Some(value),
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => return PgError::Io(e),
        }
    }

    PgError::Server {
        severity,
        code,
        message,
        detail,
    }
}

fn unexpected(context: &str) -> PgError {
    PgError::protocol(format!("unexpected message during {}", context))
}

/// Row count from a CommandComplete tag such as `INSERT 0 1` or `UPDATE 3`.
pub fn affected_rows(tag: &str) -> u64 {
    tag.rsplit(' ')
        .next()
        .and_then(|count| count.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_rows() {
        assert_eq!(affected_rows("INSERT 0 1"), 1);
        assert_eq!(affected_rows("UPDATE 3"), 3);
        assert_eq!(affected_rows("DELETE 0"), 0);
        assert_eq!(affected_rows("SELECT 12"), 12);
        assert_eq!(affected_rows("CREATE TABLE"), 0);
        assert_eq!(affected_rows("BEGIN"), 0);
    }

    #[test]
    fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = PgConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .unwrap();
        let err = Session::connect(&config).unwrap_err();
        assert!(err.is_connection_error());
        assert!(err.to_string().contains("could not connect"));
    }

    #[test]
    fn test_tls_modes_rejected_before_connecting() {
        let config = PgConfig::parse("host=127.0.0.1 port=1 sslmode=verify-full").unwrap();
        assert!(matches!(Session::connect(&config), Err(PgError::Config(_))));
    }
}
