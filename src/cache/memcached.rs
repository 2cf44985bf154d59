//! Blocking memcached text-protocol client.
//!
//! Speaks the subset of the protocol the store needs:
//!
//! ```text
//! get <key>\r\n                         -> VALUE <key> <flags> <len>\r\n<data>\r\nEND\r\n | END\r\n
//! add|set <key> 0 0 <len>\r\n<data>\r\n -> STORED\r\n | NOT_STORED\r\n
//! stats\r\n                             -> (STAT <name> <value>\r\n)* END\r\n
//! flush_all\r\n                         -> OK\r\n
//! ```
//!
//! Any reply may instead be `ERROR`, `CLIENT_ERROR <msg>` or `SERVER_ERROR <msg>`.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, warn};

use super::{CacheClient, CacheStats, MAX_VALUE_SIZE, check_key};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// A single-connection memcached client.
///
/// The connection is opened on first use and reopened after any transport or
/// protocol error, since the stream position is unknown at that point.
/// Requests are serialized on an internal mutex.
#[derive(Debug)]
pub struct MemcachedClient {
    config: CacheConfig,
    conn: Mutex<Option<Connection>>,
}

#[derive(Debug)]
struct Connection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Connection {
    fn open(config: &CacheConfig) -> io::Result<Self> {
        let mut last_err = None;
        for addr in config.addr().to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, config.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(config.timeout))?;
                    stream.set_write_timeout(Some(config.timeout))?;
                    stream.set_nodelay(true)?;
                    let writer = BufWriter::new(stream.try_clone()?);
                    debug!(%addr, "connected to memcached");
                    return Ok(Self {
                        reader: BufReader::new(stream),
                        writer,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "cache address did not resolve")
        }))
    }

    fn send(&mut self, parts: &[&[u8]]) -> Result<(), CacheError> {
        for part in parts {
            self.writer.write_all(part)?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Reads one reply line without its `\r\n`, turning error replies into errors.
    fn read_line(&mut self) -> Result<String, CacheError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(CacheError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "memcached closed the connection",
            )));
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();

        if line == "ERROR" {
            return Err(CacheError::Client("unknown command".into()));
        }
        if let Some(msg) = line.strip_prefix("CLIENT_ERROR ") {
            return Err(CacheError::Client(msg.to_string()));
        }
        if let Some(msg) = line.strip_prefix("SERVER_ERROR ") {
            return Err(CacheError::Server(msg.to_string()));
        }
        Ok(line)
    }

    fn read_block(&mut self, len: usize) -> Result<Bytes, CacheError> {
        let total = len
            .checked_add(2)
            .ok_or_else(|| CacheError::Protocol(format!("value length {len} out of range")))?;
        let mut buf = vec![0u8; total];
        self.reader.read_exact(&mut buf)?;
        if !buf.ends_with(b"\r\n") {
            return Err(CacheError::Protocol("data block not terminated".into()));
        }
        buf.truncate(len);
        Ok(Bytes::from(buf))
    }

    fn storage(&mut self, cmd: &str, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        let header = format!("{cmd} {key} 0 0 {}\r\n", value.len());
        self.send(&[header.as_bytes(), value, b"\r\n"])?;
        match self.read_line()?.as_str() {
            "STORED" => Ok(true),
            "NOT_STORED" => Ok(false),
            other => Err(unexpected(other)),
        }
    }
}

impl MemcachedClient {
    /// Creates a client. No connection is made until the first request.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Creates a client and connects immediately.
    pub fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        let conn = Connection::open(&config)?;
        Ok(Self {
            config,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => Connection::open(&self.config)?,
        };

        let result = op(&mut conn);
        match &result {
            Err(e @ (CacheError::Io(_) | CacheError::Timeout | CacheError::Protocol(_))) => {
                warn!(addr = %self.config.addr(), error = %e, "dropping memcached connection");
            }
            _ => *guard = Some(conn),
        }
        result
    }
}

fn valid_key(key: &str) -> Result<(), CacheError> {
    check_key(key).map_err(|e| CacheError::Client(e.to_string()))
}

fn unexpected(line: &str) -> CacheError {
    CacheError::Protocol(format!("unexpected reply {line:?}"))
}

fn parse_value_header(line: &str, key: &str) -> Result<usize, CacheError> {
    let mut parts = line.split(' ');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("VALUE"), Some(k), Some(_flags), Some(len)) if k == key => {
            let len: usize = len.parse().map_err(|_| unexpected(line))?;
            if len > MAX_VALUE_SIZE {
                return Err(CacheError::Protocol(format!(
                    "value of {len} bytes exceeds the item ceiling"
                )));
            }
            Ok(len)
        }
        _ => Err(unexpected(line)),
    }
}

impl CacheClient for MemcachedClient {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        valid_key(key)?;
        self.with_conn(|conn| {
            conn.send(&[b"get ", key.as_bytes(), b"\r\n"])?;
            let line = conn.read_line()?;
            if line == "END" {
                return Ok(None);
            }
            let len = parse_value_header(&line, key)?;
            let value = conn.read_block(len)?;
            match conn.read_line()?.as_str() {
                "END" => Ok(Some(value)),
                other => Err(unexpected(other)),
            }
        })
    }

    fn add(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        valid_key(key)?;
        self.with_conn(|conn| conn.storage("add", key, value))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        valid_key(key)?;
        self.with_conn(|conn| match conn.storage("set", key, value)? {
            true => Ok(()),
            false => Err(CacheError::Protocol("set was not stored".into())),
        })
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        self.with_conn(|conn| {
            conn.send(&[b"stats\r\n"])?;
            let mut stats = CacheStats::default();
            loop {
                let line = conn.read_line()?;
                if line == "END" {
                    return Ok(stats);
                }
                let mut parts = line.splitn(3, ' ');
                let (Some("STAT"), Some(name), Some(value)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(unexpected(&line));
                };
                let field = match name {
                    "evictions" => &mut stats.evictions,
                    "curr_items" => &mut stats.curr_items,
                    "bytes" => &mut stats.bytes,
                    "limit_maxbytes" => &mut stats.limit_maxbytes,
                    _ => continue,
                };
                *field = value.parse().map_err(|_| unexpected(&line))?;
            }
        })
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        self.with_conn(|conn| {
            conn.send(&[b"flush_all\r\n"])?;
            match conn.read_line()?.as_str() {
                "OK" => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }
}
