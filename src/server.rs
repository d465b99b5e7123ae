//! 一个最小的阻塞式 HTTP/1.1 服务, 每个连接一个线程, 每次响应之后关闭连接.
//!
//! 只处理 `POST /parse` 和 `GET /example` 两个路由.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    limits::Limits,
    service::{ParseRequest, ParseResponse, example, handle_parse},
};

/// 请求体的大小上限.
pub const MAX_BODY: usize = 1 << 20;
const MAX_HEADERS: usize = 64;
const MAX_LINE: u64 = 8 * 1024;
/// 连接上读写的默认超时.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// 同时处理的连接数的默认上限.
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error("Malformed request: {0}.")]
    Malformed(&'static str),
    #[error("Request body larger than {MAX_BODY} bytes.")]
    TooLarge,
    #[error("Timed out waiting for the request.")]
    Timeout,
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::InvalidData => Self::Malformed("request head is not UTF-8"),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// 去掉查询字符串之后的路径.
    pub path: String,
    /// 头部名称统一为小写.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    fn json(status: u16, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, e),
        }
    }

    fn error(status: u16, error: impl ToString) -> Self {
        let body = serde_json::json!({ "success": false, "error": error.to_string() });
        Self {
            status,
            body: body.to_string(),
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            408 => "Request Timeout",
            413 => "Payload Too Large",
            503 => "Service Unavailable",
            _ => "Internal Server Error",
        }
    }

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        write!(
            w,
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason(),
            self.body.len(),
            self.body
        )?;
        w.flush()
    }
}

fn read_line(reader: &mut impl BufRead) -> Result<String, RequestError> {
    let mut line = String::new();
    let n = reader.by_ref().take(MAX_LINE).read_line(&mut line)?;
    if n == 0 {
        return Err(RequestError::Malformed("unexpected end of request"));
    }
    if !line.ends_with('\n') {
        return Err(RequestError::Malformed("line too long"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// 读取一个请求: 请求行, 头部和由 `Content-Length` 指定长度的请求体.
pub fn read_request(reader: &mut impl BufRead) -> Result<Request, RequestError> {
    let request_line = read_line(reader)?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RequestError::Malformed("bad request line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(RequestError::Malformed("unsupported HTTP version"));
    }
    let path = target.split_once('?').map_or(target, |(p, _)| p).to_string();

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(RequestError::Malformed("too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(RequestError::Malformed("bad header line"))?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }
    let mut request = Request {
        method: method.to_string(),
        path,
        headers,
        body: Vec::new(),
    };
    if request.header("transfer-encoding").is_some() {
        return Err(RequestError::Malformed("chunked bodies are not supported"));
    }
    let len = match request.header("content-length") {
        Some(len) => len
            .parse::<usize>()
            .map_err(|_| RequestError::Malformed("bad content length"))?,
        None => 0,
    };
    if len > MAX_BODY {
        return Err(RequestError::TooLarge);
    }
    request.body.resize(len, 0);
    reader.read_exact(&mut request.body)?;
    Ok(request)
}

fn hex(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

/// 解码 `application/x-www-form-urlencoded` 中的一个值.
pub fn url_decode(s: &str) -> Option<String> {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = hex(bytes.next()?)?;
                let lo = hex(bytes.next()?)?;
                out.push((hi << 4) | lo);
            }
            _ => out.push(b),
        }
    }
    String::from_utf8(out).ok()
}

fn form_value(body: &str, key: &str) -> Result<Option<String>, RequestError> {
    for pair in body.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if url_decode(k).as_deref() == Some(key) {
            return url_decode(v)
                .map(Some)
                .ok_or(RequestError::Malformed("bad form encoding"));
        }
    }
    Ok(None)
}

/// 从请求体中取出文法文本, JSON 或者表单编码.
fn grammar_of(req: &Request) -> Result<String, RequestError> {
    let body =
        std::str::from_utf8(&req.body).map_err(|_| RequestError::Malformed("body is not UTF-8"))?;
    let is_json = req
        .header("content-type")
        .is_some_and(|ct| ct.starts_with("application/json"));
    if is_json {
        let parsed: ParseRequest =
            serde_json::from_str(body).map_err(|_| RequestError::Malformed("bad JSON body"))?;
        Ok(parsed.grammar)
    } else {
        Ok(form_value(body, "grammar")?.unwrap_or_default())
    }
}

pub fn route(req: &Request, limits: &Limits) -> Response {
    match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/parse") => match grammar_of(req) {
            Ok(grammar) => Response::json(200, &handle_parse(&grammar, limits)),
            Err(e) => Response::json(400, &ParseResponse::failure(e)),
        },
        ("GET", "/example") => Response::json(200, &example()),
        (method, path) => Response::error(404, format!("no route for {method} {path}")),
    }
}

fn handle_connection(stream: TcpStream, limits: &Limits) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let response = match read_request(&mut reader) {
        Ok(req) => {
            debug!("{} {}", req.method, req.path);
            route(&req, limits)
        }
        Err(RequestError::Io(e)) => return Err(e),
        Err(e @ RequestError::TooLarge) => Response::error(413, e),
        Err(e @ RequestError::Timeout) => Response::error(408, e),
        Err(e) => Response::error(400, e),
    };
    debug!(status = response.status, "respond");
    let mut stream = stream;
    response.write_to(&mut stream)
}

/// 连接结束时归还名额.
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct Server {
    listener: TcpListener,
    limits: Limits,
    timeout: Duration,
    max_connections: usize,
    active: Arc<AtomicUsize>,
}

impl Server {
    pub fn bind(addr: impl ToSocketAddrs, limits: Limits) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            limits,
            timeout: DEFAULT_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 设置连接上读写的超时, 空闲的客户端在超时后收到 408 并被断开.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置同时处理的连接数上限, 超出的连接直接收到 503.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    fn acquire(&self) -> Option<Slot> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_connections).then_some(n + 1)
            })
            .ok()
            .map(|_| Slot(Arc::clone(&self.active)))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 一直接受连接, 直到监听出错.
    pub fn run(self) -> io::Result<()> {
        info!("listening on {}", self.local_addr()?);
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };
            let peer = stream.peer_addr().ok();
            if let Err(e) = stream
                .set_read_timeout(Some(self.timeout))
                .and_then(|()| stream.set_write_timeout(Some(self.timeout)))
            {
                warn!(?peer, "cannot set timeouts: {e}");
                continue;
            }
            let Some(slot) = self.acquire() else {
                warn!(?peer, "too many connections");
                let mut stream = stream;
                let _ = Response::error(503, "too many connections").write_to(&mut stream);
                continue;
            };
            let limits = self.limits.clone();
            thread::spawn(move || {
                let _slot = slot;
                if let Err(e) = handle_connection(stream, &limits) {
                    warn!(?peer, "connection failed: {e}");
                }
            });
        }
        Ok(())
    }
}
