//! LSL-compatible network transport.
//!
//! Discovery: a `LSL:shortinfo` query is sent to the LSL multicast group and
//! outlets answer with `LSL:shortinfo {json}`. Data: on connect the outlet
//! writes `LSL:streaminfo/<len>:` followed by `<len>` bytes of JSON stream
//! info, then a sequence of packets `[f64 LE timestamp][f32 LE × channels]`.

use crate::error::{StreamError, StreamResult};
use crate::inlet::{Chunk, StreamInfo, StreamInlet, StreamResolver};
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

/// Default multicast address for LSL discovery
pub const LSL_MULTICAST_ADDR: &str = "224.0.0.183";

/// Default multicast port
pub const LSL_MULTICAST_PORT: u16 = 16571;

const QUERY: &str = "LSL:shortinfo";
const INFO_PREFIX: &str = "LSL:streaminfo/";
const MAX_HEADER_LEN: usize = 64 * 1024;

fn packet_len(channels: usize) -> usize {
    8 + 4 * channels
}

/// Replies to a discovery query from `from`. Returns whether a reply went
/// out; a failed send is logged and leaves the outlet serviceable.
fn answer_query(
    socket: &UdpSocket,
    query: &[u8],
    info: &StreamInfo,
    from: SocketAddr,
) -> StreamResult<bool> {
    if !query.starts_with(QUERY.as_bytes()) {
        return Ok(false);
    }
    let body = serde_json::to_string(info).map_err(|e| StreamError::InvalidInfo(e.to_string()))?;
    match socket.send_to(format!("{QUERY} {body}").as_bytes(), from) {
        Ok(_) => Ok(true),
        Err(err) => {
            tracing::debug!(%from, %err, "discovery reply not sent");
            Ok(false)
        }
    }
}

/// Data sender used by acquisition bridges and loopback tests.
pub struct TcpOutlet {
    info: StreamInfo,
    listener: TcpListener,
    discovery: Option<UdpSocket>,
    clients: Vec<TcpStream>,
    start: Instant,
}

impl TcpOutlet {
    /// Binds the data listener on `addr`. The advertised port is filled in
    /// from the bound socket.
    pub fn bind(mut info: StreamInfo, addr: SocketAddr) -> StreamResult<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info.port = listener.local_addr()?.port();
        Ok(Self {
            info,
            listener,
            discovery: None,
            clients: Vec::new(),
            start: Instant::now(),
        })
    }

    /// Joins the discovery group so resolvers on the network can find this
    /// outlet.
    pub fn advertise(&mut self) -> StreamResult<()> {
        let socket = UdpSocket::bind(("0.0.0.0", LSL_MULTICAST_PORT))?;
        let group = LSL_MULTICAST_ADDR
            .parse()
            .map_err(|_| StreamError::InvalidInfo("invalid multicast address".into()))?;
        socket.join_multicast_v4(&group, &"0.0.0.0".parse().map_err(|_| {
            StreamError::InvalidInfo("invalid interface address".into())
        })?)?;
        socket.set_nonblocking(true)?;
        self.discovery = Some(socket);
        Ok(())
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn local_clock(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Answers pending discovery queries and accepts pending connections.
    pub fn service(&mut self) -> StreamResult<()> {
        if let Some(socket) = &self.discovery {
            let mut buf = [0u8; 1024];
            loop {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        answer_query(socket, &buf[..len], &self.info, from)?;
                    }
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    stream.set_nodelay(true)?;
                    let body = serde_json::to_string(&self.info)
                        .map_err(|e| StreamError::InvalidInfo(e.to_string()))?;
                    stream.write_all(format!("{INFO_PREFIX}{}:", body.len()).as_bytes())?;
                    stream.write_all(body.as_bytes())?;
                    tracing::debug!(%addr, "inlet connected");
                    self.clients.push(stream);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn push_sample(&mut self, data: &[f32], timestamp: f64) -> StreamResult<()> {
        if data.len() != self.info.channel_count {
            return Err(StreamError::InvalidInfo(format!(
                "expected {} channels, got {}",
                self.info.channel_count,
                data.len()
            )));
        }
        self.service()?;

        let mut packet = Vec::with_capacity(packet_len(data.len()));
        packet.extend_from_slice(&timestamp.to_le_bytes());
        for value in data {
            packet.extend_from_slice(&value.to_le_bytes());
        }
        self.clients
            .retain_mut(|client| client.write_all(&packet).is_ok());
        Ok(())
    }
}

/// Data receiver. Reads are non-blocking; partial packets are carried over
/// to the next pull.
pub struct TcpInlet {
    info: StreamInfo,
    stream: TcpStream,
    carry: Vec<u8>,
    last_timestamp: Option<f64>,
    clock: Instant,
    closed: bool,
}

impl TcpInlet {
    pub fn connect(addr: SocketAddr, timeout: Duration) -> StreamResult<Self> {
        let mut stream = TcpStream::connect_timeout(&addr, timeout.max(Duration::from_millis(1)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        let (info, carry) = read_header(&mut stream)?;
        stream.set_nonblocking(true)?;
        tracing::info!(
            name = %info.name,
            channels = info.channel_count,
            srate = info.nominal_srate,
            %addr,
            "connected to stream"
        );
        Ok(Self {
            info,
            stream,
            carry,
            last_timestamp: None,
            clock: Instant::now(),
            closed: false,
        })
    }

    fn local_clock(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    fn fill(&mut self) -> StreamResult<()> {
        let mut buf = [0u8; 64 * 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    self.closed = true;
                    return Ok(());
                }
                Ok(n) => self.carry.extend_from_slice(&buf[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn decode(&mut self, max_samples: usize) -> Chunk {
        let channels = self.info.channel_count;
        let len = packet_len(channels);
        let n = (self.carry.len() / len).min(max_samples);
        let mut chunk = Chunk::default();
        for packet in self.carry[..n * len].chunks_exact(len) {
            let mut ts = [0u8; 8];
            ts.copy_from_slice(&packet[..8]);
            let sample = packet[8..]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            chunk.samples.push(sample);
            chunk.timestamps.push(f64::from_le_bytes(ts));
        }
        self.carry.drain(..n * len);
        if let Some(ts) = chunk.timestamps.last() {
            self.last_timestamp = Some(*ts);
        }
        chunk
    }
}

fn read_header(stream: &mut TcpStream) -> StreamResult<(StreamInfo, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    // Prefix plus decimal length, terminated by ':'.
    loop {
        if stream.read(&mut byte)? == 0 {
            return Err(StreamError::Disconnected);
        }
        if byte[0] == b':' && buf.len() > INFO_PREFIX.len() {
            break;
        }
        buf.push(byte[0]);
        if buf.len() > INFO_PREFIX.len() + 16 {
            return Err(StreamError::InvalidInfo("malformed stream header".into()));
        }
    }
    let header = std::str::from_utf8(&buf)
        .map_err(|_| StreamError::InvalidInfo("invalid UTF-8 header".into()))?;
    let len: usize = header
        .strip_prefix(INFO_PREFIX)
        .and_then(|n| n.parse().ok())
        .filter(|n| *n <= MAX_HEADER_LEN)
        .ok_or_else(|| StreamError::InvalidInfo(format!("bad header '{header}'")))?;

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    let info: StreamInfo =
        serde_json::from_slice(&body).map_err(|e| StreamError::InvalidInfo(e.to_string()))?;
    Ok((info, Vec::new()))
}

impl StreamInlet for TcpInlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn pull_chunk(&mut self, max_samples: usize) -> StreamResult<Chunk> {
        if !self.closed {
            self.fill()?;
        }
        let chunk = self.decode(max_samples);
        if chunk.is_empty() && self.closed {
            return Err(StreamError::Disconnected);
        }
        Ok(chunk)
    }

    fn pull_sample(&mut self, timeout: Duration) -> StreamResult<Option<(Vec<f32>, f64)>> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut chunk = self.pull_chunk(1)?;
            if let (Some(sample), Some(ts)) = (chunk.samples.pop(), chunk.timestamps.pop()) {
                return Ok(Some((sample, ts)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// One-shot estimate: local clock minus the newest remote timestamp seen
    /// so far. Transport latency is folded into the offset.
    fn time_correction(&mut self) -> StreamResult<f64> {
        let remote = self
            .last_timestamp
            .ok_or_else(|| StreamError::InvalidInfo("no samples received yet".into()))?;
        Ok(self.local_clock() - remote)
    }
}

/// Finds outlets by name over multicast discovery, or connects to a fixed
/// address when one is configured.
#[derive(Debug, Clone)]
pub struct TcpResolver {
    direct: Option<SocketAddr>,
    discovery: SocketAddr,
}

impl Default for TcpResolver {
    fn default() -> Self {
        Self {
            direct: None,
            discovery: SocketAddr::from(([224, 0, 0, 183], LSL_MULTICAST_PORT)),
        }
    }
}

impl TcpResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips discovery and connects to `addr`; the advertised name must
    /// still match.
    pub fn direct(addr: SocketAddr) -> Self {
        Self {
            direct: Some(addr),
            ..Self::default()
        }
    }

    fn discover(&self, name: &str, timeout: Duration) -> StreamResult<SocketAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        socket.send_to(QUERY.as_bytes(), self.discovery)?;

        let start = Instant::now();
        let mut buf = [0u8; 4096];
        while start.elapsed() < timeout {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let Some(info) = parse_discovery_response(&buf[..n]) else {
                        continue;
                    };
                    if info.name == name && info.port != 0 {
                        return Ok(SocketAddr::new(from.ip(), info.port));
                    }
                }
                Err(ref e)
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StreamError::NoStreamsFound {
            name: name.to_string(),
        })
    }
}

fn parse_discovery_response(response: &[u8]) -> Option<StreamInfo> {
    let text = std::str::from_utf8(response).ok()?;
    let body = text.strip_prefix(QUERY)?.trim_start();
    serde_json::from_str(body).ok()
}

impl StreamResolver for TcpResolver {
    type Inlet = TcpInlet;

    fn resolve(&self, name: &str, timeout: Duration) -> StreamResult<TcpInlet> {
        let addr = match self.direct {
            Some(addr) => addr,
            None => self.discover(name, timeout)?,
        };
        let inlet = TcpInlet::connect(addr, timeout)?;
        if inlet.info().name != name {
            return Err(StreamError::NoStreamsFound {
                name: name.to_string(),
            });
        }
        Ok(inlet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_queries_and_survives_failed_replies() {
        let outlet = UdpSocket::bind("127.0.0.1:0").unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let from = client.local_addr().unwrap();
        let info = StreamInfo::new("Explore_8547_ExG", 8, 250.0);

        assert!(!answer_query(&outlet, b"hello", &info, from).unwrap());
        assert!(answer_query(&outlet, QUERY.as_bytes(), &info, from).unwrap());
        let mut buf = [0u8; 1024];
        let (len, _) = client.recv_from(&mut buf).unwrap();
        let reply = parse_discovery_response(&buf[..len]).unwrap();
        assert_eq!(reply.name, "Explore_8547_ExG");

        // An IPv4 socket cannot reach an IPv6 peer.
        let unreachable: SocketAddr = "[::1]:9".parse().unwrap();
        assert!(!answer_query(&outlet, QUERY.as_bytes(), &info, unreachable).unwrap());
    }

    #[test]
    fn parses_discovery_replies() {
        let reply = br#"LSL:shortinfo {"name":"Explore_8547_ExG","type":"EEG","channel_count":8,"nominal_srate":250.0,"port":16572}"#;
        let info = parse_discovery_response(reply).unwrap();
        assert_eq!(info.name, "Explore_8547_ExG");
        assert_eq!(info.channel_count, 8);
        assert_eq!(info.port, 16572);

        assert!(parse_discovery_response(b"LSL:fullinfo {}").is_none());
        assert!(parse_discovery_response(b"LSL:shortinfo not-json").is_none());
    }
}
