// src/core/scanner/tls_probe.rs

//! Raw TLS record probes.
//!
//! Legacy protocol support and the classic handshake vulnerabilities cannot be observed
//! through a modern TLS library, so these probes speak just enough of the wire protocol
//! themselves: they send a hand-built ClientHello and read back the server's first flight.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const CONTENT_CHANGE_CIPHER_SPEC: u8 = 0x14;
const CONTENT_ALERT: u8 = 0x15;
const CONTENT_HANDSHAKE: u8 = 0x16;
const CONTENT_HEARTBEAT: u8 = 0x18;

const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
pub const HANDSHAKE_SERVER_HELLO: u8 = 0x02;
pub const HANDSHAKE_SERVER_HELLO_DONE: u8 = 0x0e;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_EC_POINT_FORMATS: u16 = 0x000b;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_HEARTBEAT: u16 = 0x000f;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
const EXT_KEY_SHARE: u16 = 0x0033;

const GROUP_X25519: u16 = 0x001d;
const MAX_RECORD_LEN: usize = 18_432;

const LEGACY_CIPHER_SUITES: &[u16] = &[
    0xc02f, 0xc030, 0xc02b, 0xc02c, 0xcca8, 0xcca9, 0xc013, 0xc014, 0xc009, 0xc00a, 0x009c, 0x009d, 0x0033,
    0x0039, 0x002f, 0x0035, 0x000a, 0x0005, 0x0004,
];
const TLS13_CIPHER_SUITES: &[u16] = &[0x1301, 0x1302, 0x1303];
const SIGNATURE_ALGORITHMS: &[u16] = &[0x0403, 0x0804, 0x0401, 0x0503, 0x0805, 0x0501, 0x0806, 0x0601, 0x0201];
const SUPPORTED_GROUPS: &[u16] = &[GROUP_X25519, 0x0017, 0x0018, 0x0019];
const SSL2_CIPHER_SPECS: &[[u8; 3]] = &[
    [0x01, 0x00, 0x80],
    [0x02, 0x00, 0x80],
    [0x03, 0x00, 0x80],
    [0x04, 0x00, 0x80],
    [0x05, 0x00, 0x80],
    [0x06, 0x00, 0x40],
    [0x07, 0x00, 0xc0],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
    Ssl2,
    Ssl3,
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 6] = [
        ProtocolVersion::Ssl2,
        ProtocolVersion::Ssl3,
        ProtocolVersion::Tls10,
        ProtocolVersion::Tls11,
        ProtocolVersion::Tls12,
        ProtocolVersion::Tls13,
    ];

    pub fn wire(self) -> u16 {
        match self {
            ProtocolVersion::Ssl2 => 0x0002,
            ProtocolVersion::Ssl3 => 0x0300,
            ProtocolVersion::Tls10 => 0x0301,
            ProtocolVersion::Tls11 => 0x0302,
            ProtocolVersion::Tls12 => 0x0303,
            ProtocolVersion::Tls13 => 0x0304,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProtocolVersion::Ssl2 => "SSL 2.0",
            ProtocolVersion::Ssl3 => "SSL 3.0",
            ProtocolVersion::Tls10 => "TLS 1.0",
            ProtocolVersion::Tls11 => "TLS 1.1",
            ProtocolVersion::Tls12 => "TLS 1.2",
            ProtocolVersion::Tls13 => "TLS 1.3",
        }
    }

    pub fn is_legacy(self) -> bool {
        self < ProtocolVersion::Tls12
    }

    fn record_version(self) -> u16 {
        match self {
            ProtocolVersion::Ssl3 => 0x0300,
            _ => 0x0301,
        }
    }

    fn hello_version(self) -> u16 {
        match self {
            ProtocolVersion::Tls13 => 0x0303,
            other => other.wire(),
        }
    }
}

/// Extra offers a probe ClientHello can carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelloOptions {
    pub offer_compression: bool,
    pub offer_heartbeat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub cipher_suite: u16,
    pub compression_method: u8,
    pub selected_version: Option<u16>,
}

impl ServerHello {
    /// The protocol actually chosen, honouring the `supported_versions` extension.
    pub fn negotiated_version(&self) -> u16 {
        self.selected_version.unwrap_or(self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsEvent {
    Handshake { msg_type: u8, body: Vec<u8> },
    Alert { level: u8, description: u8 },
    ChangeCipherSpec,
    Heartbeat(Vec<u8>),
    Unknown(u8),
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_u24(buf: &mut Vec<u8>, value: usize) {
    buf.extend_from_slice(&[(value >> 16) as u8, (value >> 8) as u8, value as u8]);
}

fn extension(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    put_u16(&mut out, id);
    put_u16(&mut out, body.len() as u16);
    out.extend_from_slice(body);
    out
}

fn u16_list(values: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + values.len() * 2);
    put_u16(&mut out, (values.len() * 2) as u16);
    for value in values {
        put_u16(&mut out, *value);
    }
    out
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        out.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    }
    out.truncate(len);
    out
}

fn server_name_extension(host: &str) -> Option<Vec<u8>> {
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let name = host.as_bytes();
    let mut entry = vec![0u8];
    put_u16(&mut entry, name.len() as u16);
    entry.extend_from_slice(name);

    let mut body = Vec::with_capacity(2 + entry.len());
    put_u16(&mut body, entry.len() as u16);
    body.extend_from_slice(&entry);
    Some(extension(EXT_SERVER_NAME, &body))
}

/// Builds a complete handshake record carrying a ClientHello for `version`.
pub fn build_client_hello(version: ProtocolVersion, host: &str, options: HelloOptions) -> Vec<u8> {
    if version == ProtocolVersion::Ssl2 {
        return build_sslv2_client_hello();
    }

    let mut extensions = Vec::new();
    if version != ProtocolVersion::Ssl3 {
        if let Some(sni) = server_name_extension(host) {
            extensions.extend(sni);
        }
        extensions.extend(extension(EXT_SUPPORTED_GROUPS, &u16_list(SUPPORTED_GROUPS)));
        extensions.extend(extension(EXT_EC_POINT_FORMATS, &[1, 0]));
        if version >= ProtocolVersion::Tls12 {
            extensions.extend(extension(EXT_SIGNATURE_ALGORITHMS, &u16_list(SIGNATURE_ALGORITHMS)));
        }
        if options.offer_heartbeat {
            // peer_allowed_to_send
            extensions.extend(extension(EXT_HEARTBEAT, &[1]));
        }
        if version == ProtocolVersion::Tls13 {
            extensions.extend(extension(EXT_SUPPORTED_VERSIONS, &[2, 0x03, 0x04]));

            let mut share = Vec::with_capacity(38);
            put_u16(&mut share, 36);
            put_u16(&mut share, GROUP_X25519);
            put_u16(&mut share, 32);
            share.extend(random_bytes(32));
            extensions.extend(extension(EXT_KEY_SHARE, &share));
        }
    }

    let suites: Vec<u16> = if version == ProtocolVersion::Tls13 {
        TLS13_CIPHER_SUITES.iter().chain(LEGACY_CIPHER_SUITES).copied().collect()
    } else {
        LEGACY_CIPHER_SUITES.to_vec()
    };

    let mut body = Vec::with_capacity(128 + extensions.len());
    put_u16(&mut body, version.hello_version());
    body.extend(random_bytes(32));
    body.push(0);
    body.extend(u16_list(&suites));
    if options.offer_compression {
        body.extend_from_slice(&[2, 1, 0]);
    } else {
        body.extend_from_slice(&[1, 0]);
    }
    if !extensions.is_empty() {
        put_u16(&mut body, extensions.len() as u16);
        body.extend(extensions);
    }

    let mut handshake = Vec::with_capacity(4 + body.len());
    handshake.push(HANDSHAKE_CLIENT_HELLO);
    put_u24(&mut handshake, body.len());
    handshake.extend(body);

    record(CONTENT_HANDSHAKE, version.record_version(), &handshake)
}

fn record(content_type: u8, version: u16, fragment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + fragment.len());
    out.push(content_type);
    put_u16(&mut out, version);
    put_u16(&mut out, fragment.len() as u16);
    out.extend_from_slice(fragment);
    out
}

fn build_sslv2_client_hello() -> Vec<u8> {
    let mut body = vec![HANDSHAKE_CLIENT_HELLO];
    put_u16(&mut body, ProtocolVersion::Ssl2.wire());
    put_u16(&mut body, (SSL2_CIPHER_SPECS.len() * 3) as u16);
    put_u16(&mut body, 0);
    put_u16(&mut body, 16);
    for spec in SSL2_CIPHER_SPECS {
        body.extend_from_slice(spec);
    }
    body.extend(random_bytes(16));

    let mut out = Vec::with_capacity(2 + body.len());
    put_u16(&mut out, body.len() as u16 | 0x8000);
    out.extend(body);
    out
}

/// Heartbeat request claiming a 16 KiB payload while sending none.
pub fn build_heartbeat_request(version: u16) -> Vec<u8> {
    record(CONTENT_HEARTBEAT, version, &[0x01, 0x40, 0x00])
}

fn build_early_change_cipher_spec(version: u16) -> Vec<u8> {
    let mut out = record(CONTENT_CHANGE_CIPHER_SPEC, version, &[0x01]);
    // A Finished-sized handshake record the server can only read with the wrong keys.
    out.extend(record(CONTENT_HANDSHAKE, version, &[0u8; 40]));
    out
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

/// Parses the body of a ServerHello handshake message.
pub fn parse_server_hello(body: &[u8]) -> Option<ServerHello> {
    let mut reader = Reader::new(body);
    let version = reader.u16()?;
    reader.take(32)?;
    let session_len = reader.u8()? as usize;
    reader.take(session_len)?;
    let cipher_suite = reader.u16()?;
    let compression_method = reader.u8()?;

    let mut selected_version = None;
    if reader.remaining() >= 2 {
        let ext_len = reader.u16()? as usize;
        let mut extensions = Reader::new(reader.take(ext_len)?);
        while extensions.remaining() >= 4 {
            let id = extensions.u16()?;
            let len = extensions.u16()? as usize;
            let data = extensions.take(len)?;
            if id == EXT_SUPPORTED_VERSIONS && data.len() == 2 {
                selected_version = Some(u16::from_be_bytes([data[0], data[1]]));
            }
        }
    }

    Some(ServerHello {
        version,
        cipher_suite,
        compression_method,
        selected_version,
    })
}

/// Splits a raw byte stream into records and handshake messages.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    raw: Vec<u8>,
    handshake: Vec<u8>,
}

impl RecordBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    /// Next complete event, `Ok(None)` when more bytes are needed.
    pub fn next_event(&mut self) -> io::Result<Option<TlsEvent>> {
        loop {
            if let Some(message) = self.take_handshake_message() {
                return Ok(Some(message));
            }

            if self.raw.len() < 5 {
                return Ok(None);
            }
            let content_type = self.raw[0];
            if !(CONTENT_CHANGE_CIPHER_SPEC..=CONTENT_HEARTBEAT).contains(&content_type) || self.raw[1] != 0x03 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "peer did not answer with TLS records"));
            }
            let len = u16::from_be_bytes([self.raw[3], self.raw[4]]) as usize;
            if len > MAX_RECORD_LEN {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "oversized TLS record"));
            }
            if self.raw.len() < 5 + len {
                return Ok(None);
            }
            let fragment: Vec<u8> = self.raw.drain(..5 + len).skip(5).collect();

            match content_type {
                CONTENT_HANDSHAKE => {
                    self.handshake.extend(fragment);
                    continue;
                }
                CONTENT_ALERT if fragment.len() >= 2 => {
                    return Ok(Some(TlsEvent::Alert {
                        level: fragment[0],
                        description: fragment[1],
                    }));
                }
                CONTENT_CHANGE_CIPHER_SPEC => return Ok(Some(TlsEvent::ChangeCipherSpec)),
                CONTENT_HEARTBEAT => return Ok(Some(TlsEvent::Heartbeat(fragment))),
                other => return Ok(Some(TlsEvent::Unknown(other))),
            }
        }
    }

    fn take_handshake_message(&mut self) -> Option<TlsEvent> {
        if self.handshake.len() < 4 {
            return None;
        }
        let len = ((self.handshake[1] as usize) << 16) | ((self.handshake[2] as usize) << 8) | self.handshake[3] as usize;
        if self.handshake.len() < 4 + len {
            return None;
        }
        let msg_type = self.handshake[0];
        let body: Vec<u8> = self.handshake.drain(..4 + len).skip(4).collect();
        Some(TlsEvent::Handshake { msg_type, body })
    }
}

struct ProbeSession {
    stream: TcpStream,
    buffer: RecordBuffer,
    wait: Duration,
}

impl ProbeSession {
    async fn connect(host: &str, port: u16, wait: Duration) -> io::Result<Self> {
        let stream = timeout(wait, TcpStream::connect((host, port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        Ok(Self {
            stream,
            buffer: RecordBuffer::default(),
            wait,
        })
    }

    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        timeout(self.wait, self.stream.write_all(bytes))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
    }

    /// Next event from the server, `Ok(None)` once it closed the connection.
    async fn next_event(&mut self) -> io::Result<Option<TlsEvent>> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(event) = self.buffer.next_event()? {
                return Ok(Some(event));
            }
            let read = timeout(self.wait, self.stream.read(&mut chunk))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.push(&chunk[..read]);
        }
    }

    /// Reads the server's first flight up to ServerHelloDone. `None` when the server
    /// refused the hello.
    async fn server_flight(&mut self, until_done: bool) -> io::Result<Option<ServerHello>> {
        let mut hello = None;
        loop {
            match self.next_event().await? {
                Some(TlsEvent::Handshake { msg_type, body }) if msg_type == HANDSHAKE_SERVER_HELLO => {
                    hello = parse_server_hello(&body);
                    if hello.is_none() {
                        return Err(io::Error::new(io::ErrorKind::InvalidData, "malformed ServerHello"));
                    }
                    if !until_done {
                        return Ok(hello);
                    }
                }
                Some(TlsEvent::Handshake { msg_type, .. }) if msg_type == HANDSHAKE_SERVER_HELLO_DONE => {
                    return Ok(hello);
                }
                Some(TlsEvent::Handshake { .. }) | Some(TlsEvent::ChangeCipherSpec) => continue,
                Some(TlsEvent::Alert { .. }) | None => return Ok(None),
                Some(TlsEvent::Heartbeat(_)) | Some(TlsEvent::Unknown(_)) => continue,
            }
        }
    }
}

/// Outcome of offering a single protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProtocolProbe {
    pub supported: bool,
    pub cipher_suite: Option<u16>,
}

/// Offers exactly `version` and reports whether the server negotiated it.
pub async fn probe_protocol(host: &str, port: u16, version: ProtocolVersion, wait: Duration) -> io::Result<ProtocolProbe> {
    let mut session = ProbeSession::connect(host, port, wait).await?;
    session
        .send(&build_client_hello(version, host, HelloOptions::default()))
        .await?;

    if version == ProtocolVersion::Ssl2 {
        let mut header = [0u8; 3];
        return match timeout(wait, session.stream.read_exact(&mut header)).await {
            // SSLv2 record header with the high bit set, then SERVER-HELLO (0x04).
            Ok(Ok(_)) => Ok(ProtocolProbe {
                supported: header[0] & 0x80 != 0 && header[2] == 0x04,
                cipher_suite: None,
            }),
            _ => Ok(ProtocolProbe::default()),
        };
    }

    match session.server_flight(false).await {
        Ok(Some(hello)) => {
            let supported = hello.negotiated_version() == version.wire();
            debug!(host, version = version.label(), negotiated = hello.negotiated_version(), "ServerHello received");
            Ok(ProtocolProbe {
                supported,
                cipher_suite: supported.then_some(hello.cipher_suite),
            })
        }
        Ok(None) => Ok(ProtocolProbe::default()),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(ProtocolProbe::default()),
        Err(e) => Err(e),
    }
}

/// Sends a heartbeat request with an overstated payload length. Any heartbeat response
/// means the server leaked memory.
pub async fn probe_heartbleed(host: &str, port: u16, version: ProtocolVersion, wait: Duration) -> io::Result<bool> {
    let mut session = ProbeSession::connect(host, port, wait).await?;
    let options = HelloOptions {
        offer_heartbeat: true,
        ..Default::default()
    };
    session.send(&build_client_hello(version, host, options)).await?;

    let Some(hello) = session.server_flight(true).await? else {
        return Ok(false);
    };
    session.send(&build_heartbeat_request(hello.negotiated_version())).await?;

    loop {
        match session.next_event().await {
            Ok(Some(TlsEvent::Heartbeat(payload))) => return Ok(payload.len() > 3),
            Ok(Some(TlsEvent::Alert { .. })) | Ok(None) => return Ok(false),
            Ok(Some(_)) => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(false),
            Err(e) => return Err(e),
        }
    }
}

/// Sends ChangeCipherSpec before key exchange. A patched server rejects it with
/// `unexpected_message`; a vulnerable one accepts it and then fails to decrypt the
/// following record.
pub async fn probe_ccs_injection(host: &str, port: u16, version: ProtocolVersion, wait: Duration) -> io::Result<bool> {
    let mut session = ProbeSession::connect(host, port, wait).await?;
    session
        .send(&build_client_hello(version, host, HelloOptions::default()))
        .await?;

    let Some(hello) = session.server_flight(true).await? else {
        return Ok(false);
    };
    session
        .send(&build_early_change_cipher_spec(hello.negotiated_version()))
        .await?;

    loop {
        match session.next_event().await {
            // bad_record_mac, decryption_failed, record_overflow
            Ok(Some(TlsEvent::Alert { description, .. })) => return Ok(matches!(description, 20..=22)),
            Ok(None) => return Ok(false),
            Ok(Some(_)) => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(false),
            Err(e) => return Err(e),
        }
    }
}

/// Offers DEFLATE and reports whether the server selected it.
pub async fn probe_compression(host: &str, port: u16, version: ProtocolVersion, wait: Duration) -> io::Result<bool> {
    let mut session = ProbeSession::connect(host, port, wait).await?;
    let options = HelloOptions {
        offer_compression: true,
        ..Default::default()
    };
    session.send(&build_client_hello(version, host, options)).await?;

    Ok(matches!(
        session.server_flight(false).await,
        Ok(Some(hello)) if hello.compression_method == 1
    ))
}

/// IANA name of a cipher suite, falling back to its hex code.
pub fn cipher_suite_name(code: u16) -> String {
    let name = match code {
        0x1301 => "TLS_AES_128_GCM_SHA256",
        0x1302 => "TLS_AES_256_GCM_SHA384",
        0x1303 => "TLS_CHACHA20_POLY1305_SHA256",
        0xc02f => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        0xc030 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        0xc02b => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        0xc02c => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        0xcca8 => "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
        0xcca9 => "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
        0xc013 => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        0xc014 => "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        0xc009 => "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
        0xc00a => "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
        0x009c => "TLS_RSA_WITH_AES_128_GCM_SHA256",
        0x009d => "TLS_RSA_WITH_AES_256_GCM_SHA384",
        0x0033 => "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
        0x0039 => "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
        0x002f => "TLS_RSA_WITH_AES_128_CBC_SHA",
        0x0035 => "TLS_RSA_WITH_AES_256_CBC_SHA",
        0x000a => "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        0x0005 => "TLS_RSA_WITH_RC4_128_SHA",
        0x0004 => "TLS_RSA_WITH_RC4_128_MD5",
        _ => return format!("0x{code:04x}"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_hello_body(version: u16, suite: u16, compression: u8, selected: Option<u16>) -> Vec<u8> {
        let mut body = Vec::new();
        put_u16(&mut body, version);
        body.extend([7u8; 32]);
        body.push(0);
        put_u16(&mut body, suite);
        body.push(compression);
        if let Some(selected) = selected {
            let ext = extension(EXT_SUPPORTED_VERSIONS, &selected.to_be_bytes());
            put_u16(&mut body, ext.len() as u16);
            body.extend(ext);
        }
        body
    }

    fn handshake(msg_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![msg_type];
        put_u24(&mut out, body.len());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn client_hello_offers_the_requested_version() {
        let hello = build_client_hello(ProtocolVersion::Tls11, "example.com", HelloOptions::default());
        assert_eq!(hello[0], CONTENT_HANDSHAKE);
        assert_eq!(u16::from_be_bytes([hello[3], hello[4]]) as usize, hello.len() - 5);
        assert_eq!(hello[5], HANDSHAKE_CLIENT_HELLO);
        assert_eq!(u16::from_be_bytes([hello[9], hello[10]]), 0x0302);
        assert!(hello.windows(11).any(|w| w == b"example.com"));
    }

    #[test]
    fn tls13_hello_carries_supported_versions() {
        let hello = build_client_hello(ProtocolVersion::Tls13, "example.com", HelloOptions::default());
        assert_eq!(u16::from_be_bytes([hello[9], hello[10]]), 0x0303);
        let needle = [0x00, 0x2b, 0x00, 0x03, 0x02, 0x03, 0x04];
        assert!(hello.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn sslv2_hello_uses_two_byte_header() {
        let hello = build_client_hello(ProtocolVersion::Ssl2, "example.com", HelloOptions::default());
        assert_eq!(hello[0] & 0x80, 0x80);
        let len = (u16::from_be_bytes([hello[0], hello[1]]) & 0x7fff) as usize;
        assert_eq!(len, hello.len() - 2);
        assert_eq!(hello[2], HANDSHAKE_CLIENT_HELLO);
    }

    #[test]
    fn ip_hosts_get_no_sni() {
        assert!(server_name_extension("192.0.2.1").is_none());
        assert!(server_name_extension("example.com").is_some());
    }

    #[test]
    fn server_hello_prefers_supported_versions() {
        let hello = parse_server_hello(&server_hello_body(0x0303, 0x1301, 0, Some(0x0304))).unwrap();
        assert_eq!(hello.negotiated_version(), 0x0304);
        assert_eq!(hello.cipher_suite, 0x1301);

        let legacy = parse_server_hello(&server_hello_body(0x0301, 0xc013, 1, None)).unwrap();
        assert_eq!(legacy.negotiated_version(), 0x0301);
        assert_eq!(legacy.compression_method, 1);
    }

    #[test]
    fn truncated_server_hello_is_rejected() {
        assert!(parse_server_hello(&[0x03, 0x03, 0x00]).is_none());
    }

    #[test]
    fn handshake_messages_split_across_records() {
        let message = handshake(HANDSHAKE_SERVER_HELLO, &server_hello_body(0x0303, 0xc02f, 0, None));
        let (first, second) = message.split_at(20);

        let mut stream = record(CONTENT_HANDSHAKE, 0x0303, first);
        stream.extend(record(CONTENT_HANDSHAKE, 0x0303, second));
        stream.extend(record(CONTENT_HANDSHAKE, 0x0303, &handshake(HANDSHAKE_SERVER_HELLO_DONE, &[])));

        let mut buffer = RecordBuffer::default();
        buffer.push(&stream[..7]);
        assert_eq!(buffer.next_event().unwrap(), None);
        buffer.push(&stream[7..]);

        match buffer.next_event().unwrap() {
            Some(TlsEvent::Handshake { msg_type, body }) => {
                assert_eq!(msg_type, HANDSHAKE_SERVER_HELLO);
                assert_eq!(parse_server_hello(&body).unwrap().cipher_suite, 0xc02f);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            buffer.next_event().unwrap(),
            Some(TlsEvent::Handshake { msg_type: HANDSHAKE_SERVER_HELLO_DONE, .. })
        ));
        assert_eq!(buffer.next_event().unwrap(), None);
    }

    #[test]
    fn alerts_and_heartbeats_are_decoded() {
        let mut buffer = RecordBuffer::default();
        buffer.push(&record(CONTENT_ALERT, 0x0303, &[2, 70]));
        buffer.push(&record(CONTENT_HEARTBEAT, 0x0302, &[2, 0x40, 0, 1, 2, 3, 4]));

        assert_eq!(
            buffer.next_event().unwrap(),
            Some(TlsEvent::Alert { level: 2, description: 70 })
        );
        assert!(matches!(buffer.next_event().unwrap(), Some(TlsEvent::Heartbeat(p)) if p.len() == 7));
    }

    #[test]
    fn non_tls_bytes_are_an_error() {
        let mut buffer = RecordBuffer::default();
        buffer.push(b"HTTP/1.1 400 Bad Request\r\n");
        assert!(buffer.next_event().is_err());
    }

    #[test]
    fn heartbeat_request_overstates_payload() {
        assert_eq!(
            build_heartbeat_request(0x0302),
            vec![0x18, 0x03, 0x02, 0x00, 0x03, 0x01, 0x40, 0x00]
        );
    }

    #[test]
    fn cipher_names_fall_back_to_hex() {
        assert_eq!(cipher_suite_name(0x1302), "TLS_AES_256_GCM_SHA384");
        assert_eq!(cipher_suite_name(0xbeef), "0xbeef");
    }

    #[tokio::test]
    async fn probe_against_plain_tcp_is_unsupported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 512];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let probe = probe_protocol("127.0.0.1", port, ProtocolVersion::Tls12, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!probe.supported);
    }
}
