//! Tuya local-network protocol (version 3.3)
//!
//! Frames are `000055AA | seq | command | length | payload | crc32 | 0000AA55`,
//! all integers big-endian. Frames sent by a device carry a return code in
//! front of the payload. Payloads are JSON encrypted with AES-128-ECB (PKCS#7)
//! under the device's local key; control payloads additionally start with a
//! clear `3.3` version header.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{DeviceController, DiscoveredDevice};
use crate::config::SmartDevice;
use crate::error::CommandError;

const PREFIX: u32 = 0x0000_55AA;
const SUFFIX: u32 = 0x0000_AA55;
const HEADER_LEN: usize = 16;
/// Return code, crc, and suffix around a device payload
const RESPONSE_OVERHEAD: usize = 12;
const MAX_FRAME_BODY: usize = 64 * 1024;
const BLOCK: usize = 16;

const CONTROL: u32 = 7;
const DP_QUERY: u32 = 10;

const VERSION: &[u8] = b"3.3";
/// `3.3` followed by reserved zero bytes
const VERSION_HEADER_LEN: usize = 15;

/// Frames read per request before giving up on unsolicited pushes
const MAX_READS: usize = 4;

pub const DEVICE_PORT: u16 = 6668;
const DISCOVERY_PORTS: [u16; 2] = [6666, 6667];

/// MD5 of the fixed broadcast secret `yGAdlopoPVldABfn`
const BROADCAST_KEY: [u8; 16] = [
    0x6c, 0x1e, 0xc8, 0xe2, 0xbb, 0x9b, 0xb5, 0x9a, 0xb5, 0x0b, 0x0d, 0xaf, 0x64, 0x9b, 0x41, 0x0a,
];

/// Data point that switches outlets and lights
const SWITCH_DP: &str = "1";

fn protocol_error(message: impl Into<String>) -> CommandError {
    CommandError::DeviceConnection(message.into())
}

fn cipher(key: &[u8]) -> Result<Aes128, CommandError> {
    Aes128::new_from_slice(key)
        .map_err(|_| protocol_error("local key must be exactly 16 characters"))
}

fn encrypt(key: &[u8], plain: &[u8]) -> Result<Vec<u8>, CommandError> {
    let cipher = cipher(key)?;
    let pad = BLOCK - plain.len() % BLOCK;
    let mut data = plain.to_vec();
    data.resize(plain.len() + pad, pad as u8);
    for block in data.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(data)
}

fn decrypt(key: &[u8], encrypted: &[u8]) -> Result<Vec<u8>, CommandError> {
    if encrypted.is_empty() || encrypted.len() % BLOCK != 0 {
        return Err(protocol_error("encrypted payload is not block aligned"));
    }
    let cipher = cipher(key)?;
    let mut data = encrypted.to_vec();
    for block in data.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let pad = data.last().copied().unwrap_or(0) as usize;
    let valid = (1..=BLOCK).contains(&pad)
        && data[data.len() - pad..].iter().all(|&b| b as usize == pad);
    if !valid {
        return Err(protocol_error(
            "could not decrypt device payload (wrong local key?)",
        ));
    }
    data.truncate(data.len() - pad);
    Ok(data)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Client-to-device frame
fn encode_frame(seq: u32, command: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len() + 8);
    frame.extend_from_slice(&PREFIX.to_be_bytes());
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&command.to_be_bytes());
    frame.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_be_bytes());
    frame.extend_from_slice(&SUFFIX.to_be_bytes());
    frame
}

/// A frame sent by a device
#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    command: u32,
    return_code: u32,
    payload: Vec<u8>,
}

/// Length of the body that follows a header
fn body_len(header: &[u8]) -> Result<usize, CommandError> {
    if read_u32(header, 0) != PREFIX {
        return Err(protocol_error("unexpected frame prefix"));
    }
    let len = read_u32(header, 12) as usize;
    if !(RESPONSE_OVERHEAD..=MAX_FRAME_BODY).contains(&len) {
        return Err(protocol_error(format!("invalid frame length {}", len)));
    }
    Ok(len)
}

fn decode_frame(bytes: &[u8]) -> Result<Frame, CommandError> {
    if bytes.len() < HEADER_LEN {
        return Err(protocol_error("truncated frame"));
    }
    let end = HEADER_LEN + body_len(&bytes[..HEADER_LEN])?;
    if bytes.len() < end {
        return Err(protocol_error("truncated frame"));
    }

    let crc_at = end - 8;
    if read_u32(bytes, end - 4) != SUFFIX {
        return Err(protocol_error("unexpected frame suffix"));
    }
    if read_u32(bytes, crc_at) != crc32fast::hash(&bytes[..crc_at]) {
        return Err(protocol_error("frame checksum mismatch"));
    }

    Ok(Frame {
        command: read_u32(bytes, 8),
        return_code: read_u32(bytes, HEADER_LEN),
        payload: bytes[HEADER_LEN + 4..crc_at].to_vec(),
    })
}

/// JSON carried by a device payload; plain acknowledgements are `None`
fn decode_payload(key: &[u8], payload: &[u8]) -> Result<Option<Value>, CommandError> {
    let payload = match payload.strip_prefix(VERSION) {
        Some(_) if payload.len() >= VERSION_HEADER_LEN => &payload[VERSION_HEADER_LEN..],
        _ => payload,
    };
    if payload.is_empty() {
        return Ok(None);
    }

    let plain = if payload.first() == Some(&b'{') {
        payload.to_vec()
    } else {
        decrypt(key, payload)?
    };
    serde_json::from_slice(&plain).map(Some).map_err(|_| {
        protocol_error(format!(
            "device sent an unexpected reply: {}",
            String::from_utf8_lossy(&plain)
        ))
    })
}

fn timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

fn control_payload(device: &SmartDevice, on: bool) -> Result<Vec<u8>, CommandError> {
    let body = json!({
        "devId": device.device_id,
        "uid": device.device_id,
        "t": timestamp(),
        "dps": { SWITCH_DP: on },
    });
    let encrypted = encrypt(device.local_key.as_bytes(), body.to_string().as_bytes())?;

    let mut payload = Vec::with_capacity(VERSION_HEADER_LEN + encrypted.len());
    payload.extend_from_slice(VERSION);
    payload.resize(VERSION_HEADER_LEN, 0);
    payload.extend_from_slice(&encrypted);
    Ok(payload)
}

fn query_payload(device: &SmartDevice) -> Result<Vec<u8>, CommandError> {
    let body = json!({
        "gwId": device.device_id,
        "devId": device.device_id,
        "uid": device.device_id,
        "t": timestamp(),
    });
    encrypt(device.local_key.as_bytes(), body.to_string().as_bytes())
}

async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Frame, CommandError> {
    let io_error = |e: std::io::Error| protocol_error(format!("connection lost: {}", e));

    let mut frame = vec![0u8; HEADER_LEN];
    stream.read_exact(&mut frame).await.map_err(io_error)?;
    let len = body_len(&frame)?;
    frame.resize(HEADER_LEN + len, 0);
    stream
        .read_exact(&mut frame[HEADER_LEN..])
        .await
        .map_err(io_error)?;
    decode_frame(&frame)
}

/// Device announcement broadcast on UDP 6666 (clear) or 6667 (encrypted)
#[derive(Debug, Deserialize)]
struct Announcement {
    ip: String,
    #[serde(rename = "gwId")]
    gw_id: String,
    #[serde(rename = "productKey", default)]
    product_key: String,
    #[serde(default)]
    version: String,
}

fn parse_broadcast(datagram: &[u8]) -> Result<DiscoveredDevice, CommandError> {
    let frame = decode_frame(datagram)?;
    let value = decode_payload(&BROADCAST_KEY, &frame.payload)?
        .ok_or_else(|| protocol_error("empty broadcast"))?;
    let announcement: Announcement = serde_json::from_value(value)
        .map_err(|e| protocol_error(format!("unexpected broadcast: {}", e)))?;

    Ok(DiscoveredDevice {
        device_id: announcement.gw_id,
        ip_address: announcement.ip,
        product_key: announcement.product_key,
        version: announcement.version,
    })
}

async fn collect_broadcasts(socket: &UdpSocket, deadline: Instant) -> Vec<DiscoveredDevice> {
    let mut found = Vec::new();
    let mut buffer = vec![0u8; 4096];
    loop {
        let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buffer)).await;
        let (len, from) = match received {
            Err(_) => break,
            Ok(Err(e)) => {
                warn!("Stopped listening for device broadcasts: {}", e);
                break;
            }
            Ok(Ok(received)) => received,
        };
        match parse_broadcast(&buffer[..len]) {
            Ok(device) => found.push(device),
            Err(e) => debug!("Ignoring broadcast from {}: {}", from, e),
        }
    }
    found
}

/// Talks to Tuya plugs and lights directly over the LAN
pub struct TuyaController {
    timeout: Duration,
    port: u16,
    seq: AtomicU32,
}

impl Default for TuyaController {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl TuyaController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            port: DEVICE_PORT,
            seq: AtomicU32::new(0),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Send one request and return the first matching reply's JSON
    async fn request(
        &self,
        device: &SmartDevice,
        command: u32,
        payload: Vec<u8>,
    ) -> Result<Option<Value>, CommandError> {
        let address = format!("{}:{}", device.ip_address, self.port);
        let exchange = self.exchange(&address, device.local_key.as_bytes(), command, &payload);

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                protocol_error(format!(
                    "Timed out talking to {} at {}",
                    device.name, address
                ))
            })?
    }

    async fn exchange(
        &self,
        address: &str,
        key: &[u8],
        command: u32,
        payload: &[u8],
    ) -> Result<Option<Value>, CommandError> {
        let mut stream = TcpStream::connect(address)
            .await
            .map_err(|e| protocol_error(format!("Could not connect to {}: {}", address, e)))?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        stream
            .write_all(&encode_frame(seq, command, payload))
            .await
            .map_err(|e| protocol_error(format!("Could not send to {}: {}", address, e)))?;

        for _ in 0..MAX_READS {
            let frame = read_frame(&mut stream).await?;
            if frame.command != command {
                debug!("Skipping unsolicited frame (command {})", frame.command);
                continue;
            }
            if frame.return_code != 0 {
                return Err(protocol_error(format!(
                    "device rejected the request (code {})",
                    frame.return_code
                )));
            }
            return decode_payload(key, &frame.payload);
        }
        Err(protocol_error(format!("No reply from {}", address)))
    }
}

#[async_trait]
impl DeviceController for TuyaController {
    async fn set_power(&self, device: &SmartDevice, on: bool) -> Result<(), CommandError> {
        let payload = control_payload(device, on)?;
        let reply = self.request(device, CONTROL, payload).await?;
        debug!("Device {} acknowledged: {:?}", device.name, reply);
        Ok(())
    }

    async fn status(&self, device: &SmartDevice) -> Result<Value, CommandError> {
        let payload = query_payload(device)?;
        self.request(device, DP_QUERY, payload)
            .await?
            .ok_or_else(|| protocol_error(format!("{} returned an empty status", device.name)))
    }

    async fn discover(&self, scan: Duration) -> Result<Vec<DiscoveredDevice>, CommandError> {
        let mut sockets = Vec::new();
        for port in DISCOVERY_PORTS {
            match UdpSocket::bind(("0.0.0.0", port)).await {
                Ok(socket) => sockets.push(socket),
                Err(e) => warn!("Cannot listen on UDP {}: {}", port, e),
            }
        }
        if sockets.is_empty() {
            return Err(protocol_error(
                "Failed to discover devices: no broadcast port available",
            ));
        }

        info!("Starting device discovery for {} seconds...", scan.as_secs());
        let deadline = Instant::now() + scan;
        let heard = futures::future::join_all(
            sockets
                .iter()
                .map(|socket| collect_broadcasts(socket, deadline)),
        )
        .await;

        // Devices repeat their announcement every few seconds
        let unique: BTreeMap<String, DiscoveredDevice> = heard
            .into_iter()
            .flatten()
            .map(|device| (device.device_id.clone(), device))
            .collect();
        info!("Discovered {} devices", unique.len());
        Ok(unique.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const KEY: &str = "0123456789abcdef";

    fn device(port_host: &str) -> SmartDevice {
        SmartDevice::new("Desk Lamp", "bf01", port_host, KEY, "light").unwrap()
    }

    /// Frame as a device would send it
    fn device_frame(command: u32, return_code: u32, payload: &[u8]) -> Vec<u8> {
        let mut body = return_code.to_be_bytes().to_vec();
        body.extend_from_slice(payload);
        encode_frame(0, command, &body)
    }

    /// Payload of a client frame
    fn request_payload(frame: &[u8]) -> Vec<u8> {
        let len = read_u32(frame, 12) as usize;
        frame[HEADER_LEN..HEADER_LEN + len - 8].to_vec()
    }

    #[test]
    fn test_encryption_pads_and_reverses() {
        let plain = br#"{"dps":{"1":true}}"#;
        let encrypted = encrypt(KEY.as_bytes(), plain).unwrap();
        assert_eq!(encrypted.len() % BLOCK, 0);
        assert_ne!(encrypted[..BLOCK], plain[..BLOCK]);
        assert_eq!(decrypt(KEY.as_bytes(), &encrypted).unwrap(), plain);

        // A full block of input gets a full block of padding
        let block = [b'x'; BLOCK];
        assert_eq!(encrypt(KEY.as_bytes(), &block).unwrap().len(), 2 * BLOCK);
    }

    #[test]
    fn test_wrong_key_is_reported() {
        let encrypted = encrypt(KEY.as_bytes(), b"{}").unwrap();
        assert!(decrypt(b"fedcba9876543210", &encrypted).is_err());
        assert!(encrypt(b"short", b"{}").is_err());
    }

    #[test]
    fn test_device_frame_decodes() {
        let payload = encrypt(KEY.as_bytes(), br#"{"dps":{"1":false}}"#).unwrap();
        let frame = decode_frame(&device_frame(DP_QUERY, 0, &payload)).unwrap();

        assert_eq!(frame.command, DP_QUERY);
        assert_eq!(frame.return_code, 0);
        let value = decode_payload(KEY.as_bytes(), &frame.payload).unwrap().unwrap();
        assert_eq!(value["dps"]["1"], false);
    }

    #[test]
    fn test_corrupted_frame_is_rejected() {
        let mut bytes = device_frame(CONTROL, 0, b"");
        let last_payload_byte = bytes.len() - 9;
        bytes[last_payload_byte] ^= 0xff;
        assert!(decode_frame(&bytes).unwrap_err().to_string().contains("checksum"));

        let mut bytes = device_frame(CONTROL, 0, b"");
        bytes[0] = 0x12;
        assert!(decode_frame(&bytes).is_err());
        assert!(decode_frame(&bytes[..10]).is_err());
    }

    #[test]
    fn test_versioned_and_empty_payloads() {
        let encrypted = encrypt(KEY.as_bytes(), br#"{"dps":{"1":true}}"#).unwrap();
        let mut versioned = b"3.3".to_vec();
        versioned.resize(VERSION_HEADER_LEN, 0);
        versioned.extend_from_slice(&encrypted);

        let value = decode_payload(KEY.as_bytes(), &versioned).unwrap().unwrap();
        assert_eq!(value["dps"]["1"], true);
        assert_eq!(decode_payload(KEY.as_bytes(), b"").unwrap(), None);
    }

    #[test]
    fn test_broadcasts_in_both_forms() {
        let announcement = br#"{"ip":"192.168.1.50","gwId":"bf99","active":2,"productKey":"key123","version":"3.3"}"#;

        let encrypted = encrypt(&BROADCAST_KEY, announcement).unwrap();
        let device = parse_broadcast(&device_frame(0x13, 0, &encrypted)).unwrap();
        assert_eq!(device.device_id, "bf99");
        assert_eq!(device.ip_address, "192.168.1.50");
        assert_eq!(device.product_key, "key123");
        assert_eq!(device.version, "3.3");

        let clear = parse_broadcast(&device_frame(0x13, 0, announcement)).unwrap();
        assert_eq!(clear, device);
    }

    #[tokio::test]
    async fn test_set_power_talks_to_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let fake_device = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; HEADER_LEN];
            socket.read_exact(&mut header).await.unwrap();
            let len = read_u32(&header, 12) as usize;
            let mut rest = vec![0u8; len];
            socket.read_exact(&mut rest).await.unwrap();
            let mut frame = header.to_vec();
            frame.extend_from_slice(&rest);

            let payload = request_payload(&frame);
            assert!(payload.starts_with(b"3.3"));
            let body = decrypt(KEY.as_bytes(), &payload[VERSION_HEADER_LEN..]).unwrap();
            let body: Value = serde_json::from_slice(&body).unwrap();

            // An unrelated push first, then the acknowledgement
            socket.write_all(&device_frame(8, 0, b"")).await.unwrap();
            socket.write_all(&device_frame(CONTROL, 0, b"")).await.unwrap();
            (read_u32(&frame, 8), body)
        });

        let controller = TuyaController::new(Duration::from_secs(2)).with_port(port);
        controller.set_power(&device("127.0.0.1"), true).await.unwrap();

        let (command, body) = fake_device.await.unwrap();
        assert_eq!(command, CONTROL);
        assert_eq!(body["devId"], "bf01");
        assert_eq!(body["dps"]["1"], true);
    }

    #[tokio::test]
    async fn test_status_returns_device_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; HEADER_LEN];
            socket.read_exact(&mut header).await.unwrap();
            let mut rest = vec![0u8; read_u32(&header, 12) as usize];
            socket.read_exact(&mut rest).await.unwrap();

            let reply = encrypt(KEY.as_bytes(), br#"{"devId":"bf01","dps":{"1":true}}"#).unwrap();
            socket.write_all(&device_frame(DP_QUERY, 0, &reply)).await.unwrap();
        });

        let controller = TuyaController::new(Duration::from_secs(2)).with_port(port);
        let status = controller.status(&device("127.0.0.1")).await.unwrap();
        assert_eq!(status["dps"]["1"], true);
    }

    #[tokio::test]
    async fn test_rejected_request_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; HEADER_LEN];
            socket.read_exact(&mut header).await.unwrap();
            let mut rest = vec![0u8; read_u32(&header, 12) as usize];
            socket.read_exact(&mut rest).await.unwrap();
            socket.write_all(&device_frame(CONTROL, 1, b"")).await.unwrap();
        });

        let controller = TuyaController::new(Duration::from_secs(2)).with_port(port);
        let err = controller
            .set_power(&device("127.0.0.1"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let controller = TuyaController::new(Duration::from_millis(100)).with_port(port);
        let err = controller.status(&device("127.0.0.1")).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
        hold.abort();
    }
}
