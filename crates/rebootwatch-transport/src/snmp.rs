//! SNMPv2c PoE port control.
//!
//! Power is toggled by setting `pethPsePortAdminEnable`
//! (`1.3.6.1.2.1.105.1.1.1.3.<group>.<port>`, RFC 3621) on the switch:
//! `true(1)` enables the port, `false(2)` cuts power. The vendor handle is
//! the port index appended to the group-1 prefix; a dotted handle such as
//! `2.14` is appended as-is.
//!
//! Only what a single `SetRequest` needs is implemented: a BER encoder for
//! the request and a decoder that pulls request-id and error-status out of
//! the `Response` PDU.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

use rebootwatch_core::{PowerState, SnmpSettings, VendorHandle};
use rebootwatch_health::{PowerControl, PowerError};

const PORT_ADMIN_ENABLE_OID: &str = "1.3.6.1.2.1.105.1.1.1.3.1";
const SNMP_V2C: i32 = 1;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_RESPONSE: u8 = 0xA2;
const TAG_SET_REQUEST: u8 = 0xA3;

/// Fields of a decoded `Response` PDU the caller checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetResponse {
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
}

/// TruthValue written to `pethPsePortAdminEnable`.
fn admin_enable_value(state: PowerState) -> i32 {
    match state {
        PowerState::On => 1,
        PowerState::Off => 2,
    }
}

/// Parse a dotted OID into its arcs.
pub fn parse_oid(dotted: &str) -> Option<Vec<u32>> {
    let arcs = dotted
        .trim_matches('.')
        .split('.')
        .map(|arc| arc.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return None;
    }
    Some(arcs)
}

/// OID of the admin-enable column for a vendor handle.
pub fn port_oid(handle: &VendorHandle) -> Option<Vec<u32>> {
    parse_oid(&format!("{PORT_ADMIN_ENABLE_OID}.{}", handle.as_str()))
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn tlv(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 4);
    out.push(tag);
    push_len(&mut out, body.len());
    out.extend_from_slice(body);
    out
}

fn encode_integer(value: i32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    // Drop leading bytes that only repeat the sign bit.
    let mut start = 0;
    while start < 3 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    tlv(TAG_INTEGER, &bytes[start..])
}

fn encode_oid(arcs: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    push_base128(&mut body, arcs[0] * 40 + arcs[1]);
    for arc in &arcs[2..] {
        push_base128(&mut body, *arc);
    }
    tlv(TAG_OID, &body)
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    loop {
        groups[n] = (value & 0x7F) as u8;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(groups[i] | continuation);
    }
}

/// Encode an SNMPv2c `SetRequest` carrying one INTEGER varbind.
pub fn encode_set_request(community: &str, request_id: i32, oid: &[u32], value: i32) -> Vec<u8> {
    let varbind = tlv(TAG_SEQUENCE, &[encode_oid(oid), encode_integer(value)].concat());
    let varbinds = tlv(TAG_SEQUENCE, &varbind);
    let pdu = tlv(
        TAG_SET_REQUEST,
        &[
            encode_integer(request_id),
            encode_integer(0),
            encode_integer(0),
            varbinds,
        ]
        .concat(),
    );
    tlv(
        TAG_SEQUENCE,
        &[
            encode_integer(SNMP_V2C),
            tlv(TAG_OCTET_STRING, community.as_bytes()),
            pdu,
        ]
        .concat(),
    )
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), String> {
        let (&tag, rest) = self.buf.split_first().ok_or("truncated tag")?;
        let (&first, mut rest) = rest.split_first().ok_or("truncated length")?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let n = usize::from(first & 0x7F);
            if n == 0 || n > 4 || rest.len() < n {
                return Err("bad length".to_string());
            }
            let len = rest[..n]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            rest = &rest[n..];
            len
        };
        if rest.len() < len {
            return Err("truncated value".to_string());
        }
        let (value, remaining) = rest.split_at(len);
        self.buf = remaining;
        Ok((tag, value))
    }

    fn read_tagged(&mut self, tag: u8) -> Result<&'a [u8], String> {
        let (got, value) = self.read_tlv()?;
        if got != tag {
            return Err(format!("expected tag {tag:#04x}, got {got:#04x}"));
        }
        Ok(value)
    }

    fn read_integer(&mut self) -> Result<i32, String> {
        let value = self.read_tagged(TAG_INTEGER)?;
        if value.is_empty() || value.len() > 4 {
            return Err("bad integer".to_string());
        }
        let sign = if value[0] & 0x80 != 0 { -1i32 } else { 0 };
        Ok(value
            .iter()
            .fold(sign, |acc, b| (acc << 8) | i32::from(*b)))
    }
}

/// Decode the header of a `Response` PDU.
pub fn decode_response(packet: &[u8]) -> Result<SetResponse, String> {
    let mut message = Reader::new(Reader::new(packet).read_tagged(TAG_SEQUENCE)?);
    let _version = message.read_integer()?;
    let _community = message.read_tagged(TAG_OCTET_STRING)?;
    let mut pdu = Reader::new(message.read_tagged(TAG_RESPONSE)?);
    Ok(SetResponse {
        request_id: pdu.read_integer()?,
        error_status: pdu.read_integer()?,
        error_index: pdu.read_integer()?,
    })
}

/// [`PowerControl`] over SNMPv2c `SetRequest`s to the PoE switch.
pub struct SnmpPowerControl {
    target: String,
    community: String,
    timeout: Duration,
    next_request_id: AtomicI32,
}

impl SnmpPowerControl {
    pub fn new(settings: &SnmpSettings, timeout: Duration) -> Self {
        Self {
            target: settings.target.clone(),
            community: settings.community.clone(),
            timeout,
            next_request_id: AtomicI32::new(std::process::id() as i32 & 0x7FFF),
        }
    }

    async fn exchange(&self, request: &[u8], request_id: i32) -> Result<SetResponse, String> {
        let target = lookup_host(self.target.as_str())
            .await
            .map_err(|e| format!("resolve {}: {e}", self.target))?
            .next()
            .ok_or_else(|| format!("resolve {}: no addresses", self.target))?;
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| format!("bind: {e}"))?;
        socket
            .connect(target)
            .await
            .map_err(|e| format!("connect {target}: {e}"))?;
        socket
            .send(request)
            .await
            .map_err(|e| format!("send: {e}"))?;

        let mut buf = [0u8; 1500];
        loop {
            let n = socket
                .recv(&mut buf)
                .await
                .map_err(|e| format!("recv: {e}"))?;
            // Undecodable datagrams and late replies to earlier requests
            // are skipped; the caller's timeout bounds the wait.
            match decode_response(&buf[..n]) {
                Ok(response) if response.request_id == request_id => return Ok(response),
                Ok(response) => {
                    debug!(expected = request_id, got = response.request_id, "ignoring stray snmp response");
                }
                Err(e) => debug!(error = %e, len = n, "ignoring undecodable snmp datagram"),
            }
        }
    }
}

#[async_trait]
impl PowerControl for SnmpPowerControl {
    async fn set_power_state(
        &self,
        handle: &VendorHandle,
        state: PowerState,
    ) -> Result<(), PowerError> {
        let command_error = |reason: String| PowerError::Command {
            handle: handle.clone(),
            state,
            reason,
        };

        let oid = port_oid(handle)
            .ok_or_else(|| command_error(format!("invalid port handle `{handle}`")))?;
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF;
        let request =
            encode_set_request(&self.community, request_id, &oid, admin_enable_value(state));

        let response = tokio::time::timeout(self.timeout, self.exchange(&request, request_id))
            .await
            .map_err(|_| PowerError::Timeout {
                handle: handle.clone(),
                state,
            })?
            .map_err(command_error)?;

        if response.error_status != 0 {
            return Err(command_error(format!(
                "agent returned error-status {} at index {}",
                response.error_status, response.error_index
            )));
        }
        debug!(%handle, %state, request_id, "snmp set acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_use_minimal_twos_complement() {
        assert_eq!(encode_integer(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(encode_integer(1), vec![0x02, 0x01, 0x01]);
        assert_eq!(encode_integer(127), vec![0x02, 0x01, 0x7F]);
        assert_eq!(encode_integer(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encode_integer(256), vec![0x02, 0x02, 0x01, 0x00]);
        assert_eq!(encode_integer(-1), vec![0x02, 0x01, 0xFF]);
        assert_eq!(encode_integer(-129), vec![0x02, 0x02, 0xFF, 0x7F]);
    }

    #[test]
    fn oid_arcs_are_base128() {
        let arcs = parse_oid("1.3.6.1.2.1.105.1.1.1.3.1.300").unwrap();
        assert_eq!(
            encode_oid(&arcs),
            vec![0x06, 0x0D, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x69, 0x01, 0x01, 0x01, 0x03, 0x01, 0x82, 0x2C]
        );
    }

    #[test]
    fn port_oid_appends_handle() {
        assert_eq!(
            port_oid(&VendorHandle::new("3")).unwrap(),
            vec![1, 3, 6, 1, 2, 1, 105, 1, 1, 1, 3, 1, 3]
        );
        assert_eq!(port_oid(&VendorHandle::new("2.14")).unwrap().len(), 14);
        assert!(port_oid(&VendorHandle::new("eth0")).is_none());
    }

    #[test]
    fn set_request_layout() {
        let oid = parse_oid("1.3.6.1.2.1.105.1.1.1.3.1.3").unwrap();
        let packet = encode_set_request("private", 5, &oid, 2);
        let expected: Vec<u8> = [
            &[0x30, 0x2C][..],
            &[0x02, 0x01, 0x01],
            &[0x04, 0x07],
            b"private",
            &[0xA3, 0x1E],
            &[0x02, 0x01, 0x05],
            &[0x02, 0x01, 0x00],
            &[0x02, 0x01, 0x00],
            &[0x30, 0x13, 0x30, 0x11],
            &[0x06, 0x0C, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x69, 0x01, 0x01, 0x01, 0x03, 0x01, 0x03],
            &[0x02, 0x01, 0x02],
        ]
        .concat();
        assert_eq!(packet.len(), 46);
        assert_eq!(packet, expected);
    }

    #[test]
    fn long_lengths_use_long_form() {
        let body = vec![0u8; 200];
        let encoded = tlv(TAG_OCTET_STRING, &body);
        assert_eq!(&encoded[..3], &[0x04, 0x81, 200]);
        let mut reader = Reader::new(&encoded);
        let (tag, value) = reader.read_tlv().unwrap();
        assert_eq!(tag, TAG_OCTET_STRING);
        assert_eq!(value.len(), 200);
    }

    fn response_packet(request_id: i32, error_status: i32) -> Vec<u8> {
        let pdu = tlv(
            TAG_RESPONSE,
            &[
                encode_integer(request_id),
                encode_integer(error_status),
                encode_integer(if error_status == 0 { 0 } else { 1 }),
                tlv(TAG_SEQUENCE, &[]),
            ]
            .concat(),
        );
        tlv(
            TAG_SEQUENCE,
            &[encode_integer(1), tlv(TAG_OCTET_STRING, b"private"), pdu].concat(),
        )
    }

    #[test]
    fn decodes_response_header() {
        let resp = decode_response(&response_packet(300, 0)).unwrap();
        assert_eq!(
            resp,
            SetResponse {
                request_id: 300,
                error_status: 0,
                error_index: 0
            }
        );
        assert!(decode_response(&[0x30, 0x05, 0x02]).is_err());
        // A SetRequest is not a response.
        let oid = parse_oid("1.3.6.1").unwrap();
        assert!(decode_response(&encode_set_request("c", 1, &oid, 1)).is_err());
    }

    /// Minimal agent bound to `bind`: answers every request with
    /// `error_status`, echoing the request id, and reports what it received.
    /// With `noisy`, a garbage datagram and a reply for another request id
    /// go out first.
    async fn spawn_agent_on(
        bind: &str,
        error_status: i32,
        noisy: bool,
    ) -> Option<(String, tokio::sync::mpsc::Receiver<Vec<u8>>)> {
        let socket = UdpSocket::bind(bind).await.ok()?;
        let addr = socket.local_addr().unwrap().to_string();
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            let mut buf = [0u8; 1500];
            while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                let packet = buf[..n].to_vec();
                let mut message = Reader::new(Reader::new(&packet).read_tagged(TAG_SEQUENCE).unwrap());
                message.read_integer().unwrap();
                message.read_tagged(TAG_OCTET_STRING).unwrap();
                let request_id = Reader::new(message.read_tagged(TAG_SET_REQUEST).unwrap())
                    .read_integer()
                    .unwrap();
                if noisy {
                    socket.send_to(&[0xde, 0xad, 0xbe, 0xef], peer).await.unwrap();
                    socket
                        .send_to(&response_packet(request_id.wrapping_add(1000), 5), peer)
                        .await
                        .unwrap();
                }
                socket
                    .send_to(&response_packet(request_id, error_status), peer)
                    .await
                    .unwrap();
                let _ = tx.send(packet).await;
            }
        });
        Some((addr, rx))
    }

    async fn spawn_agent(error_status: i32) -> (String, tokio::sync::mpsc::Receiver<Vec<u8>>) {
        spawn_agent_on("127.0.0.1:0", error_status, false).await.unwrap()
    }

    fn control(target: String, timeout: Duration) -> SnmpPowerControl {
        SnmpPowerControl::new(
            &SnmpSettings {
                target,
                community: "private".to_string(),
            },
            timeout,
        )
    }

    #[tokio::test]
    async fn set_power_state_round_trips_with_agent() {
        let (addr, mut seen) = spawn_agent(0).await;
        let power = control(addr, Duration::from_secs(2));

        power
            .set_power_state(&VendorHandle::new("3"), PowerState::Off)
            .await
            .unwrap();
        let packet = seen.recv().await.unwrap();
        // Last three bytes are the INTEGER varbind value: false(2).
        assert_eq!(&packet[packet.len() - 3..], &[0x02, 0x01, 0x02]);

        power
            .set_power_state(&VendorHandle::new("3"), PowerState::On)
            .await
            .unwrap();
        let packet = seen.recv().await.unwrap();
        assert_eq!(&packet[packet.len() - 3..], &[0x02, 0x01, 0x01]);
    }

    #[tokio::test]
    async fn agent_error_status_is_a_command_error() {
        let (addr, _seen) = spawn_agent(17).await;
        let power = control(addr, Duration::from_secs(2));

        let err = power
            .set_power_state(&VendorHandle::new("3"), PowerState::Off)
            .await
            .unwrap_err();
        assert!(matches!(err, PowerError::Command { reason, .. } if reason.contains("17")));
    }

    #[tokio::test]
    async fn silent_agent_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap().to_string();
        let power = control(addr, Duration::from_millis(100));

        let err = power
            .set_power_state(&VendorHandle::new("3"), PowerState::On)
            .await
            .unwrap_err();
        assert!(matches!(err, PowerError::Timeout { state: PowerState::On, .. }));
        drop(silent);
    }

    #[tokio::test]
    async fn bad_handle_is_rejected_before_sending() {
        let power = control("127.0.0.1:1".to_string(), Duration::from_millis(100));
        let err = power
            .set_power_state(&VendorHandle::new("port-a"), PowerState::Off)
            .await
            .unwrap_err();
        assert!(matches!(err, PowerError::Command { reason, .. } if reason.contains("port-a")));
    }

    #[tokio::test]
    async fn stray_datagrams_are_skipped() {
        let (addr, _seen) = spawn_agent_on("127.0.0.1:0", 0, true).await.unwrap();
        let power = control(addr, Duration::from_secs(2));

        power
            .set_power_state(&VendorHandle::new("3"), PowerState::On)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reaches_ipv6_agent() {
        // Hosts without IPv6 loopback cannot run this.
        let Some((addr, mut seen)) = spawn_agent_on("[::1]:0", 0, false).await else {
            return;
        };
        let power = control(addr, Duration::from_secs(2));

        power
            .set_power_state(&VendorHandle::new("4"), PowerState::Off)
            .await
            .unwrap();
        assert!(seen.recv().await.is_some());
    }
}
