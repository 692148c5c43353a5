// Copyright (c) 2026 Space Data Network
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Cleartext routing header prefixed to every gossip payload.
//!
//! Wire form: `u16-BE header length ‖ fields ‖ payload`. Each field is
//! `tag(u8) ‖ len(u16-BE) ‖ value`; unknown tags are skipped so relays can
//! rewrite the TTL without understanding newer fields. This is deliberately
//! not bincode: the header must stay patchable in place by intermediaries
//! that never decode the payload.

use thiserror::Error;

/// Hard cap on the encoded header.
pub const MAX_HEADER_BYTES: usize = 16 * 1024;

/// Default hop budget for fresh messages.
pub const DEFAULT_TTL: u8 = 8;

const TAG_SCHEMA: u8 = 1;
const TAG_DESTINATION: u8 = 2;
const TAG_TTL: u8 = 3;
const TAG_PRIORITY: u8 = 4;
const TAG_ENCRYPTED: u8 = 5;
const TAG_ENCRYPTION_MODE: u8 = 6;
const TAG_SESSION_KEY_ID: u8 = 7;
const TAG_SOURCE: u8 = 8;
const TAG_SEQUENCE: u8 = 9;
const TAG_TIMESTAMP_MS: u8 = 10;
const TAG_TOPIC_OVERRIDE: u8 = 11;
const TAG_SIGNATURE: u8 = 12;

/// Header codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// Ran out of bytes mid-field.
    #[error("truncated header")]
    Truncated,
    /// Fixed-width field with the wrong length, or bad UTF-8.
    #[error("malformed field")]
    Malformed,
    /// Schema or source missing.
    #[error("missing required field")]
    MissingField,
    /// Encoded header exceeds [`MAX_HEADER_BYTES`].
    #[error("header too large")]
    TooLarge,
}

/// How the payload is protected, if at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Cleartext payload.
    #[default]
    None,
    /// Symmetric session key identified by `session_key_id`.
    SessionKey,
    /// Sealed to each destination's encryption key.
    PeerToPeer,
}

impl EncryptionMode {
    fn to_wire(self) -> u8 {
        match self {
            EncryptionMode::None => 0,
            EncryptionMode::SessionKey => 1,
            EncryptionMode::PeerToPeer => 2,
        }
    }

    fn from_wire(b: u8) -> Result<Self, HeaderError> {
        match b {
            0 => Ok(EncryptionMode::None),
            1 => Ok(EncryptionMode::SessionKey),
            2 => Ok(EncryptionMode::PeerToPeer),
            _ => Err(HeaderError::Malformed),
        }
    }
}

/// The routing header. Built by the publisher; relays only decrement `ttl`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingHeader {
    /// Schema tag of the payload (non-empty).
    pub schema: String,
    /// Destination peer ids; empty means broadcast.
    pub destinations: Vec<String>,
    /// Remaining hop budget.
    pub ttl: u8,
    /// Relay priority hint.
    pub priority: u8,
    /// Whether the payload is encrypted.
    pub encrypted: bool,
    /// Encryption scheme selector.
    pub encryption_mode: EncryptionMode,
    /// Session key identifier for [`EncryptionMode::SessionKey`].
    pub session_key_id: Option<String>,
    /// Publishing peer id.
    pub source: String,
    /// Publisher-local monotonically increasing sequence.
    pub sequence: u64,
    /// Publisher wall clock, ms since UNIX epoch.
    pub timestamp_ms: u64,
    /// Explicit topic overriding the derivation rules.
    pub topic_override: Option<String>,
    /// Detached signature over the header fields, if the publisher signed.
    pub signature: Option<Vec<u8>>,
}

impl RoutingHeader {
    /// Fresh broadcast header with defaults.
    pub fn new(schema: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            destinations: Vec::new(),
            ttl: DEFAULT_TTL,
            priority: 0,
            encrypted: false,
            encryption_mode: EncryptionMode::None,
            session_key_id: None,
            source: source.into(),
            sequence: 0,
            timestamp_ms: 0,
            topic_override: None,
            signature: None,
        }
    }

    /// Encode header and payload into one wire message.
    pub fn encode_message(&self, payload: &[u8]) -> Result<Vec<u8>, HeaderError> {
        let header = self.encode()?;
        let mut out = Vec::with_capacity(2 + header.len() + payload.len());
        out.extend_from_slice(&(header.len() as u16).to_be_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Split a wire message into header and payload.
    pub fn decode_message(data: &[u8]) -> Result<(Self, &[u8]), HeaderError> {
        if data.len() < 2 {
            return Err(HeaderError::Truncated);
        }
        let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
        let rest = &data[2..];
        if rest.len() < header_len {
            return Err(HeaderError::Truncated);
        }
        let header = Self::decode(&rest[..header_len])?;
        Ok((header, &rest[header_len..]))
    }

    fn encode(&self) -> Result<Vec<u8>, HeaderError> {
        if self.schema.is_empty() || self.source.is_empty() {
            return Err(HeaderError::MissingField);
        }
        let mut out = Vec::with_capacity(64);
        push_field(&mut out, TAG_SCHEMA, self.schema.as_bytes());
        for destination in &self.destinations {
            push_field(&mut out, TAG_DESTINATION, destination.as_bytes());
        }
        push_field(&mut out, TAG_TTL, &[self.ttl]);
        push_field(&mut out, TAG_PRIORITY, &[self.priority]);
        push_field(&mut out, TAG_ENCRYPTED, &[u8::from(self.encrypted)]);
        push_field(&mut out, TAG_ENCRYPTION_MODE, &[self.encryption_mode.to_wire()]);
        if let Some(id) = &self.session_key_id {
            push_field(&mut out, TAG_SESSION_KEY_ID, id.as_bytes());
        }
        push_field(&mut out, TAG_SOURCE, self.source.as_bytes());
        push_field(&mut out, TAG_SEQUENCE, &self.sequence.to_be_bytes());
        push_field(&mut out, TAG_TIMESTAMP_MS, &self.timestamp_ms.to_be_bytes());
        if let Some(topic) = &self.topic_override {
            push_field(&mut out, TAG_TOPIC_OVERRIDE, topic.as_bytes());
        }
        if let Some(sig) = &self.signature {
            push_field(&mut out, TAG_SIGNATURE, sig);
        }
        if out.len() > MAX_HEADER_BYTES {
            return Err(HeaderError::TooLarge);
        }
        Ok(out)
    }

    fn decode(mut bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() > MAX_HEADER_BYTES {
            return Err(HeaderError::TooLarge);
        }
        let mut schema: Option<String> = None;
        let mut source: Option<String> = None;
        let mut header = RoutingHeader::new("pending", "pending");

        while !bytes.is_empty() {
            if bytes.len() < 3 {
                return Err(HeaderError::Truncated);
            }
            let tag = bytes[0];
            let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
            bytes = &bytes[3..];
            if bytes.len() < len {
                return Err(HeaderError::Truncated);
            }
            let (value, rest) = bytes.split_at(len);
            bytes = rest;

            match tag {
                TAG_SCHEMA => schema = Some(utf8(value)?),
                TAG_DESTINATION => header.destinations.push(utf8(value)?),
                TAG_TTL => header.ttl = byte(value)?,
                TAG_PRIORITY => header.priority = byte(value)?,
                TAG_ENCRYPTED => header.encrypted = byte(value)? != 0,
                TAG_ENCRYPTION_MODE => {
                    header.encryption_mode = EncryptionMode::from_wire(byte(value)?)?
                }
                TAG_SESSION_KEY_ID => header.session_key_id = Some(utf8(value)?),
                TAG_SOURCE => source = Some(utf8(value)?),
                TAG_SEQUENCE => header.sequence = u64_be(value)?,
                TAG_TIMESTAMP_MS => header.timestamp_ms = u64_be(value)?,
                TAG_TOPIC_OVERRIDE => header.topic_override = Some(utf8(value)?),
                TAG_SIGNATURE => header.signature = Some(value.to_vec()),
                // Unknown tags are skipped for forward compatibility.
                _ => {}
            }
        }

        header.schema = schema.filter(|s| !s.is_empty()).ok_or(HeaderError::MissingField)?;
        header.source = source.filter(|s| !s.is_empty()).ok_or(HeaderError::MissingField)?;
        Ok(header)
    }
}

fn push_field(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
}

fn utf8(value: &[u8]) -> Result<String, HeaderError> {
    String::from_utf8(value.to_vec()).map_err(|_| HeaderError::Malformed)
}

fn byte(value: &[u8]) -> Result<u8, HeaderError> {
    if value.len() != 1 {
        return Err(HeaderError::Malformed);
    }
    Ok(value[0])
}

fn u64_be(value: &[u8]) -> Result<u64, HeaderError> {
    let arr: [u8; 8] = value.try_into().map_err(|_| HeaderError::Malformed)?;
    Ok(u64::from_be_bytes(arr))
}
