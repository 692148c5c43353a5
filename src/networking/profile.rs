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

//! Profile-exchange stream protocol and the signed ProfileBlob.
//!
//! ## Wire format
//! - Request: `u32-LE requestLen ‖ requestLen bytes`. Zero length asks the
//!   remote for its own profile; 1..=128 bytes name a UTF-8 peer id; more is
//!   a protocol error and the stream closes.
//! - Response: `u32-LE status ‖ u32-LE dataLen ‖ data`, status 0 = OK,
//!   1 = NotFound, 2 = Error; responses over 64 KiB are dropped on receive.
//!
//! Read deadline 15 s, write deadline 10 s; the behaviour-level request
//! timeout bounds the whole exchange at 25 s.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::{identity as p2p_identity, request_response, PeerId, StreamProtocol};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::time::timeout;

use crate::core::codec::{decode_canonical_limited, encode_canonical};
use crate::core::identity::Identity;

/// Protocol identifier on the authenticated transport.
pub const PROTOCOL_NAME: &str = "/spacedatanetwork/pe/1.0.0";

/// OK status (explicitly zero).
pub const STATUS_OK: u32 = 0;
/// Requested profile unknown.
pub const STATUS_NOT_FOUND: u32 = 1;
/// Server-side failure.
pub const STATUS_ERROR: u32 = 2;

/// Whole-exchange budget.
pub const EXCHANGE_BUDGET: Duration = Duration::from_secs(25);

const MAX_REQUEST_BYTES: usize = 128;
const MAX_RESPONSE_BYTES: usize = 64 * 1024;
const READ_DEADLINE: Duration = Duration::from_secs(15);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Profile blob errors.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Blob failed to decode.
    #[error("malformed profile")]
    Malformed,
    /// Signature does not verify against the embedded key.
    #[error("bad profile signature")]
    BadSignature,
    /// Peer id does not match the embedded signing key.
    #[error("subject mismatch")]
    SubjectMismatch,
    /// Signing failed.
    #[error("profile signing")]
    Signing,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileBody {
    peer_id: String,
    signing_key: [u8; 32],
    encryption_key: [u8; 32],
    display_name: String,
    organization: String,
    addresses: Vec<String>,
    issued_at_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedProfile {
    body: Vec<u8>,
    signature: Vec<u8>,
}

/// A profile blob whose signature and self-certification checked out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedProfile {
    /// Subject peer id (base58).
    pub peer_id: String,
    /// Embedded Ed25519 signing key.
    pub signing_key: [u8; 32],
    /// Embedded X25519 encryption key.
    pub encryption_key: [u8; 32],
    /// Display name.
    pub display_name: String,
    /// Organisation.
    pub organization: String,
    /// Advertised multiaddrs.
    pub addresses: Vec<String>,
    /// Issue time, ms since UNIX epoch.
    pub issued_at_ms: u64,
}

/// Build this node's signed profile blob.
pub fn build_profile(
    identity: &Identity,
    display_name: &str,
    organization: &str,
    addresses: &[String],
) -> Result<Vec<u8>, ProfileError> {
    let body = ProfileBody {
        peer_id: identity.peer_id.to_base58(),
        signing_key: identity.signing.verifying_key().to_bytes(),
        encryption_key: *identity.encryption_public.as_bytes(),
        display_name: display_name.to_string(),
        organization: organization.to_string(),
        addresses: addresses.to_vec(),
        issued_at_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64,
    };
    let body_bytes = encode_canonical(&body).map_err(|_| ProfileError::Signing)?;
    let signature = identity.signing.sign(&body_bytes);
    encode_canonical(&SignedProfile {
        body: body_bytes,
        signature: signature.to_bytes().to_vec(),
    })
    .map_err(|_| ProfileError::Signing)
}

/// Verify a received blob: signature against the embedded signing key and
/// peer id self-certification.
pub fn verify_profile(bytes: &[u8]) -> Result<VerifiedProfile, ProfileError> {
    let signed: SignedProfile =
        decode_canonical_limited(bytes, MAX_RESPONSE_BYTES).map_err(|_| ProfileError::Malformed)?;
    let body: ProfileBody = decode_canonical_limited(&signed.body, MAX_RESPONSE_BYTES)
        .map_err(|_| ProfileError::Malformed)?;

    let key = VerifyingKey::from_bytes(&body.signing_key).map_err(|_| ProfileError::Malformed)?;
    let sig_bytes: [u8; 64] = signed
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| ProfileError::Malformed)?;
    key.verify(&signed.body, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| ProfileError::BadSignature)?;

    // The peer id must be the one this signing key certifies.
    let public = p2p_identity::ed25519::PublicKey::try_from_bytes(&body.signing_key)
        .map_err(|_| ProfileError::Malformed)?;
    let derived = PeerId::from(p2p_identity::PublicKey::from(public));
    if derived.to_base58() != body.peer_id {
        return Err(ProfileError::SubjectMismatch);
    }

    Ok(VerifiedProfile {
        peer_id: body.peer_id,
        signing_key: body.signing_key,
        encryption_key: body.encryption_key,
        display_name: body.display_name,
        organization: body.organization,
        addresses: body.addresses,
        issued_at_ms: body.issued_at_ms,
    })
}

/// A profile request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileRequest {
    /// "Send me your own profile" (zero-length request).
    Own,
    /// Profile of the named peer.
    Peer(String),
}

/// A profile response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileResponse {
    /// One of the `STATUS_*` values.
    pub status: u32,
    /// Profile blob when `status == STATUS_OK`.
    pub data: Vec<u8>,
}

impl ProfileResponse {
    /// Successful response carrying a blob.
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            data,
        }
    }

    /// Profile unknown.
    pub fn not_found() -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            data: Vec::new(),
        }
    }

    /// Server failure.
    pub fn error() -> Self {
        Self {
            status: STATUS_ERROR,
            data: Vec::new(),
        }
    }
}

/// Length-framed codec implementing the wire format above.
#[derive(Clone, Default)]
pub struct ProfileCodec;

fn deadline_err() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "profile exchange deadline")
}

#[async_trait]
impl request_response::Codec for ProfileCodec {
    type Protocol = StreamProtocol;
    type Request = ProfileRequest;
    type Response = ProfileResponse;

    async fn read_request<T>(&mut self, _: &StreamProtocol, io: &mut T) -> io::Result<ProfileRequest>
    where
        T: AsyncRead + Unpin + Send,
    {
        timeout(READ_DEADLINE, async {
            let mut len_buf = [0u8; 4];
            io.read_exact(&mut len_buf).await?;
            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 {
                return Ok(ProfileRequest::Own);
            }
            if len > MAX_REQUEST_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "oversized profile request",
                ));
            }
            let mut buf = vec![0u8; len];
            io.read_exact(&mut buf).await?;
            let peer = String::from_utf8(buf)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-utf8 peer id"))?;
            Ok(ProfileRequest::Peer(peer))
        })
        .await
        .map_err(|_| deadline_err())?
    }

    async fn read_response<T>(&mut self, _: &StreamProtocol, io: &mut T) -> io::Result<ProfileResponse>
    where
        T: AsyncRead + Unpin + Send,
    {
        timeout(READ_DEADLINE, async {
            let mut status_buf = [0u8; 4];
            io.read_exact(&mut status_buf).await?;
            let mut len_buf = [0u8; 4];
            io.read_exact(&mut len_buf).await?;
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_RESPONSE_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "oversized profile response",
                ));
            }
            let mut data = vec![0u8; len];
            io.read_exact(&mut data).await?;
            Ok(ProfileResponse {
                status: u32::from_le_bytes(status_buf),
                data,
            })
        })
        .await
        .map_err(|_| deadline_err())?
    }

    async fn write_request<T>(
        &mut self,
        _: &StreamProtocol,
        io: &mut T,
        request: ProfileRequest,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        timeout(WRITE_DEADLINE, async {
            match request {
                ProfileRequest::Own => io.write_all(&0u32.to_le_bytes()).await?,
                ProfileRequest::Peer(peer) => {
                    let bytes = peer.as_bytes();
                    if bytes.is_empty() || bytes.len() > MAX_REQUEST_BYTES {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "peer id length",
                        ));
                    }
                    io.write_all(&(bytes.len() as u32).to_le_bytes()).await?;
                    io.write_all(bytes).await?;
                }
            }
            io.flush().await
        })
        .await
        .map_err(|_| deadline_err())?
    }

    async fn write_response<T>(
        &mut self,
        _: &StreamProtocol,
        io: &mut T,
        response: ProfileResponse,
    ) -> io::Result<()>
    where
        T: AsyncWrite + Unpin + Send,
    {
        timeout(WRITE_DEADLINE, async {
            io.write_all(&response.status.to_le_bytes()).await?;
            io.write_all(&(response.data.len() as u32).to_le_bytes()).await?;
            io.write_all(&response.data).await?;
            io.flush().await
        })
        .await
        .map_err(|_| deadline_err())?
    }
}
