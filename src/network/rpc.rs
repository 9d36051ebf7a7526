//! RPC message types for peer-to-peer communication.

use crate::error::{NetworkError, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Network message wrapper for all communication between members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    /// Fetch a key from a group on the owning member.
    Retrieve(KeyRequest),

    /// Value returned for a `Retrieve`.
    RetrieveResponse(RetrieveResponse),

    /// Remove a key from a group on the receiving member only.
    Delete(KeyRequest),

    /// Add members to the receiver's pool.
    AddPeers(Peers),

    /// Remove members from the receiver's pool.
    RemovePeers(Peers),

    /// Replace the receiver's membership.
    SetPeers(Peers),

    /// Acknowledgment.
    Ack,

    /// The request failed on the remote side.
    Error(ErrorResponse),
}

impl Message {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Retrieve(_) => "retrieve",
            Message::RetrieveResponse(_) => "retrieve_response",
            Message::Delete(_) => "delete",
            Message::AddPeers(_) => "add_peers",
            Message::RemovePeers(_) => "remove_peers",
            Message::SetPeers(_) => "set_peers",
            Message::Ack => "ack",
            Message::Error(_) => "error",
        }
    }
}

/// Request addressing one key in one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRequest {
    /// Group name.
    pub group: String,

    /// Key within the group.
    pub key: String,

    /// Time the caller is still willing to wait, in milliseconds.
    pub budget_ms: Option<u64>,
}

impl KeyRequest {
    pub fn new(group: impl Into<String>, key: impl Into<String>, budget_ms: Option<u64>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
            budget_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrieveResponse {
    pub value: Vec<u8>,
}

/// A list of member addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peers {
    pub addrs: Vec<String>,
}

impl Peers {
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addrs: addrs.into_iter().map(Into::into).collect(),
        }
    }
}

/// Remote failure description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Encode a message to bytes.
pub fn encode_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    bincode::serialize(msg)
}

/// Decode a message from bytes.
pub fn decode_message(data: &[u8]) -> std::result::Result<Message, bincode::Error> {
    bincode::deserialize(data)
}

/// Frame a message with length prefix for TCP transmission.
pub fn frame_message(msg: &Message) -> std::result::Result<Vec<u8>, bincode::Error> {
    let data = encode_message(msg)?;
    let len = data.len() as u32;

    let mut framed = Vec::with_capacity(4 + data.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&data);

    Ok(framed)
}

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = frame_message(msg)?;
    writer
        .write_all(&framed)
        .await
        .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` when the stream is closed cleanly before a new frame.
pub async fn read_message<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetworkError::Io(e).into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(NetworkError::ReceiveFailed(format!("message too large: {} bytes", len)).into());
    }

    let mut data = vec![0u8; len];
    reader
        .read_exact(&mut data)
        .await
        .map_err(|e| NetworkError::ReceiveFailed(e.to_string()))?;

    Ok(Some(decode_message(&data)?))
}
