//! Server-mode message protocol (§6 `MessageTransport`, optional).
//!
//! When an evaluator is embedded as a long-running server (rather than a
//! one-shot in-process `evaluate()` call), requests and responses cross a
//! `MessageTransport` as MessagePack arrays `[type:int, payload:map]`, every
//! request carrying `requestId`/`evaluatorId` and every response echoing
//! the same `requestId` plus either a success payload or an `error` string.
//! This module defines that envelope and its message-type table; the
//! transport itself (the actual stdio/socket read/write loop a server
//! binary would run) is a collaborator's responsibility, same as
//! `interfaces::HttpClient` — declared here as a seam, not implemented.

use rmpv::Value as Wire;

use crate::errors::{EvalError, RunResult};

/// One entry in the server protocol's message-type table (§6). Values are
/// assigned sequentially in the order §6 lists them; nothing outside this
/// process depends on a specific numbering since the core crate has no
/// transport implementation to be wire-compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i64)]
pub enum MessageType {
    InitializeModuleReaderRequest = 1,
    InitializeModuleReaderResponse = 2,
    InitializeResourceReaderRequest = 3,
    InitializeResourceReaderResponse = 4,
    ListModulesRequest = 5,
    ListModulesResponse = 6,
    ListResourcesRequest = 7,
    ListResourcesResponse = 8,
    ReadModuleRequest = 9,
    ReadModuleResponse = 10,
    ReadResourceRequest = 11,
    ReadResourceResponse = 12,
    EvaluateRequest = 13,
    EvaluateResponse = 14,
    CloseExternalProcess = 15,
}

impl MessageType {
    #[must_use]
    pub fn code(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Self::InitializeModuleReaderRequest,
            2 => Self::InitializeModuleReaderResponse,
            3 => Self::InitializeResourceReaderRequest,
            4 => Self::InitializeResourceReaderResponse,
            5 => Self::ListModulesRequest,
            6 => Self::ListModulesResponse,
            7 => Self::ListResourcesRequest,
            8 => Self::ListResourcesResponse,
            9 => Self::ReadModuleRequest,
            10 => Self::ReadModuleResponse,
            11 => Self::ReadResourceRequest,
            12 => Self::ReadResourceResponse,
            13 => Self::EvaluateRequest,
            14 => Self::EvaluateResponse,
            15 => Self::CloseExternalProcess,
            _ => return None,
        })
    }

    /// Whether this message type carries a `requestId` a response must
    /// echo (every type except the fire-and-forget `CloseExternalProcess`).
    #[must_use]
    pub fn expects_response(self) -> bool {
        !matches!(self, Self::CloseExternalProcess)
    }
}

/// A decoded protocol message: its type, the `requestId`/`evaluatorId`
/// pair every request and response (except `CloseExternalProcess`)
/// carries, and the rest of the payload as a raw MessagePack map so each
/// message kind's specific fields stay collaborator-defined.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageType,
    pub request_id: Option<u64>,
    pub evaluator_id: Option<u64>,
    /// Payload fields other than `requestId`/`evaluatorId`/`error`.
    pub payload: Vec<(String, Wire)>,
    /// Present on a response that failed; `payload` is then typically empty.
    pub error: Option<String>,
}

impl Message {
    #[must_use]
    pub fn request(kind: MessageType, request_id: u64, evaluator_id: u64, payload: Vec<(String, Wire)>) -> Self {
        Self { kind, request_id: Some(request_id), evaluator_id: Some(evaluator_id), payload, error: None }
    }

    #[must_use]
    pub fn success_response(kind: MessageType, request_id: u64, payload: Vec<(String, Wire)>) -> Self {
        Self { kind, request_id: Some(request_id), evaluator_id: None, payload, error: None }
    }

    #[must_use]
    pub fn error_response(kind: MessageType, request_id: u64, message: impl Into<String>) -> Self {
        Self { kind, request_id: Some(request_id), evaluator_id: None, payload: Vec::new(), error: Some(message.into()) }
    }

    #[must_use]
    pub fn close_external_process() -> Self {
        Self { kind: MessageType::CloseExternalProcess, request_id: None, evaluator_id: None, payload: Vec::new(), error: None }
    }

    /// Encodes this message as `[type:int, payload:map]` (§6), merging
    /// `requestId`/`evaluatorId`/`error` into the payload map alongside the
    /// message-specific fields.
    #[must_use]
    pub fn encode(&self) -> Wire {
        let mut fields = self.payload.clone();
        if let Some(id) = self.request_id {
            fields.push(("requestId".to_string(), Wire::Integer(id.into())));
        }
        if let Some(id) = self.evaluator_id {
            fields.push(("evaluatorId".to_string(), Wire::Integer(id.into())));
        }
        if let Some(err) = &self.error {
            fields.push(("error".to_string(), Wire::String(err.as_str().into())));
        }
        let map = fields.into_iter().map(|(k, v)| (Wire::String(k.as_str().into()), v)).collect();
        Wire::Array(vec![Wire::Integer(self.kind.code().into()), Wire::Map(map)])
    }

    pub fn encode_to_bytes(&self) -> RunResult<Vec<u8>> {
        let wire = self.encode();
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &wire).map_err(|e| EvalError::IoError { message: e.to_string() })?;
        Ok(buf)
    }

    /// Decodes a `[type:int, payload:map]` array. An unrecognized `type`
    /// code is a fatal protocol error (§6 "Unknown message types are a
    /// fatal protocol error"), surfaced as `EvalError::InvalidEncoding`.
    pub fn decode(wire: &Wire) -> RunResult<Self> {
        let items = wire.as_array().ok_or_else(|| protocol_error("top-level message is not an array"))?;
        let code = items.first().and_then(Wire::as_i64).ok_or_else(|| protocol_error("message is missing its type code"))?;
        let kind = MessageType::from_code(code).ok_or_else(|| protocol_error(format!("unknown message type `{code}`")))?;
        let map = items.get(1).and_then(Wire::as_map).ok_or_else(|| protocol_error("message is missing its payload map"))?;

        let mut request_id = None;
        let mut evaluator_id = None;
        let mut error = None;
        let mut payload = Vec::new();
        for (k, v) in map {
            match k.as_str() {
                Some("requestId") => request_id = v.as_u64(),
                Some("evaluatorId") => evaluator_id = v.as_u64(),
                Some("error") => error = v.as_str().map(str::to_string),
                Some(other) => payload.push((other.to_string(), v.clone())),
                None => return Err(protocol_error("payload map has a non-string key")),
            }
        }
        Ok(Self { kind, request_id, evaluator_id, payload, error })
    }

    pub fn decode_from_bytes(bytes: &[u8]) -> RunResult<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        let wire = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| EvalError::InvalidEncoding { offset: cursor.position() as usize, path: String::new(), message: e.to_string() })?;
        Self::decode(&wire)
    }
}

fn protocol_error(message: impl Into<String>) -> EvalError {
    EvalError::InvalidEncoding { offset: 0, path: "message".to_string(), message: message.into() }
}

/// A collaborator-implemented bidirectional message stream (§6
/// `MessageTransport`). Declared as a seam, same as `interfaces::HttpClient`
/// — the actual stdio/socket loop a server binary runs is out of scope.
pub trait MessageTransport {
    fn send(&mut self, message: &Message) -> RunResult<()>;
    fn receive(&mut self) -> RunResult<Option<Message>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_request_message() {
        let msg = Message::request(MessageType::EvaluateRequest, 7, 1, vec![("moduleUri".to_string(), Wire::String("file:///m.pkl".into()))]);
        let bytes = msg.encode_to_bytes().unwrap();
        let decoded = Message::decode_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.kind, MessageType::EvaluateRequest);
        assert_eq!(decoded.request_id, Some(7));
        assert_eq!(decoded.evaluator_id, Some(1));
        assert_eq!(decoded.payload, vec![("moduleUri".to_string(), Wire::String("file:///m.pkl".into()))]);
    }

    #[test]
    fn round_trips_an_error_response() {
        let msg = Message::error_response(MessageType::ReadModuleResponse, 3, "module not found");
        let bytes = msg.encode_to_bytes().unwrap();
        let decoded = Message::decode_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.error.as_deref(), Some("module not found"));
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn unknown_message_type_is_a_protocol_error() {
        let wire = Wire::Array(vec![Wire::Integer(999.into()), Wire::Map(vec![])]);
        let err = Message::decode(&wire).unwrap_err();
        assert!(matches!(err, EvalError::InvalidEncoding { .. }));
    }

    #[test]
    fn close_external_process_carries_no_ids() {
        let msg = Message::close_external_process();
        let bytes = msg.encode_to_bytes().unwrap();
        let decoded = Message::decode_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.kind, MessageType::CloseExternalProcess);
        assert!(decoded.request_id.is_none());
        assert!(!decoded.kind.expects_response());
    }
}
