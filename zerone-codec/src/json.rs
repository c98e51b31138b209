//! Reference newline-delimited JSON codec (spec.md §6).
//!
//! One JSON object per line, `\n`-terminated. Header fields and the request
//! or response body travel in the same frame — mirrors
//! `original_source/rpc/codec/json_codec/proto.go`'s combined structs, just
//! renamed to the wire field names spec.md §6 specifies (`ServiceMethod` →
//! `ClassMethod`, `Module` → `Origin`).

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex as AsyncMutex;

use zerone_core::error::StructuredError;
use zerone_core::{RequestHeader, ResponseHeader};

use crate::{ClientCodec, CodecError, ServerCodec};

#[derive(Serialize, Deserialize)]
struct RequestFrame {
    #[serde(rename = "ClassMethod")]
    class_method: String,
    #[serde(rename = "Sequence")]
    sequence: u64,
    #[serde(rename = "ClientName", default, skip_serializing_if = "String::is_empty")]
    client_name: String,
    #[serde(rename = "TraceID", default, skip_serializing_if = "String::is_empty")]
    trace_id: String,
    #[serde(rename = "Verbose", default, skip_serializing_if = "is_zero")]
    verbose: i32,
    #[serde(rename = "Body", default, skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct ResponseFrame {
    #[serde(rename = "ClassMethod")]
    class_method: String,
    #[serde(rename = "Sequence")]
    sequence: u64,
    #[serde(rename = "Code", default, skip_serializing_if = "is_zero")]
    code: i32,
    #[serde(rename = "Desc", default, skip_serializing_if = "String::is_empty")]
    desc: String,
    #[serde(rename = "Cause", default, skip_serializing_if = "String::is_empty")]
    cause: String,
    #[serde(rename = "ServerName", default, skip_serializing_if = "String::is_empty")]
    origin: String,
    #[serde(rename = "Body", default, skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

/// Read one `\n`-terminated line and classify the stream's end state.
async fn read_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<String, CodecError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(CodecError::Eof);
    }
    if !line.ends_with('\n') {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(line)
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<(), CodecError> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Client-side half of the reference codec. `R`/`W` are typically the two
/// halves of a split `TcpStream`.
pub struct JsonClientCodec<R, W> {
    reader: AsyncMutex<(BufReader<R>, Option<Value>)>,
    writer: AsyncMutex<W>,
}

impl<R, W> JsonClientCodec<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: AsyncMutex::new((BufReader::new(reader), None)),
            writer: AsyncMutex::new(writer),
        }
    }
}

impl<R, W> ClientCodec for JsonClientCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write_request<T>(&self, header: &RequestHeader, body: Option<&T>) -> Result<(), CodecError>
    where
        T: Serialize + Sync,
    {
        let body = body.map(serde_json::to_value).transpose().map_err(CodecError::Encode)?;
        let frame = RequestFrame {
            class_method: header.class_method.clone(),
            sequence: header.sequence,
            client_name: header.client_name.clone(),
            trace_id: header.trace_id.clone(),
            verbose: header.verbose,
            body,
        };
        let line = serde_json::to_string(&frame).map_err(CodecError::Encode)?;
        let mut writer = self.writer.lock().await;
        write_line(&mut *writer, &line).await
    }

    async fn read_response_header(&self, header: &mut ResponseHeader) -> Result<(), CodecError> {
        let mut guard = self.reader.lock().await;
        let (reader, staged_body) = &mut *guard;
        let line = read_line(reader).await?;
        let frame: ResponseFrame = serde_json::from_str(&line).map_err(CodecError::Decode)?;
        header.class_method = frame.class_method;
        header.sequence = frame.sequence;
        header.error = if frame.code == 0 {
            StructuredError::ok()
        } else {
            StructuredError {
                code: frame.code,
                description: frame.desc,
                cause: frame.cause,
                origin: frame.origin,
            }
        };
        *staged_body = frame.body;
        Ok(())
    }

    async fn read_response_body<T>(&self, body: Option<&mut T>) -> Result<(), CodecError>
    where
        T: DeserializeOwned,
    {
        let mut guard = self.reader.lock().await;
        let raw = guard.1.take();
        if let (Some(raw), Some(target)) = (raw, body) {
            *target = serde_json::from_value(raw).map_err(CodecError::Decode)?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

/// Server-side half of the reference codec.
pub struct JsonServerCodec<R, W> {
    reader: AsyncMutex<(BufReader<R>, Option<Value>)>,
    writer: AsyncMutex<W>,
}

impl<R, W> JsonServerCodec<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: AsyncMutex::new((BufReader::new(reader), None)),
            writer: AsyncMutex::new(writer),
        }
    }
}

impl<R, W> ServerCodec for JsonServerCodec<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type RequestBody = Value;

    async fn read_request_header(&self, header: &mut RequestHeader) -> Result<(), CodecError> {
        let mut guard = self.reader.lock().await;
        let (reader, staged_body) = &mut *guard;
        let line = read_line(reader).await?;
        let frame: RequestFrame = serde_json::from_str(&line).map_err(CodecError::Decode)?;
        header.class_method = frame.class_method;
        header.sequence = frame.sequence;
        header.client_name = frame.client_name;
        header.trace_id = frame.trace_id;
        header.verbose = frame.verbose;
        *staged_body = frame.body;
        Ok(())
    }

    async fn take_request_body(&self) -> Result<Value, CodecError> {
        let mut guard = self.reader.lock().await;
        Ok(guard.1.take().unwrap_or(Value::Null))
    }

    fn decode_body<T>(raw: Value) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(raw).map_err(CodecError::Decode)
    }

    async fn write_response<T>(&self, header: &ResponseHeader, body: Option<&T>) -> Result<(), CodecError>
    where
        T: Serialize + Sync,
    {
        let body = body.map(serde_json::to_value).transpose().map_err(CodecError::Encode)?;
        let frame = ResponseFrame {
            class_method: header.class_method.clone(),
            sequence: header.sequence,
            code: header.error.code,
            desc: header.error.description.clone(),
            cause: header.error.cause.clone(),
            origin: header.error.origin.clone(),
            body,
        };
        let line = serde_json::to_string(&frame).map_err(CodecError::Encode)?;
        let mut writer = self.writer.lock().await;
        write_line(&mut *writer, &line).await
    }

    async fn close(&self) -> Result<(), CodecError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}
