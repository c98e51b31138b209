//! TCP dial, the transport this crate uses by default (spec.md §6: "a
//! single reliable bidirectional byte stream (TCP by default)"). Wires a
//! freshly-connected socket into the reference JSON codec and hands the
//! result to [`zerone_rpc::WireClient::spawn`].

use std::io;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use zerone_codec::json::JsonClientCodec;
use zerone_core::trace::TraceSink;
use zerone_rpc::WireClient;

pub type TcpClientCodec = JsonClientCodec<OwnedReadHalf, OwnedWriteHalf>;
pub type TcpWireClient = WireClient<TcpClientCodec>;

/// Dial `address` over TCP and spawn a wire-client's background reader.
pub async fn dial_tcp(address: &str, client_name: &str, trace: Arc<dyn TraceSink>) -> io::Result<Arc<TcpWireClient>> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let codec = JsonClientCodec::new(read_half, write_half);
    Ok(WireClient::spawn(codec, client_name.to_string(), address.to_string(), trace))
}
