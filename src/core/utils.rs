use crate::error::Result;
use crate::pb::SwimMessage;

use super::transport::TransportLayer;

/// Encodes `message` and sends it as one datagram to `target`.
pub(crate) async fn send_message<T: TransportLayer + ?Sized>(
    socket: &T,
    message: &SwimMessage,
    target: impl AsRef<str>,
) -> Result<()> {
    let buf = message.to_bytes();

    socket.send_to(&buf, target.as_ref()).await?;

    Ok(())
}
