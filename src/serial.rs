//! Frame sink over an async byte stream (the UART in practice).

use embedded_io_async::Write;
use fisio_core::hal::Transport;

pub struct SerialTransport<W> {
    writer: W,
}

impl<W: Write> SerialTransport<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Transport for SerialTransport<W> {
    type Error = W::Error;

    async fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await
    }
}
