#![allow(dead_code)]

use bytes::BytesMut;
use oxidul::pdu::{self, AssociationRJ, Pdu};
use oxidul::{AbortCause, AssociationListener, AssociationSnapshot, Message};
use std::sync::{Mutex, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        tracing::subscriber::set_global_default(
            tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .finish(),
        )
        .unwrap();
    })
}

/// The other end of an association, speaking raw PDUs.
pub struct RawPeer {
    stream: DuplexStream,
    buffer: BytesMut,
}

impl RawPeer {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
        }
    }

    pub async fn send(&mut self, pdu: &Pdu) {
        let bytes = pdu::encode(pdu, pdu::MAXIMUM_PDU_SIZE).unwrap();
        self.send_raw(&bytes).await
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Next PDU, or `None` once the engine closed the connection.
    pub async fn receive(&mut self) -> Option<Pdu> {
        loop {
            let pdu = pdu::read_pdu(&mut self.buffer, pdu::MAXIMUM_PDU_SIZE, false).unwrap();
            if pdu.is_some() {
                return pdu;
            }
            if self.stream.read_buf(&mut self.buffer).await.unwrap() == 0 {
                return None;
            }
        }
    }
}

/// Records the names of the events it is notified of.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: &'static str) {
        self.events.lock().unwrap().push(event)
    }
}

impl AssociationListener for RecordingListener {
    fn on_established(&self, _association: &AssociationSnapshot) {
        self.push("established")
    }

    fn on_rejected(&self, _association: &AssociationSnapshot, _rejection: &AssociationRJ) {
        self.push("rejected")
    }

    fn on_released(&self, _association: &AssociationSnapshot) {
        self.push("released")
    }

    fn on_aborted(&self, _association: &AssociationSnapshot, _cause: &AbortCause) {
        self.push("aborted")
    }

    fn on_message_sent(&self, _association: &AssociationSnapshot, _message: &Message) {
        self.push("sent")
    }

    fn on_message_received(&self, _association: &AssociationSnapshot, _message: &Message) {
        self.push("received")
    }
}
