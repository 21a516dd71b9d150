use bitflags::bitflags;

bitflags! {
    /// Per-frame protocol flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProtocolFlags: u32 {
        /// The request is a read-only query; the device may answer it twice.
        const IDEMPOTENT = 0x1;
        /// Retransmission of an idempotent query after a transport failure.
        const RETRY = 0x2;
        /// The device closes the connection after this response.
        const FINAL = 0x4;
    }
}
