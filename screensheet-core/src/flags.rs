use bitflags::bitflags;

bitflags! {
    /// Per-packet wire flags carried in the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u16 {
        /// Payload bytes on the wire are zstd-compressed.
        const COMPRESSED = 0x0001;
    }
}
