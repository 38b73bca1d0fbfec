use protocol_http1::Version;

/// Per-connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Protocol version every request on the connection uses.
    pub version: Version,
    /// Initial capacity of the response buffer. Grows on demand.
    pub read_buffer_capacity: usize,
    /// Initial capacity of the request buffer. Grows on demand.
    pub write_buffer_capacity: usize,
    /// Scratch space used to skip response content nobody reads.
    pub drain_buffer_size: usize,
    /// Most content bytes a dispose will drain before giving up on reusing
    /// the connection. `None` drains without limit.
    pub max_drain_size: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            version: Version::Http11,
            read_buffer_capacity: 4096,
            write_buffer_capacity: 1024,
            drain_buffer_size: 8192,
            max_drain_size: Some(1024 * 1024),
        }
    }
}
