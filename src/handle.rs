/// Default upper bound on how many elements are allocated up front from a length prefix.
pub const DEFAULT_MAX_INIT_LEN: usize = 1024 * 1024;

/// Default limit on how deeply dynamic values may nest sequences and maps.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Behavioural options shared by encode and decode calls.
///
/// A `Handle` is created by the caller and only ever read by the codec, so a single instance can
/// be reused across calls and threads.
///
/// # Example
/// ```rust
/// use senax_codec::Handle;
///
/// let handle = Handle::new().with_canonical(true).with_max_init_len(4096);
/// assert!(handle.canonical());
/// assert!(!handle.map_value_reset());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    canonical: bool,
    map_value_reset: bool,
    max_init_len: usize,
    max_depth: usize,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort map entries by their encoded key bytes, so equal maps always encode identically.
    pub fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    /// Decode map values into fresh values instead of into the entry already held for that key.
    pub fn with_map_value_reset(mut self, reset: bool) -> Self {
        self.map_value_reset = reset;
        self
    }

    /// Cap the number of elements reserved ahead of decoding them.
    ///
    /// Larger payloads still decode; they just grow incrementally past this point.
    pub fn with_max_init_len(mut self, len: usize) -> Self {
        self.max_init_len = len;
        self
    }

    /// Limit how many sequences and maps a decoded [`Value`](crate::Value) may nest.
    ///
    /// Deeper input fails with [`EncoderError::Format`](crate::EncoderError::Format) instead of
    /// exhausting the stack.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn canonical(&self) -> bool {
        self.canonical
    }

    pub fn map_value_reset(&self) -> bool {
        self.map_value_reset
    }

    pub fn max_init_len(&self) -> usize {
        self.max_init_len
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self {
            canonical: false,
            map_value_reset: false,
            max_init_len: DEFAULT_MAX_INIT_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
