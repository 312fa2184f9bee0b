/// Sample rate the whole pipeline runs at.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Classification window: 10 ms at 16 kHz. A 60 ms device frame yields
/// six windows, which is what the default voiced-window threshold of 3
/// is calibrated against.
pub const WINDOW_SIZE_SAMPLES: usize = 160;

/// Same window expressed in PCM16 bytes.
pub const WINDOW_SIZE_BYTES: usize = WINDOW_SIZE_SAMPLES * 2;
