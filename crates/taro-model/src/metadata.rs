//! Model metadata exposed by the binary container loader.

/// Unit of one tick in the compiled model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Ticks per second of wall time.
    #[inline]
    pub fn ticks_per_second(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1000.0,
        }
    }
}

/// Container-level metadata. The wire encoding is the loader's concern; the
/// runtime only consumes these typed fields.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub schema_version: u32,
    pub model_version: String,
    pub time_unit: TimeUnit,
    pub tick_duration_ns: u64,
    /// IANA zone the model's profiles were compiled against.
    pub profile_timezone: String,
}

impl ModelMetadata {
    pub fn new(model_version: impl Into<String>, time_unit: TimeUnit, timezone: impl Into<String>) -> Self {
        let tick_duration_ns = match time_unit {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
        };
        Self {
            schema_version: 1,
            model_version: model_version.into(),
            time_unit,
            tick_duration_ns,
            profile_timezone: timezone.into(),
        }
    }
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self::new("dev", TimeUnit::Seconds, "UTC")
    }
}
